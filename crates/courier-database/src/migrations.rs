//! Database migrations.
//!
//! This module contains all SQL migrations for the message-store schema.
//! Migrations are run in order and tracked in the `migrations` table.

use crate::{SqlError, SqlResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> SqlResult<()> {
    // Create migrations tracking table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version > CURRENT_VERSION {
        return Err(SqlError::Migration(format!(
            "database schema version {current_version} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_initial_schema(conn)?;
    }
    if current_version < 2 {
        migrate_v2_message_indexes(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: Initial schema - config, contacts, chats, membership, messages.
fn migrate_v1_initial_schema(conn: &Connection) -> SqlResult<()> {
    info!("Applying migration v1: initial schema");

    // config table
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            keyname TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    // contacts table
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            addr TEXT NOT NULL UNIQUE,
            origin INTEGER NOT NULL DEFAULT 0,
            blocked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_contacts_addr
            ON contacts(addr);
        ",
    )?;

    // chats and membership tables
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS chats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type INTEGER NOT NULL DEFAULT 100,
            name TEXT NOT NULL DEFAULT '',
            grpid TEXT NOT NULL DEFAULT '',
            blocked INTEGER NOT NULL DEFAULT 0,
            param TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_chats_grpid
            ON chats(grpid);

        CREATE TABLE IF NOT EXISTS chats_contacts (
            chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            contact_id INTEGER NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
            PRIMARY KEY (chat_id, contact_id)
        );

        CREATE INDEX IF NOT EXISTS idx_chats_contacts_contact_id
            ON chats_contacts(contact_id);
        ",
    )?;

    // msgs table
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS msgs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rfc724_mid TEXT NOT NULL DEFAULT '',
            chat_id INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
            from_id INTEGER NOT NULL DEFAULT 0,
            to_id INTEGER NOT NULL DEFAULT 0,
            timestamp INTEGER NOT NULL DEFAULT 0,
            type INTEGER NOT NULL DEFAULT 0,
            state INTEGER NOT NULL DEFAULT 0,
            txt TEXT NOT NULL DEFAULT '',
            txt_raw TEXT NOT NULL DEFAULT '',
            param TEXT NOT NULL DEFAULT '',
            starred INTEGER NOT NULL DEFAULT 0,
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_msgs_rfc724_mid
            ON msgs(rfc724_mid);
        CREATE INDEX IF NOT EXISTS idx_msgs_chat_id
            ON msgs(chat_id);
        CREATE INDEX IF NOT EXISTS idx_msgs_timestamp
            ON msgs(timestamp);
        ",
    )?;

    record_migration(conn, 1, "initial_schema")?;
    Ok(())
}

/// V2: Indexes for fresh-message and starred-message listings.
fn migrate_v2_message_indexes(conn: &Connection) -> SqlResult<()> {
    info!("Applying migration v2: message indexes");

    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_msgs_state
            ON msgs(state);
        CREATE INDEX IF NOT EXISTS idx_msgs_starred
            ON msgs(starred);
        CREATE INDEX IF NOT EXISTS idx_msgs_from_id
            ON msgs(from_id);
        ",
    )?;

    record_migration(conn, 2, "message_indexes")?;
    Ok(())
}
