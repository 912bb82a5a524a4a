//! Database handle and lock guard.
//!
//! SQLite access is serialized through a single mutex owned by the [`Sql`]
//! handle. [`Sql::lock`] blocks until the handle is available and returns a
//! [`SqlGuard`]; every database operation is a method on the guard, so code
//! that has no guard cannot touch the connection. Lock at the highest
//! call-site level feasible to avoid lock thrashing across nested helpers -
//! helpers should take `&SqlGuard` instead of re-locking.

use crate::statements::{Predefined, PREDEFINED_COUNT};
use crate::{migrations, SqlError, SqlResult};
use rusqlite::{CachedStatement, Connection, OpenFlags, Params, Statement};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

struct SqlInner {
    /// `None` while closed. Closing and reopening the same handle is allowed.
    conn: Option<Connection>,
    /// Nesting depth for reentrant transactions. Only the transition between
    /// 0 and 1 is forwarded to SQLite.
    transaction_depth: u32,
    path: Option<String>,
}

/// Serialized SQLite handle.
///
/// The handle starts closed; call [`SqlGuard::open`] (or
/// [`SqlGuard::open_in_memory`]) on the locked guard before use.
pub struct Sql {
    inner: Mutex<SqlInner>,
}

impl Sql {
    /// Create a new, unopened handle.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SqlInner {
                conn: None,
                transaction_depth: 0,
                path: None,
            }),
        }
    }

    /// Acquire the handle's lock, blocking until it is available.
    ///
    /// There is no timeout. The guard must not be re-acquired on the same
    /// thread while one is alive.
    pub fn lock(&self) -> SqlGuard<'_> {
        SqlGuard {
            inner: self.inner.lock().expect("sql mutex poisoned"),
        }
    }
}

impl Default for Sql {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the database connection.
///
/// Obtained from [`Sql::lock`]; released on drop.
pub struct SqlGuard<'a> {
    inner: MutexGuard<'a, SqlInner>,
}

impl SqlGuard<'_> {
    /// Open a database at the given path, running migrations if needed.
    ///
    /// With `readonly` set, the file is opened with
    /// `SQLITE_OPEN_READ_ONLY` and migrations are skipped.
    pub fn open(&mut self, path: &Path, readonly: bool) -> SqlResult<()> {
        if self.inner.conn.is_some() {
            return Err(SqlError::InvalidData(
                "database is already open".to_string(),
            ));
        }

        let conn = if readonly {
            Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?
        } else {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(path)?
        };

        self.init_connection(conn, readonly)?;
        self.inner.path = Some(path.to_string_lossy().to_string());
        info!(path = %path.display(), readonly, "Database opened");
        Ok(())
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory(&mut self) -> SqlResult<()> {
        if self.inner.conn.is_some() {
            return Err(SqlError::InvalidData(
                "database is already open".to_string(),
            ));
        }
        let conn = Connection::open_in_memory()?;
        self.init_connection(conn, false)?;
        Ok(())
    }

    fn init_connection(&mut self, conn: Connection, readonly: bool) -> SqlResult<()> {
        // One cached statement per predefined slot, plus headroom for the
        // ad hoc statements the config store and migrations prepare.
        conn.set_prepared_statement_cache_capacity(PREDEFINED_COUNT + 10);

        if readonly {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
            ",
            )?;
        } else {
            // Note: WAL mode doesn't apply to in-memory databases
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA cache_size = -64000;
                PRAGMA temp_store = MEMORY;
                PRAGMA busy_timeout = 5000;
            ",
            )?;
            migrations::run_migrations(&conn)?;
        }

        self.inner.conn = Some(conn);
        Ok(())
    }

    /// Close the connection, finalizing all cached statements.
    ///
    /// A no-op if the handle is already closed. Any open transaction is
    /// discarded by SQLite on close.
    pub fn close(&mut self) {
        if let Some(conn) = self.inner.conn.take() {
            conn.flush_prepared_statement_cache();
            if let Err((_conn, e)) = conn.close() {
                warn!(error = %e, "Error closing database connection");
            }
            info!("Database closed");
        }
        self.inner.transaction_depth = 0;
        self.inner.path = None;
    }

    /// Whether the handle currently owns an open connection.
    pub fn is_open(&self) -> bool {
        self.inner.conn.is_some()
    }

    /// The path the database was opened at, if any.
    pub fn path(&self) -> Option<&str> {
        self.inner.path.as_deref()
    }

    pub(crate) fn conn(&self) -> SqlResult<&Connection> {
        self.inner.conn.as_ref().ok_or(SqlError::ConnectionClosed)
    }

    /// Execute a single SQL statement with the given parameters.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> SqlResult<usize> {
        Ok(self.conn()?.execute(sql, params)?)
    }

    /// Execute a batch of semicolon-separated SQL statements.
    pub fn execute_batch(&self, sql: &str) -> SqlResult<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// Prepare an ad hoc statement. Finalization happens when the returned
    /// statement is dropped.
    pub fn prepare(&self, sql: &str) -> SqlResult<Statement<'_>> {
        Ok(self.conn()?.prepare(sql)?)
    }

    /// Get the cached prepared statement for a predefined slot.
    ///
    /// The statement is prepared on first use and reset - not re-prepared -
    /// when it returns to the cache.
    pub fn stmt(&self, slot: Predefined) -> SqlResult<CachedStatement<'_>> {
        Ok(self.conn()?.prepare_cached(slot.sql())?)
    }

    /// Check whether a table with the given name exists.
    pub fn table_exists(&self, name: &str) -> SqlResult<bool> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Begin a transaction, or join the one already open.
    ///
    /// Calls nest; only the outermost call issues `BEGIN` to SQLite.
    pub fn begin_transaction(&mut self) -> SqlResult<()> {
        if self.inner.transaction_depth == 0 {
            self.stmt(Predefined::BeginTransaction)?.execute([])?;
        }
        self.inner.transaction_depth += 1;
        debug!(depth = self.inner.transaction_depth, "Transaction begun");
        Ok(())
    }

    /// Commit the current transaction level.
    ///
    /// Inner levels only decrement the nesting counter; `COMMIT` is issued
    /// when the outermost level commits.
    pub fn commit(&mut self) -> SqlResult<()> {
        match self.inner.transaction_depth {
            0 => {
                warn!("commit() called without an open transaction");
            }
            1 => {
                self.stmt(Predefined::CommitTransaction)?.execute([])?;
                self.inner.transaction_depth = 0;
                debug!("Transaction committed");
            }
            depth => {
                self.inner.transaction_depth = depth - 1;
            }
        }
        Ok(())
    }

    /// Roll back the current transaction level.
    ///
    /// Inner levels only decrement the nesting counter; `ROLLBACK` is issued
    /// when the outermost level rolls back.
    pub fn rollback(&mut self) -> SqlResult<()> {
        match self.inner.transaction_depth {
            0 => {
                warn!("rollback() called without an open transaction");
            }
            1 => {
                self.stmt(Predefined::RollbackTransaction)?.execute([])?;
                self.inner.transaction_depth = 0;
                debug!("Transaction rolled back");
            }
            depth => {
                self.inner.transaction_depth = depth - 1;
            }
        }
        Ok(())
    }

    /// Current transaction nesting depth. Zero when no transaction is open.
    pub fn transaction_depth(&self) -> u32 {
        self.inner.transaction_depth
    }

    /// Drop every cached prepared statement.
    ///
    /// Needed only in rare cases, e.g. before dropping a table while
    /// statements referencing it are still cached.
    pub fn reset_statement_cache(&self) -> SqlResult<()> {
        self.conn()?.flush_prepared_statement_cache();
        debug!("Prepared statement cache flushed");
        Ok(())
    }

    /// Check that the connection answers a trivial query.
    pub fn health_check(&self) -> SqlResult<()> {
        self.conn()?.execute_batch("SELECT 1")?;
        debug!("Database health check passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::tempdir;

    fn open_test_sql() -> Sql {
        let sql = Sql::new();
        sql.lock().open_in_memory().unwrap();
        sql
    }

    #[test]
    fn test_open_and_close() {
        let sql = Sql::new();
        let mut guard = sql.lock();
        assert!(!guard.is_open());

        guard.open_in_memory().unwrap();
        assert!(guard.is_open());
        assert!(guard.health_check().is_ok());

        // Opening twice is an error
        assert!(guard.open_in_memory().is_err());

        guard.close();
        assert!(!guard.is_open());
        assert!(matches!(
            guard.health_check(),
            Err(SqlError::ConnectionClosed)
        ));

        // Closed handles can be reopened
        guard.open_in_memory().unwrap();
        assert!(guard.is_open());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("courier.db");

        let sql = Sql::new();
        let mut guard = sql.lock();
        guard.open(&db_path, false).unwrap();
        assert!(guard.is_open());
        assert_eq!(guard.path(), Some(db_path.to_string_lossy().as_ref()));
        assert!(db_path.exists());
    }

    #[test]
    fn test_readonly_open_rejects_writes() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("courier.db");

        // Create and populate the database first
        {
            let sql = Sql::new();
            let mut guard = sql.lock();
            guard.open(&db_path, false).unwrap();
            guard
                .execute(
                    "INSERT INTO config (keyname, value) VALUES ('addr', 'alice@example.org')",
                    [],
                )
                .unwrap();
            guard.close();
        }

        let sql = Sql::new();
        let mut guard = sql.lock();
        guard.open(&db_path, true).unwrap();

        // Reads work
        let value: String = guard
            .conn()
            .unwrap()
            .query_row(
                "SELECT value FROM config WHERE keyname='addr'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, "alice@example.org");

        // Writes fail
        assert!(guard
            .execute("INSERT INTO config (keyname, value) VALUES ('x', 'y')", [])
            .is_err());
    }

    #[test]
    fn test_table_exists() {
        let sql = open_test_sql();
        let guard = sql.lock();

        assert!(guard.table_exists("chats").unwrap());
        assert!(guard.table_exists("msgs").unwrap());
        assert!(!guard.table_exists("no_such_table").unwrap());
    }

    #[test]
    fn test_predefined_statement_is_reusable() {
        let sql = open_test_sql();
        let guard = sql.lock();

        guard
            .execute_batch(
                "INSERT INTO chats (name, grpid) VALUES ('a', 'grp-a');
                 INSERT INTO chats (name, grpid) VALUES ('b', 'grp-b');",
            )
            .unwrap();

        // The same slot is requested repeatedly with different bindings; the
        // cached statement must come back reset each time.
        for (grpid, expected) in [("grp-a", 1i64), ("grp-b", 2), ("grp-a", 1)] {
            let mut stmt = guard.stmt(Predefined::ChatIdForGroupId).unwrap();
            let id: i64 = stmt.query_row(params![grpid], |row| row.get(0)).unwrap();
            assert_eq!(id, expected);
        }
    }

    #[test]
    fn test_reset_statement_cache_allows_table_drop() {
        let sql = open_test_sql();
        let guard = sql.lock();

        guard
            .execute_batch("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
            .unwrap();
        {
            let mut stmt = guard.prepare("SELECT id FROM scratch").unwrap();
            let _ = stmt.query([]).unwrap();
        }

        guard.reset_statement_cache().unwrap();
        guard.execute_batch("DROP TABLE scratch").unwrap();
        assert!(!guard.table_exists("scratch").unwrap());
    }

    #[test]
    fn test_nested_commit_takes_effect_only_at_outermost_level() {
        let sql = open_test_sql();
        let mut guard = sql.lock();

        guard.begin_transaction().unwrap();
        guard.begin_transaction().unwrap();
        assert_eq!(guard.transaction_depth(), 2);

        guard
            .execute("INSERT INTO chats (name, grpid) VALUES ('inner', 'g1')", [])
            .unwrap();

        // Inner commit decrements the counter without committing
        guard.commit().unwrap();
        assert_eq!(guard.transaction_depth(), 1);

        // Rolling back the outermost level discards the inner "commit"
        guard.rollback().unwrap();
        assert_eq!(guard.transaction_depth(), 0);

        let count: i64 = guard
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_inner_rollback_does_not_reach_the_engine() {
        let sql = open_test_sql();
        let mut guard = sql.lock();

        guard.begin_transaction().unwrap();
        guard
            .execute("INSERT INTO chats (name, grpid) VALUES ('kept', 'g1')", [])
            .unwrap();

        guard.begin_transaction().unwrap();
        guard.rollback().unwrap(); // inner: counter only
        assert_eq!(guard.transaction_depth(), 1);

        guard.commit().unwrap(); // outermost: real COMMIT

        let count: i64 = guard
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_outermost_commit_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("courier.db");

        {
            let sql = Sql::new();
            let mut guard = sql.lock();
            guard.open(&db_path, false).unwrap();
            guard.begin_transaction().unwrap();
            guard.begin_transaction().unwrap();
            guard
                .execute("INSERT INTO chats (name, grpid) VALUES ('c', 'g1')", [])
                .unwrap();
            guard.commit().unwrap();
            guard.commit().unwrap();
            guard.close();
        }

        let sql = Sql::new();
        let mut guard = sql.lock();
        guard.open(&db_path, false).unwrap();
        let count: i64 = guard
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unbalanced_commit_is_tolerated() {
        let sql = open_test_sql();
        let mut guard = sql.lock();

        // Without a transaction, commit/rollback only log
        guard.commit().unwrap();
        guard.rollback().unwrap();
        assert_eq!(guard.transaction_depth(), 0);
    }

    #[test]
    fn test_close_resets_transaction_depth() {
        let sql = open_test_sql();
        let mut guard = sql.lock();

        guard.begin_transaction().unwrap();
        guard.begin_transaction().unwrap();
        guard.close();
        assert_eq!(guard.transaction_depth(), 0);
    }

    #[test]
    fn test_handle_is_shareable_across_threads() {
        let sql = std::sync::Arc::new(open_test_sql());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sql = std::sync::Arc::clone(&sql);
                std::thread::spawn(move || {
                    let guard = sql.lock();
                    guard
                        .execute(
                            "INSERT INTO chats (name, grpid) VALUES (?1, ?2)",
                            params![format!("chat-{i}"), format!("grp-{i}")],
                        )
                        .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let guard = sql.lock();
        let count: i64 = guard
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 4);
    }
}
