//! Typed query operations over a locked handle.
//!
//! Each function takes a [`SqlGuard`] as its first parameter, so the caller
//! decides the locking scope; hot-path lookups go through the predefined
//! statement slots in [`crate::Predefined`].

use crate::models::{Blocked, ChatType, MessageState, NewMessage};
use crate::statements::Predefined;
use crate::{SqlGuard, SqlResult};
use chrono::Utc;
use rusqlite::params;
use tracing::debug;

// ==========================================
// Contacts
// ==========================================

/// Insert a contact, or update the name of an existing one with the same
/// address. Returns the contact id.
pub fn create_contact(sql: &SqlGuard<'_>, name: &str, addr: &str) -> SqlResult<u32> {
    sql.execute(
        "INSERT INTO contacts (name, addr) VALUES (?1, ?2)
         ON CONFLICT(addr) DO UPDATE SET name = excluded.name",
        params![name, addr],
    )?;
    let id = sql.conn()?.query_row(
        "SELECT id FROM contacts WHERE addr=?1",
        params![addr],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Update a contact's block state.
pub fn set_contact_blocked(sql: &SqlGuard<'_>, contact_id: u32, blocked: bool) -> SqlResult<bool> {
    let count = sql.execute(
        "UPDATE contacts SET blocked=?1 WHERE id=?2",
        params![blocked as i32, contact_id],
    )?;
    Ok(count > 0)
}

// ==========================================
// Chats
// ==========================================

/// Create a chat. Returns the chat id.
pub fn create_chat(
    sql: &SqlGuard<'_>,
    chat_type: ChatType,
    name: &str,
    grpid: &str,
) -> SqlResult<u32> {
    sql.execute(
        "INSERT INTO chats (type, name, grpid) VALUES (?1, ?2, ?3)",
        params![chat_type.to_i32(), name, grpid],
    )?;
    let id = sql.conn()?.last_insert_rowid() as u32;
    debug!(id, grpid, "Chat created");
    Ok(id)
}

/// Look up the chat id for a group id.
pub fn chat_id_for_group_id(sql: &SqlGuard<'_>, grpid: &str) -> SqlResult<Option<u32>> {
    let mut stmt = sql.stmt(Predefined::ChatIdForGroupId)?;
    let result = stmt.query_row(params![grpid], |row| row.get(0));
    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Update a chat's block state.
pub fn set_chat_blocked(sql: &SqlGuard<'_>, chat_id: u32, blocked: Blocked) -> SqlResult<bool> {
    let count = sql
        .stmt(Predefined::SetChatBlocked)?
        .execute(params![blocked.to_i32(), chat_id])?;
    Ok(count > 0)
}

// ==========================================
// Chat membership
// ==========================================

/// Check whether a contact is a member of a chat.
pub fn is_contact_in_chat(sql: &SqlGuard<'_>, chat_id: u32, contact_id: u32) -> SqlResult<bool> {
    let count: i64 = sql
        .stmt(Predefined::ContactInChat)?
        .query_row(params![chat_id, contact_id], |row| row.get(0))?;
    Ok(count > 0)
}

/// Number of members in a chat.
pub fn chat_member_count(sql: &SqlGuard<'_>, chat_id: u32) -> SqlResult<u32> {
    let count: u32 = sql
        .stmt(Predefined::ChatMemberCount)?
        .query_row(params![chat_id], |row| row.get(0))?;
    Ok(count)
}

/// Member contact ids of a chat, ordered by contact id.
pub fn chat_member_ids(sql: &SqlGuard<'_>, chat_id: u32) -> SqlResult<Vec<u32>> {
    let mut stmt = sql.stmt(Predefined::ChatMemberIds)?;
    let ids = stmt
        .query_map(params![chat_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Add a contact to a chat. The caller checks membership first; adding a
/// contact twice is a constraint error.
pub fn add_contact_to_chat(sql: &SqlGuard<'_>, chat_id: u32, contact_id: u32) -> SqlResult<()> {
    sql.stmt(Predefined::AddChatMember)?
        .execute(params![chat_id, contact_id])?;
    Ok(())
}

// ==========================================
// Messages
// ==========================================

/// Insert a new message row. Returns the message id.
pub fn insert_message(sql: &SqlGuard<'_>, msg: &NewMessage) -> SqlResult<u32> {
    sql.execute(
        "INSERT INTO msgs (rfc724_mid, chat_id, from_id, to_id, timestamp, state, txt, txt_raw, param, starred, hidden)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            msg.rfc724_mid,
            msg.chat_id,
            msg.from_id,
            msg.to_id,
            msg.timestamp,
            msg.state.to_i32(),
            msg.txt,
            msg.txt_raw,
            msg.param,
            msg.starred as i32,
            msg.hidden as i32,
        ],
    )?;
    Ok(sql.conn()?.last_insert_rowid() as u32)
}

/// Look up a message id by its RFC 724 Message-ID; used for de-duplication
/// on receive.
pub fn message_id_for_rfc_id(sql: &SqlGuard<'_>, rfc724_mid: &str) -> SqlResult<Option<u32>> {
    let mut stmt = sql.stmt(Predefined::MessageIdForRfcId)?;
    let result = stmt.query_row(params![rfc724_mid], |row| row.get(0));
    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Number of messages sent by a contact.
pub fn message_count_for_contact(sql: &SqlGuard<'_>, contact_id: u32) -> SqlResult<u32> {
    let count: u32 = sql
        .stmt(Predefined::MessageCountForContact)?
        .query_row(params![contact_id], |row| row.get(0))?;
    Ok(count)
}

/// The unprocessed raw text of a message.
pub fn message_raw_text(sql: &SqlGuard<'_>, msg_id: u32) -> SqlResult<Option<String>> {
    let mut stmt = sql.stmt(Predefined::MessageRawText)?;
    let result = stmt.query_row(params![msg_id], |row| row.get(0));
    match result {
        Ok(txt) => Ok(Some(txt)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The serialized parameter blob of a message.
pub fn message_param(sql: &SqlGuard<'_>, msg_id: u32) -> SqlResult<Option<String>> {
    let mut stmt = sql.stmt(Predefined::MessageParam)?;
    let result = stmt.query_row(params![msg_id], |row| row.get(0));
    match result {
        Ok(param) => Ok(Some(param)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// State and chat of a message.
pub fn message_state_and_chat(
    sql: &SqlGuard<'_>,
    msg_id: u32,
) -> SqlResult<Option<(MessageState, u32)>> {
    let mut stmt = sql.stmt(Predefined::MessageStateAndChat)?;
    let result = stmt.query_row(params![msg_id], |row| {
        Ok((MessageState::from_i32(row.get(0)?), row.get(1)?))
    });
    match result {
        Ok(pair) => Ok(Some(pair)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Visible message ids of a chat in timestamp order, skipping messages from
/// blocked contacts.
pub fn message_ids_in_chat(sql: &SqlGuard<'_>, chat_id: u32) -> SqlResult<Vec<u32>> {
    let mut stmt = sql.stmt(Predefined::MessageIdsInChat)?;
    let ids = stmt
        .query_map(params![chat_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Ids of all starred messages, oldest first.
pub fn starred_message_ids(sql: &SqlGuard<'_>) -> SqlResult<Vec<u32>> {
    let mut stmt = sql.stmt(Predefined::StarredMessageIds)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Ids of fresh (unseen, unnoticed) messages in unblocked chats.
pub fn fresh_message_ids(sql: &SqlGuard<'_>) -> SqlResult<Vec<u32>> {
    let mut stmt = sql.stmt(Predefined::FreshMessageIds)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Ids of fresh messages waiting in deaddrop chats.
pub fn fresh_deaddrop_message_ids(sql: &SqlGuard<'_>) -> SqlResult<Vec<u32>> {
    let mut stmt = sql.stmt(Predefined::FreshDeaddropMessageIds)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Full-text search over message text and sender names, newest first.
/// With `chat_id` set, the search is restricted to that chat.
pub fn search_message_ids(
    sql: &SqlGuard<'_>,
    query: &str,
    chat_id: Option<u32>,
) -> SqlResult<Vec<u32>> {
    let pattern = format!("%{}%", query.trim());

    let ids = match chat_id {
        Some(chat_id) => {
            let mut stmt = sql.stmt(Predefined::SearchMessagesInChat)?;
            let ids = stmt
                .query_map(params![chat_id, pattern], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        }
        None => {
            let mut stmt = sql.stmt(Predefined::SearchMessages)?;
            let ids = stmt
                .query_map(params![pattern], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        }
    };
    Ok(ids)
}

/// Newest message timestamp at or after `min_timestamp`, if any.
pub fn newest_message_timestamp(
    sql: &SqlGuard<'_>,
    min_timestamp: i64,
) -> SqlResult<Option<i64>> {
    let newest: Option<i64> = sql
        .stmt(Predefined::NewestMessageTimestamp)?
        .query_row(params![min_timestamp], |row| row.get(0))?;
    Ok(newest)
}

/// A send timestamp that is strictly newer than every stored message.
///
/// Wall-clock time can lag behind the newest received message; sorting by
/// timestamp then requires outgoing messages to be smeared past it.
pub fn create_smeared_timestamp(sql: &SqlGuard<'_>) -> SqlResult<i64> {
    let now = Utc::now().timestamp();
    match newest_message_timestamp(sql, now)? {
        Some(newest) if newest >= now => Ok(newest + 1),
        _ => Ok(now),
    }
}
