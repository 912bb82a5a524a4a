//! Predefined statement slots.
//!
//! Hot-path queries are enumerated here so that every call site shares one
//! prepared statement per slot. Each slot is permanently bound to its SQL
//! string; the statement is prepared on first use, cached, and reset for
//! reuse on subsequent requests.

/// A predefined statement slot.
///
/// Use [`crate::SqlGuard::stmt`] to obtain the cached prepared statement for
/// a slot. The slot-to-SQL binding is fixed at compile time, so a slot can
/// never be re-bound to different SQL over the lifetime of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predefined {
    // Transaction control, driven by the nesting counter in `SqlGuard`.
    BeginTransaction,
    RollbackTransaction,
    CommitTransaction,

    // Chats
    ChatIdForGroupId,
    SetChatBlocked,

    // Chat membership
    ContactInChat,
    ChatMemberCount,
    ChatMemberIds,
    AddChatMember,

    // Messages
    NewestMessageTimestamp,
    MessageParam,
    MessageCountForContact,
    MessageIdForRfcId,
    MessageRawText,
    MessageStateAndChat,
    MessageIdsInChat,
    StarredMessageIds,
    FreshMessageIds,
    FreshDeaddropMessageIds,
    SearchMessages,
    SearchMessagesInChat,
}

/// Number of predefined slots; the statement cache is sized from this.
pub const PREDEFINED_COUNT: usize = 21;

impl Predefined {
    /// The SQL text this slot is bound to.
    pub fn sql(self) -> &'static str {
        match self {
            Self::BeginTransaction => "BEGIN",
            Self::RollbackTransaction => "ROLLBACK",
            Self::CommitTransaction => "COMMIT",

            Self::ChatIdForGroupId => "SELECT id FROM chats WHERE grpid=?1",
            Self::SetChatBlocked => "UPDATE chats SET blocked=?1 WHERE id=?2",

            Self::ContactInChat => {
                "SELECT COUNT(*) FROM chats_contacts WHERE chat_id=?1 AND contact_id=?2"
            }
            Self::ChatMemberCount => "SELECT COUNT(*) FROM chats_contacts WHERE chat_id=?1",
            Self::ChatMemberIds => {
                "SELECT contact_id FROM chats_contacts WHERE chat_id=?1 ORDER BY contact_id"
            }
            Self::AddChatMember => {
                "INSERT INTO chats_contacts (chat_id, contact_id) VALUES (?1, ?2)"
            }

            Self::NewestMessageTimestamp => {
                "SELECT MAX(timestamp) FROM msgs WHERE timestamp>=?1"
            }
            Self::MessageParam => "SELECT param FROM msgs WHERE id=?1",
            Self::MessageCountForContact => "SELECT COUNT(*) FROM msgs WHERE from_id=?1",
            Self::MessageIdForRfcId => "SELECT id FROM msgs WHERE rfc724_mid=?1",
            Self::MessageRawText => "SELECT txt_raw FROM msgs WHERE id=?1",
            Self::MessageStateAndChat => "SELECT state, chat_id FROM msgs WHERE id=?1",
            Self::MessageIdsInChat => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN contacts ct ON m.from_id=ct.id \
                 WHERE m.chat_id=?1 AND m.hidden=0 AND ct.blocked=0 \
                 ORDER BY m.timestamp, m.id"
            }
            Self::StarredMessageIds => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN contacts ct ON m.from_id=ct.id \
                 WHERE m.starred=1 AND m.hidden=0 AND ct.blocked=0 \
                 ORDER BY m.timestamp, m.id"
            }
            Self::FreshMessageIds => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN contacts ct ON m.from_id=ct.id \
                 LEFT JOIN chats c ON m.chat_id=c.id \
                 WHERE m.state=10 AND m.hidden=0 AND c.blocked=0 AND ct.blocked=0 \
                 ORDER BY m.timestamp, m.id"
            }
            Self::FreshDeaddropMessageIds => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN chats c ON m.chat_id=c.id \
                 WHERE m.state=10 AND m.hidden=0 AND c.blocked=2 \
                 ORDER BY m.timestamp, m.id"
            }
            Self::SearchMessages => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN contacts ct ON m.from_id=ct.id \
                 WHERE m.hidden=0 AND ct.blocked=0 AND (m.txt LIKE ?1 OR ct.name LIKE ?1) \
                 ORDER BY m.timestamp DESC, m.id DESC"
            }
            Self::SearchMessagesInChat => {
                "SELECT m.id FROM msgs m \
                 LEFT JOIN contacts ct ON m.from_id=ct.id \
                 WHERE m.chat_id=?1 AND m.hidden=0 AND ct.blocked=0 \
                 AND (m.txt LIKE ?2 OR ct.name LIKE ?2) \
                 ORDER BY m.timestamp DESC, m.id DESC"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Predefined; PREDEFINED_COUNT] = [
        Predefined::BeginTransaction,
        Predefined::RollbackTransaction,
        Predefined::CommitTransaction,
        Predefined::ChatIdForGroupId,
        Predefined::SetChatBlocked,
        Predefined::ContactInChat,
        Predefined::ChatMemberCount,
        Predefined::ChatMemberIds,
        Predefined::AddChatMember,
        Predefined::NewestMessageTimestamp,
        Predefined::MessageParam,
        Predefined::MessageCountForContact,
        Predefined::MessageIdForRfcId,
        Predefined::MessageRawText,
        Predefined::MessageStateAndChat,
        Predefined::MessageIdsInChat,
        Predefined::StarredMessageIds,
        Predefined::FreshMessageIds,
        Predefined::FreshDeaddropMessageIds,
        Predefined::SearchMessages,
        Predefined::SearchMessagesInChat,
    ];

    #[test]
    fn test_slot_sql_is_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.sql(), b.sql(), "{a:?} and {b:?} share SQL");
            }
        }
    }

    #[test]
    fn test_transaction_slots_are_bare_keywords() {
        assert_eq!(Predefined::BeginTransaction.sql(), "BEGIN");
        assert_eq!(Predefined::RollbackTransaction.sql(), "ROLLBACK");
        assert_eq!(Predefined::CommitTransaction.sql(), "COMMIT");
    }
}
