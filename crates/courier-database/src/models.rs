//! Database model types.

use serde::{Deserialize, Serialize};

/// Chat block state.
///
/// Stored as an integer in `chats.blocked`. Deaddrop chats hold messages
/// from senders the user has not yet accepted or blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blocked {
    Not,
    Manually,
    Deaddrop,
}

impl Default for Blocked {
    fn default() -> Self {
        Self::Not
    }
}

impl Blocked {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Not => 0,
            Self::Manually => 1,
            Self::Deaddrop => 2,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Manually,
            2 => Self::Deaddrop,
            _ => Self::Not,
        }
    }
}

/// Chat type, stored in `chats.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Single,
    Group,
}

impl ChatType {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Single => 100,
            Self::Group => 120,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            120 => Self::Group,
            _ => Self::Single,
        }
    }
}

/// Message state, stored in `msgs.state`.
///
/// Incoming states are 1x, outgoing states are 2x; the numeric gaps leave
/// room for intermediate states without renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    Undefined,
    InFresh,
    InNoticed,
    InSeen,
    OutPending,
    OutFailed,
    OutDelivered,
}

impl Default for MessageState {
    fn default() -> Self {
        Self::Undefined
    }
}

impl MessageState {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Undefined => 0,
            Self::InFresh => 10,
            Self::InNoticed => 13,
            Self::InSeen => 16,
            Self::OutPending => 20,
            Self::OutFailed => 24,
            Self::OutDelivered => 26,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            10 => Self::InFresh,
            13 => Self::InNoticed,
            16 => Self::InSeen,
            20 => Self::OutPending,
            24 => Self::OutFailed,
            26 => Self::OutDelivered,
            _ => Self::Undefined,
        }
    }
}

/// Fields for inserting a new message row.
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub rfc724_mid: String,
    pub chat_id: u32,
    pub from_id: u32,
    pub to_id: u32,
    pub timestamp: i64,
    pub state: MessageState,
    pub txt: String,
    pub txt_raw: String,
    pub param: String,
    pub starred: bool,
    pub hidden: bool,
}
