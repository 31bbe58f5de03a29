use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

/// Result of a conditional write to the durable ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Recorded,
    AlreadyRecorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Relayed,
    AlreadySeen,
    SendFailed,
    MarkFailedAfterSend,
    BodyMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Completed,
    NoPendingItems,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NotConfigured,
    ConfigError,
}

impl Display for ItemOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ItemOutcome::Relayed => write!(f, "relayed"),
            ItemOutcome::AlreadySeen => write!(f, "already_seen"),
            ItemOutcome::SendFailed => write!(f, "send_failed"),
            ItemOutcome::MarkFailedAfterSend => write!(f, "mark_failed_after_send"),
            ItemOutcome::BodyMissing => write!(f, "body_missing"),
        }
    }
}
