use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Credentials that bind an API session to one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredentials {
    pub key_id: i64,
    pub vcode: String,
    pub character_id: i64,
}

/// Snapshot of the destination configuration, read once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfiguration {
    pub account: AccountCredentials,
    pub recipient_org_ids: BTreeSet<i64>,
    pub notify_types: BTreeSet<i64>,
    pub destination_mailbox: String,
}
