use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Mail,
    Notification,
}

impl Stream {
    /// Prefix of the cache key that records a relayed event of this stream.
    pub fn cache_prefix(&self) -> &'static str {
        match self {
            Stream::Mail => "seen",
            Stream::Notification => "nseen",
        }
    }

    /// Durable ledger table and its id column.
    pub fn ledger_table(&self) -> (&'static str, &'static str) {
        match self {
            Stream::Mail => ("seen_mail", "mail_id"),
            Stream::Notification => ("seen_notification", "notification_id"),
        }
    }
}

impl Display for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Stream::Mail => write!(f, "mail"),
            Stream::Notification => write!(f, "notification"),
        }
    }
}

/// Common view of a header used by deduplication.
pub trait EventHeader {
    fn id(&self) -> i64;
    fn sender_id(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailHeader {
    pub id: i64,
    pub sender_id: i64,
    pub timestamp: i64,
    pub recipient_org_id: Option<i64>,
    pub title: String,
}

impl EventHeader for MailHeader {
    fn id(&self) -> i64 {
        self.id
    }

    fn sender_id(&self) -> i64 {
        self.sender_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationHeader {
    pub id: i64,
    pub sender_id: i64,
    pub timestamp: i64,
    pub type_id: i64,
}

impl EventHeader for NotificationHeader {
    fn id(&self) -> i64 {
        self.id
    }

    fn sender_id(&self) -> i64 {
        self.sender_id
    }
}

/// Structured attributes of a structure-attack notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationBody {
    #[serde(rename = "aggressorID")]
    pub aggressor_id: i64,

    #[serde(rename = "aggressorCorpID")]
    pub aggressor_corp_id: i64,

    #[serde(rename = "aggressorAllianceID", default)]
    pub aggressor_alliance_id: Option<i64>,

    #[serde(rename = "typeID")]
    pub type_id: i64,

    #[serde(rename = "moonID")]
    pub moon_id: i64,

    #[serde(rename = "solarSystemID")]
    pub solar_system_id: i64,

    #[serde(rename = "shieldValue")]
    pub shield_value: f64,

    #[serde(rename = "armorValue")]
    pub armor_value: f64,

    #[serde(rename = "hullValue")]
    pub hull_value: f64,
}
