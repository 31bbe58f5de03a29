//! Seams between the relay core and the systems it talks to.
//!
//! Production implementations live in [`crate::clients`]; tests swap in
//! in-memory fakes.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    catalog::NotificationTypeCatalog,
    event::{MailHeader, NotificationBody, NotificationHeader, Stream},
    mail::OutgoingEmail,
    relay_config::{AccountCredentials, RelayConfiguration},
    status::MarkOutcome,
};

/// Account-bound view of the remote API.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn list_mail_headers(&self) -> Result<Vec<MailHeader>>;

    async fn fetch_mail_bodies(&self, ids: &[i64]) -> Result<HashMap<i64, String>>;

    async fn list_notification_headers(&self) -> Result<Vec<NotificationHeader>>;

    async fn fetch_notification_bodies(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, NotificationBody>>;

    async fn resolve_character_names(&self, ids: &[i64]) -> Result<HashMap<i64, String>>;
}

/// Opens an [`AccountApi`] session for the configured character.
pub trait AccountApiProvider: Send + Sync {
    fn session(&self, account: &AccountCredentials) -> Arc<dyn AccountApi>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Fast, advisory record of relayed events. May forget entries at any time.
#[async_trait]
pub trait SeenCache: Send + Sync {
    /// `Ok(true)` only when the cache positively knows the event was relayed.
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool>;

    async fn insert(&self, stream: Stream, event_id: i64) -> Result<()>;
}

/// Durable, append-only record of relayed events.
#[async_trait]
pub trait SeenLedger: Send + Sync {
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool>;

    /// Conditional insert: reports `AlreadyRecorded` instead of failing when
    /// the record exists.
    async fn insert(&self, stream: Stream, event_id: i64) -> Result<MarkOutcome>;
}

#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<Option<RelayConfiguration>>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_catalog(&self) -> Result<NotificationTypeCatalog>;
}
