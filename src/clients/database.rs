use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::{
    models::{
        catalog::NotificationTypeCatalog,
        event::Stream,
        relay_config::{AccountCredentials, RelayConfiguration},
        status::MarkOutcome,
    },
    traits::{CatalogSource, ConfigSource, SeenLedger},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS seen_mail (
    mail_id BIGINT PRIMARY KEY,
    seen_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS seen_notification (
    notification_id BIGINT PRIMARY KEY,
    seen_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
"#;

/// Postgres access for the seen ledger, the destination configuration and
/// the notification type catalog.
pub struct DatabaseClient {
    client: Client,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let mut pg_config: tokio_postgres::Config = database_url
            .parse()
            .map_err(|e| anyhow!("Invalid database url: {}", e))?;
        pg_config
            .connect_timeout(Duration::from_secs(5))
            .options("-c statement_timeout=5000");

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed");
            }
        });

        client
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| anyhow!("Failed to prepare seen tables: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self { client })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl SeenLedger for DatabaseClient {
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool, Error> {
        let (table, column) = stream.ledger_table();
        let query = format!("SELECT 1 FROM {} WHERE {} = $1", table, column);

        let row = self
            .client
            .query_opt(query.as_str(), &[&event_id])
            .await
            .map_err(|e| anyhow!("Failed to look up {} {}: {}", stream, event_id, e))?;

        Ok(row.is_some())
    }

    async fn insert(&self, stream: Stream, event_id: i64) -> Result<MarkOutcome, Error> {
        let (table, column) = stream.ledger_table();
        let query = format!(
            "INSERT INTO {} ({}) VALUES ($1) ON CONFLICT ({}) DO NOTHING",
            table, column, column
        );

        let inserted = self
            .client
            .execute(query.as_str(), &[&event_id])
            .await
            .map_err(|e| {
                error!(%stream, event_id, error = %e, "Failed to record seen event");
                anyhow!("Database write failed: {}", e)
            })?;

        debug!(%stream, event_id, inserted, "Seen record written");

        Ok(if inserted == 0 {
            MarkOutcome::AlreadyRecorded
        } else {
            MarkOutcome::Recorded
        })
    }
}

#[async_trait]
impl ConfigSource for DatabaseClient {
    async fn load(&self) -> Result<Option<RelayConfiguration>, Error> {
        let row = self
            .client
            .query_opt(
                "SELECT key_id, vcode, rcpt_char, rcpt_org, rcpt_org2, dest_email, notify_types \
                 FROM relay_configuration LIMIT 1",
                &[],
            )
            .await
            .map_err(|e| anyhow!("Failed to read relay configuration: {}", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut recipient_org_ids = BTreeSet::new();
        recipient_org_ids.insert(row.try_get::<_, i64>("rcpt_org")?);
        if let Some(secondary) = row.try_get::<_, Option<i64>>("rcpt_org2")? {
            recipient_org_ids.insert(secondary);
        }

        let notify_types: Option<Vec<i64>> = row.try_get("notify_types")?;

        Ok(Some(RelayConfiguration {
            account: AccountCredentials {
                key_id: row.try_get("key_id")?,
                vcode: row.try_get("vcode")?,
                character_id: row.try_get("rcpt_char")?,
            },
            recipient_org_ids,
            notify_types: notify_types.unwrap_or_default().into_iter().collect(),
            destination_mailbox: row.try_get("dest_email")?,
        }))
    }
}

#[async_trait]
impl CatalogSource for DatabaseClient {
    async fn load_catalog(&self) -> Result<NotificationTypeCatalog, Error> {
        let rows = self
            .client
            .query("SELECT type_id, description FROM notification_types", &[])
            .await
            .map_err(|e| anyhow!("Failed to read notification types: {}", e))?;

        let mut descriptions = HashMap::with_capacity(rows.len());
        for row in &rows {
            descriptions.insert(
                row.try_get::<_, i64>("type_id")?,
                row.try_get::<_, String>("description")?,
            );
        }

        debug!(entries = descriptions.len(), "Loaded notification type catalog");

        Ok(NotificationTypeCatalog::new(descriptions))
    }
}
