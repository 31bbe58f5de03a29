use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::Mutex, time::timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    formatter::Formatter,
    models::{
        catalog::NotificationTypeCatalog,
        error::RelayError,
        event::Stream,
        relay_config::RelayConfiguration,
        report::{RunReport, StreamReport},
        status::RunStatus,
    },
    pipeline::RelayPipeline,
    seen::SeenStore,
    traits::{AccountApi, AccountApiProvider, CatalogSource, ConfigSource, Mailer},
};

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub mail_from: String,
    pub dispatch_concurrency: usize,
    pub run_deadline: Duration,
    pub formatter: Formatter,
}

/// Runs both streams once per trigger.
///
/// A per-stream lock serializes overlapping triggers for the same stream;
/// the mail and notification streams run concurrently.
pub struct Relay {
    config_source: Arc<dyn ConfigSource>,
    catalog_source: Arc<dyn CatalogSource>,
    api_provider: Arc<dyn AccountApiProvider>,
    mailer: Arc<dyn Mailer>,
    seen: SeenStore,
    settings: RelaySettings,
    mail_lock: Mutex<()>,
    notification_lock: Mutex<()>,
}

impl Relay {
    pub fn new(
        config_source: Arc<dyn ConfigSource>,
        catalog_source: Arc<dyn CatalogSource>,
        api_provider: Arc<dyn AccountApiProvider>,
        mailer: Arc<dyn Mailer>,
        seen: SeenStore,
        settings: RelaySettings,
    ) -> Self {
        Self {
            config_source,
            catalog_source,
            api_provider,
            mailer,
            seen,
            settings,
            mail_lock: Mutex::new(()),
            notification_lock: Mutex::new(()),
        }
    }

    /// Never fails: every outcome, including configuration problems, is
    /// described by the returned report.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        info!(%run_id, "Relay run started");

        let destination = match self.load_destination().await {
            Ok(destination) => destination,
            Err(e) => {
                let status = match e {
                    RelayError::ConfigMissing => {
                        info!(%run_id, "No destination configured, nothing to do");
                        RunStatus::NotConfigured
                    }
                    _ => {
                        error!(%run_id, error = %e, "Failed to load destination configuration");
                        RunStatus::ConfigError
                    }
                };

                return RunReport {
                    run_id,
                    status,
                    started_at,
                    finished_at: Utc::now(),
                    streams: Vec::new(),
                    error: Some(e.to_string()),
                };
            }
        };

        let catalog = self.load_catalog().await;
        let api = self.api_provider.session(&destination.account);

        let (mail, notifications) = tokio::join!(
            self.run_stream(Stream::Mail, api.as_ref(), &destination, &catalog),
            self.run_stream(Stream::Notification, api.as_ref(), &destination, &catalog),
        );

        let report = RunReport {
            run_id,
            status: RunStatus::Completed,
            started_at,
            finished_at: Utc::now(),
            streams: vec![mail, notifications],
            error: None,
        };

        info!(%run_id, "Relay run finished");

        report
    }

    async fn load_destination(&self) -> Result<RelayConfiguration, RelayError> {
        self.config_source
            .load()
            .await
            .map_err(RelayError::Config)?
            .ok_or(RelayError::ConfigMissing)
    }

    async fn load_catalog(&self) -> NotificationTypeCatalog {
        match self.catalog_source.load_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Failed to load notification type catalog, subjects fall back to type ids");
                NotificationTypeCatalog::default()
            }
        }
    }

    /// Runs one stream under its lock and deadline, folding stream-level
    /// errors into a failed report that keeps the items finished so far.
    /// Items still in flight at the deadline are left unreported and unmarked
    /// unless their mark had already landed.
    async fn run_stream(
        &self,
        stream: Stream,
        api: &dyn AccountApi,
        destination: &RelayConfiguration,
        catalog: &NotificationTypeCatalog,
    ) -> StreamReport {
        let lock = match stream {
            Stream::Mail => &self.mail_lock,
            Stream::Notification => &self.notification_lock,
        };
        let _guard = lock.lock().await;

        let pipeline = RelayPipeline::new(
            api,
            &self.seen,
            self.mailer.as_ref(),
            destination,
            &self.settings.mail_from,
        )
        .with_formatter(self.settings.formatter)
        .with_concurrency(self.settings.dispatch_concurrency);

        let deadline = self.settings.run_deadline;
        let result = match stream {
            Stream::Mail => timeout(deadline, pipeline.run_mail()).await,
            Stream::Notification => timeout(deadline, pipeline.run_notifications(catalog)).await,
        }
        .unwrap_or(Err(RelayError::DeadlineExceeded { stream, deadline }));

        match result {
            Ok(report) => report,
            Err(e) => {
                let items = pipeline.take_items();
                error!(
                    %stream,
                    error = %e,
                    finished_items = items.len(),
                    "Stream run failed"
                );
                StreamReport::failed(stream, e.to_string(), items)
            }
        }
    }
}
