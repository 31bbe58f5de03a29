use std::{
    collections::HashMap,
    future::Future,
    sync::{Mutex, MutexGuard},
};

use futures_util::{StreamExt, future, stream};
use tracing::{info, warn};

use crate::{
    dedup::{Deduplicated, Deduplicator},
    formatter::Formatter,
    models::{
        catalog::NotificationTypeCatalog,
        error::RelayError,
        event::{EventHeader, MailHeader, NotificationBody, NotificationHeader, Stream},
        mail::{OutgoingEmail, RenderedEmail},
        relay_config::RelayConfiguration,
        report::{ItemReport, StreamReport},
        status::{ItemOutcome, MarkOutcome},
    },
    seen::SeenStore,
    traits::{AccountApi, Mailer},
};

/// One formatted event waiting to be sent.
struct PreparedItem {
    event_id: i64,
    email: RenderedEmail,
    detail: Option<String>,
}

/// Fetch, deduplicate, format, send and mark one stream of events.
///
/// Holds no state across runs; everything durable goes through
/// [`SeenStore`].
pub struct RelayPipeline<'a> {
    api: &'a dyn AccountApi,
    seen: &'a SeenStore,
    mailer: &'a dyn Mailer,
    formatter: Formatter,
    destination: &'a RelayConfiguration,
    mail_from: String,
    concurrency: usize,
    items: Mutex<Vec<ItemReport>>,
}

impl<'a> RelayPipeline<'a> {
    pub fn new(
        api: &'a dyn AccountApi,
        seen: &'a SeenStore,
        mailer: &'a dyn Mailer,
        destination: &'a RelayConfiguration,
        mail_from: &str,
    ) -> Self {
        Self {
            api,
            seen,
            mailer,
            formatter: Formatter::default(),
            destination,
            mail_from: mail_from.to_string(),
            concurrency: 1,
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Width of the per-item dispatch pool.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn run_mail(&self) -> Result<StreamReport, RelayError> {
        let stream = Stream::Mail;

        let headers = self
            .api
            .list_mail_headers()
            .await
            .map_err(|e| RelayError::fetch(stream, "headers", e))?;

        let relevant: Vec<MailHeader> = headers
            .into_iter()
            .filter(|header| {
                header
                    .recipient_org_id
                    .is_some_and(|org| self.destination.recipient_org_ids.contains(&org))
            })
            .collect();

        let api = self.api;
        self.relay_new(
            stream,
            relevant,
            |ids| async move { api.fetch_mail_bodies(&ids).await },
            |header: &MailHeader, body: &String, sender: &str| PreparedItem {
                event_id: header.id,
                email: self.formatter.render_mail(header, body, sender),
                detail: None,
            },
        )
        .await
    }

    pub async fn run_notifications(
        &self,
        catalog: &NotificationTypeCatalog,
    ) -> Result<StreamReport, RelayError> {
        let stream = Stream::Notification;

        let headers = self
            .api
            .list_notification_headers()
            .await
            .map_err(|e| RelayError::fetch(stream, "headers", e))?;

        let relevant: Vec<NotificationHeader> = headers
            .into_iter()
            .filter(|header| self.destination.notify_types.contains(&header.type_id))
            .collect();

        let api = self.api;
        self.relay_new(
            stream,
            relevant,
            |ids| async move { api.fetch_notification_bodies(&ids).await },
            |header: &NotificationHeader, body: &NotificationBody, sender: &str| {
                let rendered = self
                    .formatter
                    .render_notification(header, body, sender, catalog);

                if let Some(miss) = &rendered.catalog_miss {
                    warn!(%stream, event_id = header.id, type_id = header.type_id, "{}", miss);
                }

                PreparedItem {
                    event_id: header.id,
                    email: rendered.email,
                    detail: rendered.catalog_miss,
                }
            },
        )
        .await
    }

    /// Outcomes recorded by the current run, emptying the record.
    ///
    /// Items are recorded as soon as they finish, so a run cut short by its
    /// caller still leaves the outcomes it reached here.
    pub fn take_items(&self) -> Vec<ItemReport> {
        std::mem::take(&mut *self.lock_items())
    }

    /// Deduplicates `relevant`, fetches bodies for the new ids, renders and
    /// dispatches them.
    async fn relay_new<H, B, F, Fut, R>(
        &self,
        stream: Stream,
        relevant: Vec<H>,
        fetch_bodies: F,
        render: R,
    ) -> Result<StreamReport, RelayError>
    where
        H: EventHeader,
        F: FnOnce(Vec<i64>) -> Fut,
        Fut: Future<Output = anyhow::Result<HashMap<i64, B>>>,
        R: Fn(&H, &B, &str) -> PreparedItem,
    {
        self.take_items();

        if relevant.is_empty() {
            info!(%stream, "No relevant items");
            return Ok(StreamReport::no_pending_items(stream, Vec::new()));
        }

        let pending = Deduplicator::new(self.seen)
            .new_events(stream, &relevant)
            .await
            .map_err(|source| RelayError::Store { stream, source })?;

        for id in &pending.seen_ids {
            self.record(ItemReport::new(*id, ItemOutcome::AlreadySeen));
        }

        info!(
            %stream,
            new = pending.new_ids.len(),
            already_seen = pending.seen_ids.len(),
            "Deduplicated headers"
        );

        if pending.is_empty() {
            info!(%stream, "No pending items");
            return Ok(StreamReport::no_pending_items(stream, self.take_items()));
        }

        let bodies = fetch_bodies(pending.new_ids.clone())
            .await
            .map_err(|e| RelayError::fetch(stream, "bodies", e))?;
        let senders = self.resolve_senders(stream, &pending).await?;

        let headers: HashMap<i64, &H> =
            relevant.iter().map(|header| (header.id(), header)).collect();

        let mut prepared = Vec::with_capacity(pending.new_ids.len());
        for event_id in &pending.new_ids {
            let (Some(&header), Some(body)) = (headers.get(event_id), bodies.get(event_id)) else {
                self.record(body_missing(stream, *event_id));
                continue;
            };

            let sender = sender_name(&senders, header.sender_id());
            prepared.push(render(header, body, &sender));
        }

        self.dispatch(stream, prepared).await;

        Ok(StreamReport::completed(stream, self.take_items()))
    }

    async fn resolve_senders(
        &self,
        stream: Stream,
        pending: &Deduplicated,
    ) -> Result<HashMap<i64, String>, RelayError> {
        let ids: Vec<i64> = pending.sender_ids.iter().copied().collect();

        self.api
            .resolve_character_names(&ids)
            .await
            .map_err(|e| RelayError::fetch(stream, "sender names", e))
    }

    async fn dispatch(&self, stream: Stream, prepared: Vec<PreparedItem>) {
        stream::iter(prepared)
            .map(|item| self.dispatch_one(stream, item))
            .buffer_unordered(self.concurrency)
            .for_each(|report| {
                self.record(report);
                future::ready(())
            })
            .await
    }

    fn record(&self, report: ItemReport) {
        self.lock_items().push(report);
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<ItemReport>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sends one item and marks it seen. Never fails the batch.
    async fn dispatch_one(&self, stream: Stream, item: PreparedItem) -> ItemReport {
        let event_id = item.event_id;
        let email = OutgoingEmail {
            to: self.destination.destination_mailbox.clone(),
            from: self.mail_from.clone(),
            subject: item.email.subject,
            html: item.email.html,
        };

        if let Err(e) = self.mailer.send(&email).await {
            warn!(%stream, event_id, error = %e, "Failed to send email, will retry next run");
            return ItemReport::new(event_id, ItemOutcome::SendFailed)
                .with_detail(format!("Send failed: {}", e));
        }

        let report = match self.seen.mark_seen(stream, event_id).await {
            Ok(MarkOutcome::Recorded) => ItemReport::new(event_id, ItemOutcome::Relayed),
            Ok(MarkOutcome::AlreadyRecorded) => {
                warn!(%stream, event_id, "Event was recorded by a concurrent run");
                ItemReport::new(event_id, ItemOutcome::Relayed)
                    .with_detail("Already recorded by a concurrent run".to_string())
            }
            Err(e) => {
                warn!(
                    %stream,
                    event_id,
                    error = %e,
                    "Sent but failed to mark as seen, item may be resent"
                );
                return ItemReport::new(event_id, ItemOutcome::MarkFailedAfterSend)
                    .with_detail(format!("Mark seen failed: {}", e));
            }
        };

        info!(%stream, event_id, outcome = %report.outcome, "Processed event");

        match item.detail {
            Some(detail) if report.detail.is_none() => report.with_detail(detail),
            _ => report,
        }
    }
}

fn sender_name(senders: &HashMap<i64, String>, sender_id: i64) -> String {
    senders
        .get(&sender_id)
        .cloned()
        .unwrap_or_else(|| sender_id.to_string())
}

fn body_missing(stream: Stream, event_id: i64) -> ItemReport {
    warn!(%stream, event_id, "No body returned for new event, will retry next run");
    ItemReport::new(event_id, ItemOutcome::BodyMissing)
        .with_detail("No body returned by the account API".to_string())
}
