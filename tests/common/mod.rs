#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use evemail_relay::{
    config::Config,
    formatter::Formatter,
    models::{
        catalog::NotificationTypeCatalog,
        event::{MailHeader, NotificationBody, NotificationHeader, Stream},
        mail::OutgoingEmail,
        relay_config::{AccountCredentials, RelayConfiguration},
        status::MarkOutcome,
    },
    relay::{Relay, RelaySettings},
    seen::SeenStore,
    traits::{
        AccountApi, AccountApiProvider, CatalogSource, ConfigSource, Mailer, SeenCache,
        SeenLedger,
    },
};

pub const ORG: i64 = 98000001;
pub const OTHER_ORG: i64 = 98000002;
pub const ATTACK_TYPE: i64 = 75;

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashSet<(Stream, i64)>>,
    pub failing: AtomicBool,
    pub lookups: AtomicUsize,
}

impl MemoryCache {
    pub fn has(&self, stream: Stream, event_id: i64) -> bool {
        self.entries.lock().unwrap().contains(&(stream, event_id))
    }

    pub fn seed(&self, stream: Stream, event_id: i64) {
        self.entries.lock().unwrap().insert((stream, event_id));
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[async_trait]
impl SeenCache for MemoryCache {
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("cache unavailable"));
        }
        Ok(self.has(stream, event_id))
    }

    async fn insert(&self, stream: Stream, event_id: i64) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("cache unavailable"));
        }
        self.seed(stream, event_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<HashSet<(Stream, i64)>>,
    failing_inserts: Mutex<HashSet<i64>>,
    pub failing_lookups: AtomicBool,
    pub lookups: AtomicUsize,
    pub inserts: AtomicUsize,
}

impl MemoryLedger {
    pub fn has(&self, stream: Stream, event_id: i64) -> bool {
        self.records.lock().unwrap().contains(&(stream, event_id))
    }

    pub fn seed(&self, stream: Stream, event_id: i64) {
        self.records.lock().unwrap().insert((stream, event_id));
    }

    pub fn fail_insert(&self, event_id: i64) {
        self.failing_inserts.lock().unwrap().insert(event_id);
    }

    pub fn heal_insert(&self, event_id: i64) {
        self.failing_inserts.lock().unwrap().remove(&event_id);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl SeenLedger for MemoryLedger {
    async fn contains(&self, stream: Stream, event_id: i64) -> Result<bool> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing_lookups.load(Ordering::SeqCst) {
            return Err(anyhow!("ledger unavailable"));
        }
        Ok(self.has(stream, event_id))
    }

    async fn insert(&self, stream: Stream, event_id: i64) -> Result<MarkOutcome> {
        if self.failing_inserts.lock().unwrap().contains(&event_id) {
            return Err(anyhow!("ledger write rejected"));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.records.lock().unwrap().insert((stream, event_id)) {
            Ok(MarkOutcome::Recorded)
        } else {
            Ok(MarkOutcome::AlreadyRecorded)
        }
    }
}

#[derive(Default)]
pub struct FakeAccountApi {
    pub mail_headers: Mutex<Vec<MailHeader>>,
    pub mail_bodies: Mutex<HashMap<i64, String>>,
    pub notification_headers: Mutex<Vec<NotificationHeader>>,
    pub notification_bodies: Mutex<HashMap<i64, NotificationBody>>,
    pub names: Mutex<HashMap<i64, String>>,
    pub fail_mail_headers: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeAccountApi {
    pub fn add_mail(&self, id: i64, sender_id: i64, org: i64, title: &str, body: &str) {
        self.mail_headers.lock().unwrap().push(MailHeader {
            id,
            sender_id,
            timestamp: 1_000_000_000 + id,
            recipient_org_id: Some(org),
            title: title.to_string(),
        });
        self.mail_bodies.lock().unwrap().insert(id, body.to_string());
    }

    pub fn add_notification(&self, id: i64, sender_id: i64, type_id: i64) {
        self.notification_headers
            .lock()
            .unwrap()
            .push(NotificationHeader {
                id,
                sender_id,
                timestamp: 1_000_000_000 + id,
                type_id,
            });
        self.notification_bodies
            .lock()
            .unwrap()
            .insert(id, attack_body());
    }

    pub fn name(&self, id: i64, name: &str) {
        self.names.lock().unwrap().insert(id, name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AccountApi for FakeAccountApi {
    async fn list_mail_headers(&self) -> Result<Vec<MailHeader>> {
        self.record("list_mail_headers".to_string());
        if self.fail_mail_headers.load(Ordering::SeqCst) {
            return Err(anyhow!("account API unavailable"));
        }
        Ok(self.mail_headers.lock().unwrap().clone())
    }

    async fn fetch_mail_bodies(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        self.record(format!("fetch_mail_bodies:{:?}", ids));
        let bodies = self.mail_bodies.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| bodies.get(id).map(|body| (*id, body.clone())))
            .collect())
    }

    async fn list_notification_headers(&self) -> Result<Vec<NotificationHeader>> {
        self.record("list_notification_headers".to_string());
        Ok(self.notification_headers.lock().unwrap().clone())
    }

    async fn fetch_notification_bodies(
        &self,
        ids: &[i64],
    ) -> Result<HashMap<i64, NotificationBody>> {
        self.record(format!("fetch_notification_bodies:{:?}", ids));
        let bodies = self.notification_bodies.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| bodies.get(id).map(|body| (*id, body.clone())))
            .collect())
    }

    async fn resolve_character_names(&self, ids: &[i64]) -> Result<HashMap<i64, String>> {
        self.record(format!("resolve_character_names:{:?}", ids));
        let names = self.names.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| names.get(id).map(|name| (*id, name.clone())))
            .collect())
    }
}

pub struct FakeProvider(pub Arc<FakeAccountApi>);

impl AccountApiProvider for FakeProvider {
    fn session(&self, _account: &AccountCredentials) -> Arc<dyn AccountApi> {
        self.0.clone()
    }
}

/// Records every delivered email; fails sends whose subject is listed and
/// hangs on sends whose subject is stalled.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    failing_subjects: Mutex<HashSet<String>>,
    stalled_subjects: Mutex<HashSet<String>>,
    pub attempts: AtomicUsize,
}

impl RecordingMailer {
    pub fn stall_subject(&self, subject: &str) {
        self.stalled_subjects
            .lock()
            .unwrap()
            .insert(subject.to_string());
    }

    pub fn fail_subject(&self, subject: &str) {
        self.failing_subjects
            .lock()
            .unwrap()
            .insert(subject.to_string());
    }

    pub fn heal(&self) {
        self.failing_subjects.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.sent().into_iter().map(|e| e.subject).collect();
        subjects.sort();
        subjects
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let stalled = self.stalled_subjects.lock().unwrap().contains(&email.subject);
        if stalled {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }
        if self.failing_subjects.lock().unwrap().contains(&email.subject) {
            return Err(anyhow!("mail transport rejected message"));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub struct StaticConfig(pub Result<Option<RelayConfiguration>, String>);

#[async_trait]
impl ConfigSource for StaticConfig {
    async fn load(&self) -> Result<Option<RelayConfiguration>> {
        self.0.clone().map_err(|e| anyhow!(e))
    }
}

pub struct StaticCatalog(pub Option<NotificationTypeCatalog>);

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn load_catalog(&self) -> Result<NotificationTypeCatalog> {
        self.0
            .clone()
            .ok_or_else(|| anyhow!("catalog table unavailable"))
    }
}

pub fn destination() -> RelayConfiguration {
    RelayConfiguration {
        account: AccountCredentials {
            key_id: 123,
            vcode: "vcode".to_string(),
            character_id: 90000001,
        },
        recipient_org_ids: BTreeSet::from([ORG]),
        notify_types: BTreeSet::from([ATTACK_TYPE]),
        destination_mailbox: "ops@example.com".to_string(),
    }
}

pub fn catalog() -> NotificationTypeCatalog {
    [(ATTACK_TYPE, "Starbase attacked".to_string())]
        .into_iter()
        .collect()
}

pub fn attack_body() -> NotificationBody {
    NotificationBody {
        aggressor_id: 1001,
        aggressor_corp_id: 2002,
        aggressor_alliance_id: Some(3003),
        type_id: 16213,
        moon_id: 40000001,
        solar_system_id: 30000142,
        shield_value: 0.5,
        armor_value: 1.0,
        hull_value: 1.0,
    }
}

pub struct Harness {
    pub api: Arc<FakeAccountApi>,
    pub cache: Arc<MemoryCache>,
    pub ledger: Arc<MemoryLedger>,
    pub mailer: Arc<RecordingMailer>,
    pub seen: SeenStore,
    pub destination: RelayConfiguration,
}

impl Harness {
    pub fn new() -> Self {
        let cache = Arc::new(MemoryCache::default());
        let ledger = Arc::new(MemoryLedger::default());
        let seen = SeenStore::new(cache.clone(), ledger.clone());

        Self {
            api: Arc::new(FakeAccountApi::default()),
            cache,
            ledger,
            mailer: Arc::new(RecordingMailer::default()),
            seen,
            destination: destination(),
        }
    }

    pub fn relay(&self, config: StaticConfig, catalog: StaticCatalog) -> Relay {
        self.relay_with(config, catalog, 2, Duration::from_secs(5))
    }

    pub fn relay_with(
        &self,
        config: StaticConfig,
        catalog: StaticCatalog,
        dispatch_concurrency: usize,
        run_deadline: Duration,
    ) -> Relay {
        Relay::new(
            Arc::new(config),
            Arc::new(catalog),
            Arc::new(FakeProvider(self.api.clone())),
            self.mailer.clone(),
            self.seen.clone(),
            RelaySettings {
                mail_from: "relay@example.com".to_string(),
                dispatch_concurrency,
                run_deadline,
                formatter: Formatter::default(),
            },
        )
    }

    pub fn configured_relay(&self) -> Relay {
        self.relay(
            StaticConfig(Ok(Some(self.destination.clone()))),
            StaticCatalog(Some(catalog())),
        )
    }
}

pub fn test_config(account_api_url: &str, mail_api_url: &str) -> Config {
    Config {
        database_url: "postgres://localhost/evemail".to_string(),
        redis_url: "redis://localhost".to_string(),
        seen_cache_ttl_seconds: 3600,
        cache_timeout_ms: 500,
        account_api_url: account_api_url.to_string(),
        account_api_timeout_seconds: 5,
        mail_api_url: mail_api_url.to_string(),
        mail_api_token: "secret-token".to_string(),
        mail_api_timeout_seconds: 5,
        mail_from: "relay@example.com".to_string(),
        circuit_breaker_failure_threshold: 5,
        circuit_breaker_timeout_seconds: 30,
        circuit_breaker_success_threshold: 1,
        max_retry_attempts: 2,
        initial_retry_delay_ms: 10,
        max_retry_delay_ms: 50,
        retry_backoff_multiplier: 2,
        dispatch_concurrency: 1,
        run_deadline_seconds: 30,
        display_utc_offset_minutes: 0,
        server_port: 0,
    }
}
