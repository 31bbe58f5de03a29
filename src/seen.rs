use std::sync::Arc;

use anyhow::{Error, Result};
use tracing::{debug, warn};

use crate::{
    models::{event::Stream, status::MarkOutcome},
    traits::{SeenCache, SeenLedger},
};

/// Two-tier record of relayed events.
///
/// The ledger is the source of truth. The cache only short-circuits
/// lookups for events it positively knows were relayed; a cache miss (or a
/// cache error) always falls through to the ledger.
#[derive(Clone)]
pub struct SeenStore {
    cache: Arc<dyn SeenCache>,
    ledger: Arc<dyn SeenLedger>,
}

impl SeenStore {
    pub fn new(cache: Arc<dyn SeenCache>, ledger: Arc<dyn SeenLedger>) -> Self {
        Self { cache, ledger }
    }

    pub async fn is_seen(&self, stream: Stream, event_id: i64) -> Result<bool, Error> {
        match self.cache.contains(stream, event_id).await {
            Ok(true) => {
                debug!(%stream, event_id, "Seen cache hit");
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(%stream, event_id, error = %e, "Seen cache lookup failed, using ledger");
            }
        }

        let seen = self.ledger.contains(stream, event_id).await?;

        if seen {
            debug!(%stream, event_id, "Seen in ledger, warming cache");
            self.warm_cache(stream, event_id).await;
        }

        Ok(seen)
    }

    /// Records a relayed event: ledger first, then cache. A ledger failure
    /// leaves the cache untouched so the event stays unseen.
    pub async fn mark_seen(&self, stream: Stream, event_id: i64) -> Result<MarkOutcome, Error> {
        let outcome = self.ledger.insert(stream, event_id).await?;

        if outcome == MarkOutcome::AlreadyRecorded {
            debug!(%stream, event_id, "Ledger already held a record");
        }

        self.warm_cache(stream, event_id).await;

        Ok(outcome)
    }

    async fn warm_cache(&self, stream: Stream, event_id: i64) {
        if let Err(e) = self.cache.insert(stream, event_id).await {
            warn!(%stream, event_id, error = %e, "Failed to populate seen cache");
        }
    }
}
