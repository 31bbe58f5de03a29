use std::collections::{BTreeSet, HashSet};

use anyhow::{Error, Result};

use crate::{
    models::event::{EventHeader, Stream},
    seen::SeenStore,
};

/// Partition of a stream's relevant headers into new and already-relayed ids.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Deduplicated {
    /// Unseen ids, in first-appearance order.
    pub new_ids: Vec<i64>,
    /// Distinct senders of the unseen ids, for one batched name lookup.
    pub sender_ids: BTreeSet<i64>,
    pub seen_ids: Vec<i64>,
}

impl Deduplicated {
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty()
    }
}

pub struct Deduplicator<'a> {
    seen: &'a SeenStore,
}

impl<'a> Deduplicator<'a> {
    pub fn new(seen: &'a SeenStore) -> Self {
        Self { seen }
    }

    /// Duplicate ids in `headers` are considered once. Seen store errors
    /// propagate.
    pub async fn new_events<H: EventHeader>(
        &self,
        stream: Stream,
        headers: &[H],
    ) -> Result<Deduplicated, Error> {
        let mut result = Deduplicated::default();
        let mut visited = HashSet::new();

        for header in headers {
            let id = header.id();
            if !visited.insert(id) {
                continue;
            }

            if self.seen.is_seen(stream, id).await? {
                result.seen_ids.push(id);
            } else {
                result.new_ids.push(id);
                result.sender_ids.insert(header.sender_id());
            }
        }

        Ok(result)
    }
}
