use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    event::Stream,
    status::{ItemOutcome, RunStatus, StreamStatus},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub event_id: i64,
    pub outcome: ItemOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ItemReport {
    pub fn new(event_id: i64, outcome: ItemOutcome) -> Self {
        Self {
            event_id,
            outcome,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub stream: Stream,
    pub status: StreamStatus,
    pub items: Vec<ItemReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamReport {
    pub fn no_pending_items(stream: Stream, items: Vec<ItemReport>) -> Self {
        Self {
            stream,
            status: StreamStatus::NoPendingItems,
            items,
            error: None,
        }
    }

    pub fn completed(stream: Stream, items: Vec<ItemReport>) -> Self {
        Self {
            stream,
            status: StreamStatus::Completed,
            items,
            error: None,
        }
    }

    /// `items` holds the outcomes reached before the failure.
    pub fn failed(stream: Stream, error: String, items: Vec<ItemReport>) -> Self {
        Self {
            stream,
            status: StreamStatus::Failed,
            items,
            error: Some(error),
        }
    }

    pub fn count(&self, outcome: ItemOutcome) -> usize {
        self.items.iter().filter(|item| item.outcome == outcome).count()
    }

    pub fn item(&self, event_id: i64) -> Option<&ItemReport> {
        self.items.iter().find(|item| item.event_id == event_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub streams: Vec<StreamReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn stream(&self, stream: Stream) -> Option<&StreamReport> {
        self.streams.iter().find(|report| report.stream == stream)
    }
}
