use std::time::Duration;

use thiserror::Error;

use crate::models::event::Stream;

/// Failures that abort a whole run or a whole stream.
///
/// Per-item failures never surface here; they are recorded as
/// [`ItemOutcome`](crate::models::status::ItemOutcome) values instead.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No destination configured")]
    ConfigMissing,

    #[error("Failed to load destination configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to fetch {what} for {stream} stream: {source}")]
    Fetch {
        stream: Stream,
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Seen store unavailable for {stream} stream: {source}")]
    Store {
        stream: Stream,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stream} run exceeded its {deadline:?} deadline")]
    DeadlineExceeded { stream: Stream, deadline: Duration },
}

impl RelayError {
    pub fn fetch(stream: Stream, what: &'static str, source: anyhow::Error) -> Self {
        RelayError::Fetch {
            stream,
            what,
            source,
        }
    }
}
