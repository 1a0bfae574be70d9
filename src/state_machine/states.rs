use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::SyncJob;

/// Pipeline states for one table's bulk sync.
///
/// The state is not persisted separately; it is derived from the job
/// document, which is the single source of truth across invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "page")]
pub enum SyncState {
    /// A read job for the given page is in flight.
    AwaitingDownload { page: u32 },
    /// All pages read; imports are being chained.
    Importing,
    /// Job deleted after the last import callback.
    Completed,
}

impl SyncState {
    /// Derive the pipeline state from a persisted job document.
    ///
    /// Pages resolve their download URLs strictly in order, so the first
    /// unresolved page is the one whose read job is in flight.
    pub fn of(job: &SyncJob) -> Self {
        match job.queries.iter().position(|q| !q.has_download()) {
            Some(index) => Self::AwaitingDownload {
                page: index as u32 + 1,
            },
            None if job.queries.is_empty() => Self::Completed,
            None => Self::Importing,
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingDownload { page } => write!(f, "awaiting_download(page={page})"),
            Self::Importing => write!(f, "importing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}
