use serde::{Deserialize, Serialize};

/// Events that advance a table's sync pipeline by one transition.
///
/// Each event corresponds to one inbound callback; there is no in-process
/// event queue. Page numbers are 1-based, matching the persisted
/// `PageQuery` numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SyncEvent {
    /// A bulk-read job finished and published its result archive.
    ReadPageCompleted { page: u32, download_url: String },
    /// The analytics platform finished importing a page.
    ImportPageCompleted { page: u32 },
}

impl SyncEvent {
    /// String representation of the event type for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReadPageCompleted { .. } => "read_page_completed",
            Self::ImportPageCompleted { .. } => "import_page_completed",
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Self::ReadPageCompleted { page, .. } | Self::ImportPageCompleted { page } => *page,
        }
    }
}
