//! # Pipeline Orchestration
//!
//! The components that advance a table's sync by one transition per
//! invocation:
//!
//! - [`pipeline`] - the orchestrator: start, read-complete, import-complete
//! - [`transfer`] - download → extract → bulk import glue for one page
//! - [`row_mirror`] - the direct per-record mirror path

pub mod pipeline;
pub mod row_mirror;
pub mod transfer;

pub use pipeline::{ImportJobCallback, ReadJobCallback, StartSyncOutcome, StartSyncRequest, SyncOrchestrator};
pub use row_mirror::{ChangeAction, ChangeEvent, EventSummary, RowAction, RowMirror, RowOutcome};
