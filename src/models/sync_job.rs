//! # Sync Job Model
//!
//! The persisted aggregate for one table's in-flight bulk sync. The whole
//! document crosses invocation boundaries through the segment store; no
//! in-process state survives between callbacks.
//!
//! ## Shape
//!
//! One [`SyncJob`] per table, keyed `Analytics_<tableName>`, holding an
//! ordered list of [`PageQuery`] descriptors (index = page number − 1).
//! The list is append-only at creation and mutated in place afterwards,
//! never reordered or resized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{segment_key, MAX_RECORDS_PER_PAGE};

/// Descriptor for one bulk-read page of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub table_name: String,
    /// 1-based sequence number.
    pub page: u32,
    /// Ordered column names to read; identical for every page of a job.
    pub columns: Vec<String>,
    /// Endpoint the datastore bulk-read job notifies on completion.
    pub callback_url: String,
    /// Result-archive location; empty until exactly one read-completion
    /// callback fills it, never cleared afterwards.
    #[serde(default)]
    pub download_url: String,
}

impl PageQuery {
    pub fn has_download(&self) -> bool {
        !self.download_url.is_empty()
    }
}

/// Persisted aggregate for one table's bulk sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub table_name: String,
    pub org_id: String,
    pub workspace_id: String,
    pub view_id: String,
    /// Ordered page descriptors; `queries[n]` is page `n + 1`.
    pub queries: Vec<PageQuery>,
    /// Highest page whose import callback has been accepted; 0 while the
    /// read phase runs. Imports advance it strictly one page at a time,
    /// so a replayed import callback no longer matches the document.
    #[serde(default)]
    pub last_imported_page: u32,
    /// Optimistic concurrency stamp; bumped by the store on every update.
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    pub fn new(
        table_name: impl Into<String>,
        org_id: impl Into<String>,
        workspace_id: impl Into<String>,
        view_id: impl Into<String>,
        queries: Vec<PageQuery>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            org_id: org_id.into(),
            workspace_id: workspace_id.into(),
            view_id: view_id.into(),
            queries,
            last_imported_page: 0,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Build the page descriptors for a job: pages `1..=total` with
    /// identical columns and callback URL.
    pub fn build_queries(
        table_name: &str,
        total_pages: u32,
        columns: &[String],
        callback_url: &str,
    ) -> Vec<PageQuery> {
        (1..=total_pages)
            .map(|page| PageQuery {
                table_name: table_name.to_string(),
                page,
                columns: columns.to_vec(),
                callback_url: callback_url.to_string(),
                download_url: String::new(),
            })
            .collect()
    }

    pub fn total_pages(&self) -> u32 {
        self.queries.len() as u32
    }

    pub fn segment_key(&self) -> String {
        segment_key(&self.table_name)
    }

    /// Number of pages required to read `row_count` rows.
    pub fn page_count(row_count: u64) -> u32 {
        row_count.div_ceil(MAX_RECORDS_PER_PAGE) as u32
    }
}
