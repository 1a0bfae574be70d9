//! # Upstream Service Clients
//!
//! Trait seams and HTTP implementations for the two external systems the
//! pipeline talks to:
//!
//! - [`datastore`] - the tenant datastore (schema, counts, rows, bulk-read
//!   jobs, result downloads)
//! - [`analytics`] - the analytics platform (orgs, table creation, row
//!   mutations, bulk CSV import)
//! - [`oauth`] - the shared refresh-token flow both HTTP clients use
//!
//! The orchestrator and row mirror depend only on the traits, which keeps
//! every pipeline transition testable without a network.

pub mod analytics;
pub mod datastore;
pub mod oauth;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ColumnSpec, PageQuery, SourceColumn};

pub use analytics::HttpAnalyticsClient;
pub use datastore::HttpDatastoreClient;
pub use oauth::OAuthTokenSource;

/// Tenant datastore operations the pipeline needs.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Whether a table with this exact name exists.
    async fn table_exists(&self, table_name: &str) -> Result<bool>;

    /// Full column schema of a table, unfiltered.
    async fn table_columns(&self, table_name: &str) -> Result<Vec<SourceColumn>>;

    /// Total row count of a table.
    async fn row_count(&self, table_name: &str) -> Result<u64>;

    /// Fetch a single row by id. `Ok(None)` when the row does not exist.
    async fn get_row(&self, table_name: &str, row_id: &str)
        -> Result<Option<serde_json::Value>>;

    /// Create an asynchronous bulk-read job for one page, registering the
    /// query's callback URL for the completion notification.
    async fn create_bulk_read_job(&self, query: &PageQuery) -> Result<()>;

    /// Download a bulk-read result archive to `destination`.
    async fn download_result(&self, download_url: &str, destination: &Path) -> Result<()>;
}

/// Analytics platform operations the pipeline needs.
#[async_trait]
pub trait Analytics: Send + Sync {
    /// Whether the organization id appears in the live org list.
    async fn org_exists(&self, org_id: &str) -> Result<bool>;

    /// Create a table from a design; returns the new view id.
    async fn create_table(
        &self,
        org_id: &str,
        workspace_id: &str,
        table_name: &str,
        columns: &[ColumnSpec],
    ) -> Result<String>;

    /// Insert one row into a view.
    async fn add_row(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        row: &serde_json::Value,
    ) -> Result<()>;

    /// Update rows matching `criteria`; returns the affected row count.
    async fn update_rows(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        row: &serde_json::Value,
        criteria: &str,
    ) -> Result<u64>;

    /// Delete rows matching `criteria`; returns the deleted row count.
    async fn delete_rows(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        criteria: &str,
    ) -> Result<u64>;

    /// Submit a CSV file to the asynchronous bulk import endpoint with
    /// append semantics, registering `callback_url` for the completion
    /// notification. Returns the import job id.
    async fn import_csv(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        csv_path: &Path,
        callback_url: &str,
    ) -> Result<String>;
}

/// Criteria expression matching a single row by its datastore row id.
pub fn row_id_criteria(row_id: &str) -> String {
    format!("ROWID = {row_id}")
}
