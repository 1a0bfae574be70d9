//! # Data Model Layer
//!
//! Persisted and derived documents for the sync pipeline:
//!
//! - [`sync_job`] - The per-table job aggregate stored in the segment store
//! - [`column`] - Source column schema and its analytics type mapping

pub mod column;
pub mod sync_job;

pub use column::{derive_column_specs, AnalyticsDataType, ColumnSpec, SourceColumn};
pub use sync_job::{PageQuery, SyncJob};
