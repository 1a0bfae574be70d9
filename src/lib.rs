//! # Analytics Sync
//!
//! Callback-driven synchronization service that moves tables from a
//! tenant datastore into an analytics workspace.
//!
//! Two paths share one crate:
//!
//! - **Bulk pipeline**: a table is exported page by page through
//!   asynchronous bulk-read jobs, each result archive is downloaded,
//!   extracted, and fed to the analytics bulk import API, with webhook
//!   callbacks chaining the pages. Progress lives in a durable segment
//!   store keyed per table; the service itself holds no state between
//!   requests.
//! - **Record mirror**: single-row insert/update on demand, plus batched
//!   insert/update/delete driven by datastore change events.
//!
//! ## Module map
//!
//! - [`config`] - environment-backed service configuration
//! - [`constants`] - paging limits, key formats, type map, status map
//! - [`error`] - the [`error::SyncError`] taxonomy
//! - [`models`] - column specs and the persisted [`models::SyncJob`]
//! - [`segment`] - versioned key-value store behind the pipeline
//! - [`state_machine`] - pure transition planning for callbacks
//! - [`clients`] - datastore and analytics HTTP clients behind traits
//! - [`orchestration`] - the pipeline orchestrator and row mirror
//! - [`web`] - axum routes, handlers, and middleware

pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod files;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod segment;
pub mod state_machine;
pub mod web;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
