//! # Pipeline State Store
//!
//! Durable key-value segment holding sync job documents across stateless
//! invocations. One self-contained key per table; no multi-key guarantee
//! is assumed or required.
//!
//! Implemented by concrete providers:
//! - [`postgres`] - durable, versioned JSONB rows (production)
//! - [`memory`] - process-local map with identical semantics (tests)

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemorySegmentStore;
pub use postgres::PostgresSegmentStore;

/// Errors that can occur during segment store operations.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment connection error: {0}")]
    Connection(String),

    #[error("segment value serialization error: {0}")]
    Serialization(String),

    /// `put` on a key that already holds a document.
    #[error("segment key already exists: {0}")]
    DuplicateKey(String),

    /// `update` on a key with no document.
    #[error("segment key not found: {0}")]
    Missing(String),

    /// `update` with a stale version; the document changed since it was read.
    #[error("segment version mismatch for key: {0}")]
    VersionMismatch(String),

    #[error("segment backend error: {0}")]
    Backend(String),
}

pub type SegmentResult<T> = Result<T, SegmentError>;

/// A document read from the store together with its version stamp.
#[derive(Debug, Clone)]
pub struct VersionedValue {
    pub value: serde_json::Value,
    pub version: i64,
}

/// Contract of the pipeline state store.
///
/// `put` creates and fails on an existing key; `update` is a
/// compare-and-swap overwrite keyed on the version returned by `get`;
/// `delete` is idempotent. Values are opaque serialized job documents.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Fetch a document. `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> SegmentResult<Option<VersionedValue>>;

    /// Create a document. Fails with [`SegmentError::DuplicateKey`] when
    /// the key is already present.
    async fn put(&self, key: &str, value: &serde_json::Value) -> SegmentResult<()>;

    /// Overwrite an existing document, succeeding only when the stored
    /// version still equals `expected_version`. Returns the new version.
    async fn update(
        &self,
        key: &str,
        value: &serde_json::Value,
        expected_version: i64,
    ) -> SegmentResult<i64>;

    /// Remove a document. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> SegmentResult<()>;

    /// Name of the backing provider, for logs.
    fn provider_name(&self) -> &'static str;
}
