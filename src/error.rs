//! # Core Error Types
//!
//! Central error taxonomy for the sync service. Every failure surfaced to
//! an HTTP caller maps onto one of these variants; the web layer converts
//! them into responses without leaking internal detail for unclassified
//! failures.

use thiserror::Error;

use crate::constants::upstream_status;
use crate::segment::SegmentError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    /// Unknown organization, table, or row.
    #[error("{0}")]
    NotFound(String),

    /// Shared-secret mismatch on an inbound request.
    #[error("{0}")]
    Auth(String),

    /// The stored job document changed between read and write; another
    /// callback for the same table won the race.
    #[error("sync job for table '{table}' was modified by a concurrent callback")]
    Conflict { table: String },

    /// The analytics platform returned a structured error code.
    #[error("analytics platform error {code}: {message}")]
    Upstream { code: u32, message: String },

    /// A bulk job reported a non-success status in its callback.
    #[error("bulk job failed: {0}")]
    JobFailed(String),

    #[error("segment store error: {0}")]
    Segment(#[from] SegmentError),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    Internal(String),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status this error maps to when reported to a caller.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Auth(_) => 401,
            Self::Conflict { .. } => 409,
            Self::Upstream { code, .. } => upstream_status(*code),
            Self::Segment(SegmentError::DuplicateKey(_)) => 400,
            Self::Segment(SegmentError::VersionMismatch(_)) => 409,
            _ => 500,
        }
    }

    /// Whether the message is safe to echo back to the caller. Internal
    /// failures get a generic body; the detail goes to the logs only.
    pub fn is_caller_visible(&self) -> bool {
        self.http_status() != 500
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SyncError::validation("x").http_status(), 400);
        assert_eq!(SyncError::not_found("x").http_status(), 404);
        assert_eq!(SyncError::Auth("denied".into()).http_status(), 401);
        assert_eq!(
            SyncError::Conflict {
                table: "t".into()
            }
            .http_status(),
            409
        );
        assert_eq!(
            SyncError::Upstream {
                code: 7103,
                message: "view not found".into()
            }
            .http_status(),
            404
        );
        assert_eq!(SyncError::internal("boom").http_status(), 500);
    }

    #[test]
    fn test_caller_visibility() {
        assert!(SyncError::validation("x").is_caller_visible());
        assert!(!SyncError::internal("secret detail").is_caller_visible());
        assert!(!SyncError::JobFailed("page 2 aborted".into()).is_caller_visible());
    }
}
