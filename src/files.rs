//! Scoped temporary paths for bulk transfer scratch files.
//!
//! Each page transfer gets its own directory that disappears when the
//! handle drops, so a failed invocation never leaves archives behind.

use tempfile::TempDir;

use crate::error::Result;

/// Create a scratch directory labelled for one transfer.
pub fn scoped_dir(label: &str) -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix(&format!("analytics_{}_", sanitize(label)))
        .tempdir()?;
    Ok(dir)
}

/// Strip path separators and other hostile characters from a label that
/// originates in request data.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
