//! # System Constants
//!
//! Platform limits, fixed column exclusions, and the upstream error-code
//! table that define the operational boundaries of the sync service.

/// Maximum rows the datastore bulk-read API returns per page.
///
/// A platform-imposed ceiling; page counts are derived from it and never
/// configurable per request.
pub const MAX_RECORDS_PER_PAGE: u64 = 200_000;

/// Prefix for segment keys holding in-flight sync jobs.
///
/// The full key for a table is `Analytics_<tableName>`.
pub const SEGMENT_KEY_PREFIX: &str = "Analytics";

/// System-managed metadata columns dropped before the analytics table is
/// created and before pages are exported.
pub const OMITTED_COLUMNS: [&str; 3] = ["CREATORID", "CREATEDTIME", "MODIFIEDTIME"];

/// Expected CSV member name inside a bulk-read result archive.
pub fn archive_csv_member(table_name: &str) -> String {
    format!("Table-{table_name}.csv")
}

/// Segment key for a table's sync job document.
pub fn segment_key(table_name: &str) -> String {
    format!("{SEGMENT_KEY_PREFIX}_{table_name}")
}

/// HTTP header names recognized by the service.
pub mod headers {
    /// Shared-secret header checked on every inbound request.
    pub const SECRET_KEY: &str = "x-sync-secret-key";
}

/// Query parameter names used on the import callback route, which cannot
/// carry custom headers.
pub mod query_params {
    pub const SECRET_KEY: &str = "secret-key";
    pub const TABLE_NAME: &str = "tableName";
    pub const PAGE: &str = "page";
}

/// Map a structured analytics error code to the HTTP status reported to
/// the caller. Codes outside the table are unclassified and become 500.
pub fn upstream_status(code: u32) -> u16 {
    match code {
        7003 | 7102 | 7104 | 7507 | 7511 | 8002 | 8004 | 8516 => 400,
        7301 | 8023 => 403,
        7103 | 7105 | 7106 | 8016 => 404,
        7101 | 7111 => 409,
        _ => 500,
    }
}
