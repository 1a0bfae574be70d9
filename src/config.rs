//! # Service Configuration
//!
//! Explicit configuration loaded once at process start. Business logic
//! never reads the environment directly; everything it needs arrives
//! through [`SyncConfig`]. Missing required keys fail startup with a
//! configuration error instead of falling back silently.

use std::collections::HashMap;
use std::env;

use crate::error::{Result, SyncError};

/// Environment variable names recognized by the service.
pub mod env_keys {
    pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const CALLBACK_BASE_URL: &str = "CALLBACK_BASE_URL";
    pub const DATASTORE_BASE_URL: &str = "DATASTORE_BASE_URL";
    pub const ANALYTICS_BASE_URL: &str = "ANALYTICS_BASE_URL";
    pub const AUTH_HOST: &str = "AUTH_HOST";
    pub const CLIENT_ID: &str = "CLIENT_ID";
    pub const CLIENT_SECRET: &str = "CLIENT_SECRET";
    pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
    pub const SECRET_KEY: &str = "SECRET_KEY";
    pub const SYNC_ENV: &str = "SYNC_ENV";
    pub const ORG_ID: &str = "ORG_ID";
    pub const WORKSPACE_ID: &str = "WORKSPACE_ID";

    /// Suffix of the per-table view-id variables consumed by the change
    /// event mirror, e.g. `ORDERS_VIEW_ID`.
    pub const VIEW_ID_SUFFIX: &str = "_VIEW_ID";
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Postgres connection string for the segment store.
    pub database_url: String,
    /// Public base URL of this service, used to build bulk-job callback URLs.
    pub callback_base_url: String,
    /// Base URL of the tenant datastore REST API.
    pub datastore_base_url: String,
    /// Base URL of the analytics platform REST API.
    pub analytics_base_url: String,
    /// OAuth token endpoint host.
    pub auth_host: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Shared secret expected on every inbound request.
    pub secret_key: String,
    /// Deployment environment name, forwarded to the datastore on
    /// result-archive downloads.
    pub environment: String,
    /// Default organization for the change event mirror. Bulk syncs carry
    /// their org in the request instead.
    pub org_id: Option<String>,
    /// Default workspace for the change event mirror.
    pub workspace_id: Option<String>,
    /// Destination view ids for the change event mirror, keyed by
    /// upper-cased table name.
    pub view_ids: HashMap<String, String>,
}

impl SyncConfig {
    /// Load configuration from the process environment.
    ///
    /// Reads a `.env` file first when one is present (development
    /// convenience; real deployments inject variables directly).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_address: optional(env_keys::BIND_ADDRESS, "0.0.0.0:3000"),
            database_url: required(env_keys::DATABASE_URL)?,
            callback_base_url: trim_trailing_slash(required(env_keys::CALLBACK_BASE_URL)?),
            datastore_base_url: trim_trailing_slash(required(env_keys::DATASTORE_BASE_URL)?),
            analytics_base_url: trim_trailing_slash(required(env_keys::ANALYTICS_BASE_URL)?),
            auth_host: optional(env_keys::AUTH_HOST, "https://accounts.example.com"),
            client_id: required(env_keys::CLIENT_ID)?,
            client_secret: required(env_keys::CLIENT_SECRET)?,
            refresh_token: required(env_keys::REFRESH_TOKEN)?,
            secret_key: required(env_keys::SECRET_KEY)?,
            environment: optional(env_keys::SYNC_ENV, "development"),
            org_id: env::var(env_keys::ORG_ID).ok().filter(|v| !v.trim().is_empty()),
            workspace_id: env::var(env_keys::WORKSPACE_ID)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            view_ids: collect_view_ids(env::vars()),
        })
    }

    /// Destination view id for a table, if one is configured.
    pub fn view_id_for(&self, table_name: &str) -> Option<&str> {
        self.view_ids
            .get(&table_name.to_uppercase())
            .map(String::as_str)
    }
}

fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SyncError::Configuration(format!(
            "required environment variable '{key}' is not set"
        ))),
    }
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn trim_trailing_slash(mut value: String) -> String {
    while value.ends_with('/') {
        value.pop();
    }
    value
}

/// Collect `<TABLE>_VIEW_ID` variables into a table → view-id map.
fn collect_view_ids(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter_map(|(key, value)| {
        key.strip_suffix(env_keys::VIEW_ID_SUFFIX)
            .filter(|table| !table.is_empty() && !value.trim().is_empty())
            .map(|table| (table.to_uppercase(), value))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_view_ids() {
        let vars = vec![
            ("ORDERS_VIEW_ID".to_string(), "171000123".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("_VIEW_ID".to_string(), "ignored".to_string()),
            ("invoices_VIEW_ID".to_string(), "171000456".to_string()),
        ];
        let map = collect_view_ids(vars.into_iter());
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("ORDERS").map(String::as_str), Some("171000123"));
        assert_eq!(map.get("INVOICES").map(String::as_str), Some("171000456"));
    }

    #[test]
    fn test_trim_trailing_slash() {
        assert_eq!(
            trim_trailing_slash("https://api.example.com/".into()),
            "https://api.example.com"
        );
        assert_eq!(
            trim_trailing_slash("https://api.example.com".into()),
            "https://api.example.com"
        );
    }
}
