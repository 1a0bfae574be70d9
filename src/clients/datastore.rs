//! HTTP client for the tenant datastore REST API.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{Datastore, OAuthTokenSource};
use crate::config::SyncConfig;
use crate::constants::headers;
use crate::error::{Result, SyncError};
use crate::models::{PageQuery, SourceColumn};

/// Header carrying the deployment environment on result downloads.
const ENVIRONMENT_HEADER: &str = "environment";

#[derive(Debug, Deserialize)]
struct TableEntry {
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct TableListResponse {
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct ColumnListResponse {
    columns: Vec<SourceColumn>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    rows: Vec<serde_json::Value>,
}

pub struct HttpDatastoreClient {
    http: reqwest::Client,
    base_url: String,
    environment: String,
    secret_key: String,
    token: Arc<OAuthTokenSource>,
}

impl HttpDatastoreClient {
    pub fn new(http: reqwest::Client, config: &SyncConfig, token: Arc<OAuthTokenSource>) -> Self {
        Self {
            http,
            base_url: config.datastore_base_url.clone(),
            environment: config.environment.clone(),
            secret_key: config.secret_key.clone(),
            token,
        }
    }

    async fn authorized(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.token.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::internal(format!(
            "datastore request failed with {status}: {body}"
        )))
    }
}

#[async_trait]
impl Datastore for HttpDatastoreClient {
    async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let request = self.http.get(format!("{}/tables", self.base_url));
        let response = self.authorized(request).await?.send().await?;
        let list: TableListResponse = self.check(response).await?.json().await?;
        Ok(list
            .tables
            .iter()
            .any(|table| table.table_name.trim() == table_name))
    }

    async fn table_columns(&self, table_name: &str) -> Result<Vec<SourceColumn>> {
        let request = self
            .http
            .get(format!("{}/tables/{table_name}/columns", self.base_url));
        let response = self.authorized(request).await?.send().await?;
        let list: ColumnListResponse = self.check(response).await?.json().await?;
        Ok(list.columns)
    }

    async fn row_count(&self, table_name: &str) -> Result<u64> {
        let request = self
            .http
            .post(format!("{}/query", self.base_url))
            .json(&json!({ "query": format!("SELECT COUNT(ROWID) FROM {table_name}") }));
        let response = self.authorized(request).await?.send().await?;
        let result: QueryResponse = self.check(response).await?.json().await?;

        parse_count(&result.rows).ok_or_else(|| {
            SyncError::internal(format!("count query for '{table_name}' returned no count"))
        })
    }

    async fn get_row(
        &self,
        table_name: &str,
        row_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        let request = self
            .http
            .get(format!("{}/tables/{table_name}/rows/{row_id}", self.base_url));
        let response = self.authorized(request).await?.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let row = self.check(response).await?.json().await?;
        Ok(Some(row))
    }

    #[instrument(skip(self, query), fields(table = %query.table_name, page = query.page))]
    async fn create_bulk_read_job(&self, query: &PageQuery) -> Result<()> {
        let body = json!({
            "table_identifier": query.table_name,
            "query": {
                "page": query.page,
                "select_columns": query.columns,
            },
            "callback": {
                "url": query.callback_url,
                "headers": { headers::SECRET_KEY: self.secret_key },
            },
        });

        let request = self
            .http
            .post(format!("{}/bulk/read", self.base_url))
            .json(&body);
        let response = self.authorized(request).await?.send().await?;
        self.check(response).await?;

        debug!("bulk read job created");
        Ok(())
    }

    async fn download_result(&self, download_url: &str, destination: &Path) -> Result<()> {
        let request = self
            .http
            .get(download_url)
            .header(ENVIRONMENT_HEADER, &self.environment);
        let response = self.authorized(request).await?.send().await?;
        let bytes = self.check(response).await?.bytes().await?;
        tokio::fs::write(destination, &bytes).await?;

        debug!(
            bytes = bytes.len(),
            destination = %destination.display(),
            "result archive downloaded"
        );
        Ok(())
    }
}

/// Extract the count from a `SELECT COUNT(ROWID)` result row. The value
/// arrives either as a number or a numeric string depending on backend.
fn parse_count(rows: &[serde_json::Value]) -> Option<u64> {
    let row = rows.first()?.as_object()?;
    row.values().find_map(|value| {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count_number_and_string() {
        assert_eq!(parse_count(&[json!({"COUNT(ROWID)": 450000})]), Some(450_000));
        assert_eq!(parse_count(&[json!({"COUNT(ROWID)": "7"})]), Some(7));
        assert_eq!(parse_count(&[]), None);
        assert_eq!(parse_count(&[json!({"COUNT(ROWID)": null})]), None);
    }
}
