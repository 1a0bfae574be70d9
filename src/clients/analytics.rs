//! HTTP client for the analytics platform REST API.
//!
//! Every call carries the control attributes as a `CONFIG` query
//! parameter (URL-encoded JSON) and the organization id as a header, per
//! the platform's v2 API convention. Structured failures decode into
//! [`SyncError::Upstream`]; an expired-token code triggers one refresh
//! and retry.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::{Analytics, OAuthTokenSource};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::models::ColumnSpec;

/// Header carrying the organization id on every request.
const ORG_ID_HEADER: &str = "x-org-id";

/// Upstream code reporting an expired access token; retried once after a
/// forced refresh.
const TOKEN_EXPIRED_CODE: u32 = 8535;

pub struct HttpAnalyticsClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<OAuthTokenSource>,
}

impl HttpAnalyticsClient {
    pub fn new(http: reqwest::Client, config: &SyncConfig, token: Arc<OAuthTokenSource>) -> Self {
        Self {
            http,
            base_url: config.analytics_base_url.clone(),
            token,
        }
    }

    /// Send a v2 API request, decoding the `{data}` envelope and
    /// retrying once when the platform reports an expired token.
    async fn send_v2(
        &self,
        method: reqwest::Method,
        path: &str,
        org_id: &str,
        config: Option<&Value>,
    ) -> Result<Value> {
        match self
            .send_v2_once(method.clone(), path, org_id, config)
            .await
        {
            Err(SyncError::Upstream { code, .. }) if code == TOKEN_EXPIRED_CODE => {
                warn!(path, "access token expired mid-flight, refreshing");
                self.token.refresh().await?;
                self.send_v2_once(method, path, org_id, config).await
            }
            other => other,
        }
    }

    async fn send_v2_once(
        &self,
        method: reqwest::Method,
        path: &str,
        org_id: &str,
        config: Option<&Value>,
    ) -> Result<Value> {
        let token = self.token.access_token().await?;
        let mut request = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .header(ORG_ID_HEADER, org_id);
        if let Some(config) = config {
            request = request.query(&[("CONFIG", config.to_string())]);
        }

        decode_envelope(request.send().await?).await
    }
}

/// Decode the platform's `{status, data}` response envelope, mapping
/// failures onto their structured error codes.
async fn decode_envelope(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await?;
    let data = body.get("data").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(data);
    }

    let code = data
        .get("errorCode")
        .and_then(parse_error_code)
        .unwrap_or(0);
    let message = data
        .get("errorMessage")
        .and_then(Value::as_str)
        .unwrap_or("analytics request failed")
        .to_string();
    Err(SyncError::Upstream { code, message })
}

/// Error codes arrive as numbers or numeric strings depending on endpoint.
fn parse_error_code(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .map(|code| code as u32)
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[async_trait]
impl Analytics for HttpAnalyticsClient {
    async fn org_exists(&self, org_id: &str) -> Result<bool> {
        let data = self
            .send_v2(reqwest::Method::GET, "/restapi/v2/orgs", org_id, None)
            .await?;
        let orgs = data.get("orgs").and_then(Value::as_array);
        Ok(orgs.is_some_and(|orgs| {
            orgs.iter()
                .any(|org| org.get("orgId").and_then(Value::as_str) == Some(org_id))
        }))
    }

    #[instrument(skip(self, columns), fields(table = table_name))]
    async fn create_table(
        &self,
        org_id: &str,
        workspace_id: &str,
        table_name: &str,
        columns: &[ColumnSpec],
    ) -> Result<String> {
        let config = json!({
            "tableDesign": {
                "TABLENAME": table_name,
                "COLUMNS": columns,
            }
        });
        let data = self
            .send_v2(
                reqwest::Method::POST,
                &format!("/restapi/v2/workspaces/{workspace_id}/tables"),
                org_id,
                Some(&config),
            )
            .await?;

        let view_id = data
            .get("viewId")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::internal("create table response carried no view id"))?;
        debug!(view_id, "analytics table created");
        Ok(view_id.to_string())
    }

    async fn add_row(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        row: &Value,
    ) -> Result<()> {
        let config = json!({ "columns": row });
        self.send_v2(
            reqwest::Method::POST,
            &format!("/restapi/v2/workspaces/{workspace_id}/views/{view_id}/rows"),
            org_id,
            Some(&config),
        )
        .await?;
        Ok(())
    }

    async fn update_rows(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        row: &Value,
        criteria: &str,
    ) -> Result<u64> {
        let config = json!({ "columns": row, "criteria": criteria });
        let data = self
            .send_v2(
                reqwest::Method::PUT,
                &format!("/restapi/v2/workspaces/{workspace_id}/views/{view_id}/rows"),
                org_id,
                Some(&config),
            )
            .await?;
        Ok(data.get("updatedRows").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn delete_rows(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        criteria: &str,
    ) -> Result<u64> {
        let config = json!({ "criteria": criteria });
        let data = self
            .send_v2(
                reqwest::Method::DELETE,
                &format!("/restapi/v2/workspaces/{workspace_id}/views/{view_id}/rows"),
                org_id,
                Some(&config),
            )
            .await?;
        Ok(data.get("deletedRows").and_then(Value::as_u64).unwrap_or(0))
    }

    #[instrument(skip(self, csv_path), fields(view = view_id))]
    async fn import_csv(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        csv_path: &Path,
        callback_url: &str,
    ) -> Result<String> {
        let config = json!({
            "importType": "append",
            "fileType": "csv",
            "autoIdentify": "true",
            "callbackUrl": callback_url,
        });

        let file = tokio::fs::read(csv_path).await?;
        let file_name = csv_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.csv".to_string());
        let form = multipart::Form::new()
            .part("FILE", multipart::Part::bytes(file).file_name(file_name));

        let token = self.token.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/restapi/v2/bulk/workspaces/{workspace_id}/views/{view_id}/data",
                self.base_url
            ))
            .bearer_auth(token)
            .header(ORG_ID_HEADER, org_id)
            .query(&[("CONFIG", config.to_string())])
            .multipart(form)
            .send()
            .await?;

        let data = decode_envelope(response).await?;
        let job_id = data
            .get("jobId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(job_id = %job_id, "bulk import submitted");
        Ok(job_id)
    }
}
