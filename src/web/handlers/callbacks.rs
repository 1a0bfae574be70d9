//! Webhook callbacks from the two asynchronous bulk jobs.
//!
//! `POST /export-datastore` fires when a datastore bulk-read page
//! finishes; `POST /import-analytics` fires when an analytics bulk
//! import finishes. Each invocation advances the stored job by exactly
//! one transition.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SyncError;
use crate::orchestration::{ImportJobCallback, ReadJobCallback};
use crate::web::errors::{success, ApiError};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadCallbackBody {
    table_name: String,
    status: String,
    #[serde(default)]
    results: ReadResults,
    #[serde(default)]
    query: Vec<ReadQueryEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ReadResults {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadQueryEntry {
    details: ReadQueryDetails,
}

#[derive(Debug, Deserialize)]
struct ReadQueryDetails {
    page: Value,
}

/// `POST /export-datastore` - a bulk-read page completed.
pub async fn export_datastore(
    State(state): State<AppState>,
    Json(body): Json<ReadCallbackBody>,
) -> Result<Json<Value>, ApiError> {
    let page = body
        .query
        .first()
        .and_then(|entry| parse_page(&entry.details.page))
        .ok_or_else(|| SyncError::validation("callback carried no page number"))?;

    let message = state
        .orchestrator
        .on_read_page_complete(
            &body.table_name,
            ReadJobCallback {
                page,
                status: body.status,
                download_url: body.results.download_url,
                description: body.results.description,
            },
        )
        .await?;
    Ok(success(message))
}

#[derive(Debug, Deserialize)]
pub struct ImportCallbackParams {
    #[serde(rename = "tableName")]
    table_name: String,
    page: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCallbackBody {
    job_status: String,
    #[serde(default)]
    job_info: Option<Value>,
}

/// `POST /import-analytics?tableName=..&page=N` - a bulk import completed.
pub async fn import_analytics(
    State(state): State<AppState>,
    Query(params): Query<ImportCallbackParams>,
    Json(body): Json<ImportCallbackBody>,
) -> Result<Json<Value>, ApiError> {
    let message = state
        .orchestrator
        .on_import_page_complete(
            &params.table_name,
            ImportJobCallback {
                page: params.page,
                job_status: body.job_status,
                job_info: body.job_info.map(|info| info.to_string()),
            },
        )
        .await?;
    Ok(Json(json!({
        "status": "Success",
        "message": message,
    })))
}

/// Page numbers arrive as integers or numeric strings depending on the
/// callback producer.
fn parse_page(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
