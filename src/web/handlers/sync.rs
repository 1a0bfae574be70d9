//! Bulk sync initiation.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::orchestration::{StartSyncOutcome, StartSyncRequest};
use crate::web::errors::{success, ApiError};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportBody {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    view_id: Option<String>,
}

/// `POST /import` - start a multi-page bulk sync for one table.
pub async fn start_import(
    State(state): State<AppState>,
    Json(body): Json<StartImportBody>,
) -> Result<Json<Value>, ApiError> {
    let table_name = non_empty(body.table_name, "'tableName' cannot be empty.")?;
    let org_id = non_empty(body.org_id, "'orgId' cannot be empty.")?;
    let workspace_id = non_empty(body.workspace_id, "'workspaceId' cannot be empty.")?;

    let outcome = state
        .orchestrator
        .start_sync(StartSyncRequest {
            table_name,
            org_id,
            workspace_id,
            view_id: body.view_id,
        })
        .await?;

    let message = match outcome {
        StartSyncOutcome::Started { .. } => {
            "Successfully initiated bulk import to Analytics, and it will be reflected \
             in sometime. Check the logs for more details."
        }
        StartSyncOutcome::NothingToSync => {
            "The given table has no rows; there is nothing to move to Analytics."
        }
    };
    Ok(success(message))
}

fn non_empty(value: Option<String>, message: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SyncError::validation(message).into()),
    }
}
