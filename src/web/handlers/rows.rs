//! Per-record mirror endpoints.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SyncError;
use crate::orchestration::{ChangeEvent, RowAction, RowOutcome};
use crate::web::errors::{success, ApiError};
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRowBody {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    row_id: Option<Value>,
    #[serde(default)]
    org_id: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    workspace_id: Option<String>,
    #[serde(default)]
    view_id: Option<String>,
}

/// `POST /row` - mirror one datastore row into an analytics view.
pub async fn mirror_row(
    State(state): State<AppState>,
    Json(body): Json<MirrorRowBody>,
) -> Result<Json<Value>, ApiError> {
    let table_name = non_empty(body.table_name, "'tableName' cannot be empty.")?;
    let row_id = row_id_string(body.row_id).ok_or_else(|| {
        ApiError::from(SyncError::validation("'rowId' cannot be empty."))
    })?;
    let org_id = non_empty(body.org_id, "'orgId' cannot be empty.")?;
    let action = non_empty(body.action, "'action' cannot be empty.")?;
    let action: RowAction = action.to_lowercase().parse()?;
    let workspace_id = non_empty(body.workspace_id, "'workspaceId' cannot be empty.")?;
    let view_id = non_empty(body.view_id, "'viewId' cannot be empty.")?;

    let outcome = state
        .row_mirror
        .mirror_row(&org_id, &workspace_id, &view_id, &table_name, &row_id, action)
        .await?;

    match outcome {
        RowOutcome::Inserted => Ok(success(
            "The specific row got successfully created in Analytics.",
        )),
        RowOutcome::Updated => Ok(success(
            "The specific row got successfully updated in Analytics.",
        )),
        RowOutcome::NoRowsAffected => {
            Err(SyncError::not_found("Cannot find the row in Analytics.").into())
        }
    }
}

/// `POST /event` - apply a batch of datastore changes to the configured
/// destination view.
pub async fn change_event(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent>,
) -> Result<Json<Value>, ApiError> {
    if event.table_name.trim().is_empty() {
        return Err(SyncError::validation("'tableName' cannot be empty.").into());
    }
    if event.rows.is_empty() {
        return Err(SyncError::validation("'rows' cannot be empty.").into());
    }

    let summary = state.row_mirror.apply_change_event(&event).await?;
    Ok(success(format!(
        "Change event processed: {} row(s) applied, {} skipped.",
        summary.applied, summary.missed
    )))
}

fn non_empty(value: Option<String>, message: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SyncError::validation(message).into()),
    }
}

/// Row ids arrive as numbers or strings depending on the caller.
fn row_id_string(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
