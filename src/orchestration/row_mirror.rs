//! # Per-Record Mirror
//!
//! The direct path that keeps individual analytics rows aligned with the
//! datastore, independent of any bulk sync: single-row insert/update on
//! request, and batched insert/update/delete driven by datastore change
//! events. Every mutation targets rows by `ROWID` criteria, so updates
//! and deletes are idempotent while inserts are not.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::clients::{row_id_criteria, Analytics, Datastore};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

/// Action requested for a single-row mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
}

impl FromStr for RowAction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            _ => Err(SyncError::validation(
                "Only 'insert' or 'update' action is supported.",
            )),
        }
    }
}

/// What a single-row mirror did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    Updated,
    /// The update criteria matched nothing in the destination view.
    NoRowsAffected,
}

/// Operation carried by a datastore change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A batch of row changes from the datastore's event stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table_name: String,
    pub action: ChangeAction,
    pub rows: Vec<Value>,
}

/// Per-batch application counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub applied: usize,
    /// Rows whose criteria matched nothing; logged, never fatal.
    pub missed: usize,
}

pub struct RowMirror {
    datastore: Arc<dyn Datastore>,
    analytics: Arc<dyn Analytics>,
    default_org_id: Option<String>,
    default_workspace_id: Option<String>,
    view_ids: HashMap<String, String>,
}

impl RowMirror {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        analytics: Arc<dyn Analytics>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            datastore,
            analytics,
            default_org_id: config.org_id.clone(),
            default_workspace_id: config.workspace_id.clone(),
            view_ids: config.view_ids.clone(),
        }
    }

    /// Mirror a single datastore row into an analytics view.
    ///
    /// The row is fetched fresh from the datastore so the mirror always
    /// carries the current values, not what the caller believed them to be.
    #[instrument(skip(self), fields(table = table_name, row = row_id))]
    pub async fn mirror_row(
        &self,
        org_id: &str,
        workspace_id: &str,
        view_id: &str,
        table_name: &str,
        row_id: &str,
        action: RowAction,
    ) -> Result<RowOutcome> {
        if !self.datastore.table_exists(table_name).await? {
            return Err(SyncError::not_found(
                "No such Table with the given name exists",
            ));
        }
        let row = self
            .datastore
            .get_row(table_name, row_id)
            .await?
            .ok_or_else(|| {
                SyncError::not_found(format!(
                    "No row with id {row_id} exists in table {table_name}"
                ))
            })?;

        match action {
            RowAction::Insert => {
                self.analytics
                    .add_row(org_id, workspace_id, view_id, &row)
                    .await?;
                Ok(RowOutcome::Inserted)
            }
            RowAction::Update => {
                let affected = self
                    .analytics
                    .update_rows(org_id, workspace_id, view_id, &row, &row_id_criteria(row_id))
                    .await?;
                if affected == 0 {
                    Ok(RowOutcome::NoRowsAffected)
                } else {
                    Ok(RowOutcome::Updated)
                }
            }
        }
    }

    /// Apply a batch of datastore changes to the configured view for the
    /// event's table.
    ///
    /// Rows missing a `ROWID` and criteria that match nothing are logged
    /// and skipped; an upstream failure aborts the batch.
    #[instrument(skip(self, event), fields(table = %event.table_name, rows = event.rows.len()))]
    pub async fn apply_change_event(&self, event: &ChangeEvent) -> Result<EventSummary> {
        let org_id = self.default_org_id.as_deref().ok_or_else(|| {
            SyncError::Configuration("no default organization configured for change events".into())
        })?;
        let workspace_id = self.default_workspace_id.as_deref().ok_or_else(|| {
            SyncError::Configuration("no default workspace configured for change events".into())
        })?;
        let view_id = self
            .view_ids
            .get(&event.table_name.to_uppercase())
            .ok_or_else(|| {
                SyncError::Configuration(format!(
                    "no destination view configured for table '{}'",
                    event.table_name
                ))
            })?;

        let mut summary = EventSummary::default();
        for row in &event.rows {
            let Some(row_id) = row_id_of(row) else {
                warn!("change event row carries no ROWID, skipping");
                summary.missed += 1;
                continue;
            };
            let criteria = row_id_criteria(&row_id);

            match event.action {
                ChangeAction::Insert => {
                    self.analytics
                        .add_row(org_id, workspace_id, view_id, row)
                        .await?;
                    summary.applied += 1;
                }
                ChangeAction::Update => {
                    let affected = self
                        .analytics
                        .update_rows(org_id, workspace_id, view_id, row, &criteria)
                        .await?;
                    if affected == 0 {
                        warn!(row = %row_id, "update criteria matched no analytics rows");
                        summary.missed += 1;
                    } else {
                        summary.applied += 1;
                    }
                }
                ChangeAction::Delete => {
                    let deleted = self
                        .analytics
                        .delete_rows(org_id, workspace_id, view_id, &criteria)
                        .await?;
                    if deleted == 0 {
                        warn!(row = %row_id, "delete criteria matched no analytics rows");
                        summary.missed += 1;
                    } else {
                        summary.applied += 1;
                    }
                }
            }
        }

        info!(applied = summary.applied, missed = summary.missed, "change event applied");
        Ok(summary)
    }
}

/// Row ids arrive as numbers or strings depending on the event producer.
fn row_id_of(row: &Value) -> Option<String> {
    match row.get("ROWID") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
