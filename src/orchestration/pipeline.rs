//! # Sync Orchestrator
//!
//! The persisted-state state machine driving a table's bulk sync. Every
//! operation here runs inside one stateless invocation: it loads the job
//! document from the segment store, plans a transition, persists the
//! mutation, then runs the side effect. Any failure deletes the stored
//! job so a retry starts from scratch; the one exception is a version
//! conflict, where a concurrent callback owns the document and this
//! invocation must not destroy its work.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::clients::{Analytics, Datastore};
use crate::config::SyncConfig;
use crate::constants::{query_params, segment_key};
use crate::error::{Result, SyncError};
use crate::models::{derive_column_specs, SyncJob};
use crate::orchestration::transfer;
use crate::segment::{SegmentError, SegmentStore};
use crate::state_machine::{plan_transition, SideEffect, StoreMutation, SyncEvent, SyncState};

/// Request to start a bulk sync, already field-validated by the caller.
#[derive(Debug, Clone)]
pub struct StartSyncRequest {
    pub table_name: String,
    pub org_id: String,
    pub workspace_id: String,
    pub view_id: Option<String>,
}

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSyncOutcome {
    /// Job persisted and page 1's read dispatched.
    Started { total_pages: u32 },
    /// The table holds no rows; nothing was persisted or dispatched.
    NothingToSync,
}

/// Parsed bulk-read completion callback.
#[derive(Debug, Clone)]
pub struct ReadJobCallback {
    pub page: u32,
    pub status: String,
    pub download_url: Option<String>,
    pub description: Option<String>,
}

impl ReadJobCallback {
    fn succeeded(&self) -> bool {
        self.status.contains("Completed")
    }
}

/// Parsed bulk-import completion callback.
#[derive(Debug, Clone)]
pub struct ImportJobCallback {
    pub page: u32,
    pub job_status: String,
    pub job_info: Option<String>,
}

impl ImportJobCallback {
    fn completed(&self) -> bool {
        self.job_status.contains("COMPLETED")
    }
}

pub struct SyncOrchestrator {
    segment: Arc<dyn SegmentStore>,
    datastore: Arc<dyn Datastore>,
    analytics: Arc<dyn Analytics>,
    callback_base_url: String,
    secret_key: String,
}

impl SyncOrchestrator {
    pub fn new(
        segment: Arc<dyn SegmentStore>,
        datastore: Arc<dyn Datastore>,
        analytics: Arc<dyn Analytics>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            segment,
            datastore,
            analytics,
            callback_base_url: config.callback_base_url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Start a bulk sync for a table.
    ///
    /// Failures before the job document is persisted leave the store
    /// untouched, so a rejected start can never clobber a sync that is
    /// already running. Only a dispatch failure after persistence rolls
    /// the new document back.
    #[instrument(skip(self, request), fields(table = %request.table_name))]
    pub async fn start_sync(&self, request: StartSyncRequest) -> Result<StartSyncOutcome> {
        if !self.analytics.org_exists(&request.org_id).await? {
            return Err(SyncError::not_found(format!(
                "Organization id {} does not exist.",
                request.org_id
            )));
        }

        let key = segment_key(&request.table_name);
        if self.segment.get(&key).await?.is_some() {
            return Err(SyncError::validation(
                "The given table is already in the progress of moving data to Analytics.",
            ));
        }

        if !self.datastore.table_exists(&request.table_name).await? {
            return Err(SyncError::not_found(
                "No such Table with the given name exists",
            ));
        }

        let columns = self.datastore.table_columns(&request.table_name).await?;
        let specs = derive_column_specs(&columns)?;
        if specs.len() < 2 {
            return Err(SyncError::validation(
                "Table should contain at least two usable columns.",
            ));
        }

        let view_id = match request.view_id.as_deref().filter(|id| !id.is_empty()) {
            Some(view_id) => view_id.to_string(),
            None => {
                self.analytics
                    .create_table(
                        &request.org_id,
                        &request.workspace_id,
                        &request.table_name,
                        &specs,
                    )
                    .await?
            }
        };

        let count = self.datastore.row_count(&request.table_name).await?;
        let total_pages = SyncJob::page_count(count);
        if total_pages == 0 {
            info!(rows = count, "table is empty, sync trivially complete");
            return Ok(StartSyncOutcome::NothingToSync);
        }

        let column_names: Vec<String> =
            specs.iter().map(|spec| spec.columnname.clone()).collect();
        let queries = SyncJob::build_queries(
            &request.table_name,
            total_pages,
            &column_names,
            &self.export_callback_url(),
        );
        let job = SyncJob::new(
            request.table_name.clone(),
            request.org_id.clone(),
            request.workspace_id.clone(),
            view_id,
            queries,
        );

        self.segment.put(&key, &serde_json::to_value(&job)?).await?;
        if let Err(err) = self.datastore.create_bulk_read_job(&job.queries[0]).await {
            self.cleanup_after_failure(&request.table_name, &err).await;
            return Err(err);
        }

        info!(rows = count, total_pages, "bulk sync started");
        Ok(StartSyncOutcome::Started { total_pages })
    }

    /// Advance the read phase after a bulk-read job completes.
    #[instrument(skip(self, callback), fields(table = table_name, page = callback.page))]
    pub async fn on_read_page_complete(
        &self,
        table_name: &str,
        callback: ReadJobCallback,
    ) -> Result<String> {
        match self.apply_read_complete(table_name, callback).await {
            Ok(message) => Ok(message),
            Err(err) => {
                self.cleanup_after_failure(table_name, &err).await;
                Err(err)
            }
        }
    }

    async fn apply_read_complete(
        &self,
        table_name: &str,
        callback: ReadJobCallback,
    ) -> Result<String> {
        if !callback.succeeded() {
            return Err(SyncError::JobFailed(
                callback
                    .description
                    .unwrap_or_else(|| "bulk read job reported failure".to_string()),
            ));
        }
        let download_url = callback.download_url.ok_or_else(|| {
            SyncError::internal("read completion callback carried no download url")
        })?;

        let (mut job, version) = self.load_job(table_name).await?;
        let event = SyncEvent::ReadPageCompleted {
            page: callback.page,
            download_url,
        };
        let transition = plan_transition(&mut job, &event)?;
        self.persist(&job, version, transition.mutation).await?;

        info!(state = %SyncState::of(&job), "read page recorded");
        self.run_effect(&job, transition.effect).await
    }

    /// Advance the import phase after a bulk-import job completes.
    #[instrument(skip(self, callback), fields(table = table_name, page = callback.page))]
    pub async fn on_import_page_complete(
        &self,
        table_name: &str,
        callback: ImportJobCallback,
    ) -> Result<String> {
        match self.apply_import_complete(table_name, callback).await {
            Ok(message) => Ok(message),
            Err(err) => {
                self.cleanup_after_failure(table_name, &err).await;
                Err(err)
            }
        }
    }

    async fn apply_import_complete(
        &self,
        table_name: &str,
        callback: ImportJobCallback,
    ) -> Result<String> {
        if !callback.completed() {
            return Err(SyncError::JobFailed(callback.job_info.unwrap_or_else(|| {
                format!("bulk import job ended with status {}", callback.job_status)
            })));
        }

        let (mut job, version) = self.load_job(table_name).await?;
        let event = SyncEvent::ImportPageCompleted {
            page: callback.page,
        };
        let transition = plan_transition(&mut job, &event)?;
        self.persist(&job, version, transition.mutation).await?;

        self.run_effect(&job, transition.effect).await
    }

    async fn load_job(&self, table_name: &str) -> Result<(SyncJob, i64)> {
        let stored = self
            .segment
            .get(&segment_key(table_name))
            .await?
            .ok_or_else(|| {
                SyncError::not_found(format!(
                    "No sync job in progress for table '{table_name}'"
                ))
            })?;
        let job: SyncJob = serde_json::from_value(stored.value)?;
        Ok((job, stored.version))
    }

    async fn persist(&self, job: &SyncJob, read_version: i64, mutation: StoreMutation) -> Result<()> {
        let key = job.segment_key();
        match mutation {
            StoreMutation::Update => {
                match self
                    .segment
                    .update(&key, &serde_json::to_value(job)?, read_version)
                    .await
                {
                    Ok(_) => Ok(()),
                    Err(SegmentError::VersionMismatch(_)) => Err(SyncError::Conflict {
                        table: job.table_name.clone(),
                    }),
                    Err(err) => Err(err.into()),
                }
            }
            StoreMutation::Delete => {
                self.segment.delete(&key).await?;
                Ok(())
            }
        }
    }

    async fn run_effect(&self, job: &SyncJob, effect: SideEffect) -> Result<String> {
        match effect {
            SideEffect::DispatchRead { page_index } => {
                let query = &job.queries[page_index];
                self.datastore.create_bulk_read_job(query).await?;
                Ok(format!(
                    "Successfully initiated bulk read job for page - {}",
                    query.page
                ))
            }
            SideEffect::TransferPage { page_index } => {
                let page = job.queries[page_index].page;
                let callback_url = self.import_callback_url(&job.table_name, page)?;
                transfer::transfer_page(
                    self.datastore.as_ref(),
                    self.analytics.as_ref(),
                    job,
                    page_index,
                    &callback_url,
                )
                .await
            }
            SideEffect::None => {
                info!(table = %job.table_name, "all pages imported, sync complete");
                Ok("Data sent successfully to the analytics workspace".to_string())
            }
        }
    }

    fn export_callback_url(&self) -> String {
        format!("{}/export-datastore", self.callback_base_url)
    }

    /// Import completion callback URL for one page. The analytics
    /// platform cannot set headers on its callback, so the shared secret
    /// travels as a query parameter.
    fn import_callback_url(&self, table_name: &str, page: u32) -> Result<String> {
        let mut url = url::Url::parse(&format!("{}/import-analytics", self.callback_base_url))
            .map_err(|e| SyncError::internal(format!("invalid callback base url: {e}")))?;
        url.query_pairs_mut()
            .append_pair(query_params::TABLE_NAME, table_name)
            .append_pair(query_params::SECRET_KEY, &self.secret_key)
            .append_pair(query_params::PAGE, &page.to_string());
        Ok(url.into())
    }

    /// Delete the stored job after a failure so a retry starts fresh.
    ///
    /// Version conflicts are the exception: the document now belongs to a
    /// concurrent callback and deleting it would destroy that work.
    async fn cleanup_after_failure(&self, table_name: &str, err: &SyncError) {
        if matches!(err, SyncError::Conflict { .. }) {
            warn!(table = table_name, "conflicting callback, leaving job in place");
            return;
        }
        error!(table = table_name, error = %err, "sync failed, deleting stored job");
        let key = segment_key(table_name);
        match self.segment.get(&key).await {
            Ok(Some(_)) => {
                if let Err(delete_err) = self.segment.delete(&key).await {
                    error!(table = table_name, error = %delete_err, "failed to delete stored job");
                }
            }
            Ok(None) => {}
            Err(get_err) => {
                error!(table = table_name, error = %get_err, "failed to inspect stored job");
            }
        }
    }
}
