//! End-to-end pipeline tests against the in-memory segment store and
//! mocked upstream clients. Each test drives the orchestrator the way
//! the HTTP handlers do, one stateless invocation per callback.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;

use analytics_sync::clients::{Analytics, Datastore};
use analytics_sync::config::SyncConfig;
use analytics_sync::error::{Result, SyncError};
use analytics_sync::models::{ColumnSpec, PageQuery, SourceColumn, SyncJob};
use analytics_sync::orchestration::{
    ChangeAction, ChangeEvent, ImportJobCallback, ReadJobCallback, RowAction, RowMirror,
    RowOutcome, StartSyncOutcome, StartSyncRequest, SyncOrchestrator,
};
use analytics_sync::segment::{MemorySegmentStore, SegmentStore};

const SECRET: &str = "test-secret";

fn test_config() -> SyncConfig {
    SyncConfig {
        bind_address: "127.0.0.1:0".to_string(),
        database_url: "postgres://unused".to_string(),
        callback_base_url: "https://sync.example.com".to_string(),
        datastore_base_url: "https://datastore.example.com".to_string(),
        analytics_base_url: "https://analytics.example.com".to_string(),
        auth_host: "https://accounts.example.com".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "refresh".to_string(),
        secret_key: SECRET.to_string(),
        environment: "test".to_string(),
        org_id: Some("org1".to_string()),
        workspace_id: Some("ws1".to_string()),
        view_ids: HashMap::from([("ORDERS".to_string(), "view-orders".to_string())]),
    }
}

struct MockDatastore {
    table_name: String,
    columns: Vec<SourceColumn>,
    row_count: u64,
    rows: Mutex<HashMap<String, Value>>,
    read_jobs: Mutex<Vec<PageQuery>>,
    fail_bulk_read: AtomicBool,
}

impl MockDatastore {
    fn new(table_name: &str, row_count: u64) -> Self {
        let columns = vec![
            source("ROWID", "bigint"),
            source("NAME", "varchar"),
            source("NOTES", "text"),
            source("CREATORID", "bigint"),
            source("CREATEDTIME", "datetime"),
        ];
        Self {
            table_name: table_name.to_string(),
            columns,
            row_count,
            rows: Mutex::new(HashMap::new()),
            read_jobs: Mutex::new(Vec::new()),
            fail_bulk_read: AtomicBool::new(false),
        }
    }

    fn with_row(self, row_id: &str, row: Value) -> Self {
        self.rows.lock().unwrap().insert(row_id.to_string(), row);
        self
    }

    fn dispatched_pages(&self) -> Vec<u32> {
        self.read_jobs.lock().unwrap().iter().map(|q| q.page).collect()
    }
}

fn source(name: &str, data_type: &str) -> SourceColumn {
    SourceColumn {
        column_name: name.to_string(),
        data_type: data_type.to_string(),
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn table_exists(&self, table_name: &str) -> Result<bool> {
        Ok(table_name == self.table_name)
    }

    async fn table_columns(&self, _table_name: &str) -> Result<Vec<SourceColumn>> {
        Ok(self.columns.clone())
    }

    async fn row_count(&self, _table_name: &str) -> Result<u64> {
        Ok(self.row_count)
    }

    async fn get_row(&self, _table_name: &str, row_id: &str) -> Result<Option<Value>> {
        Ok(self.rows.lock().unwrap().get(row_id).cloned())
    }

    async fn create_bulk_read_job(&self, query: &PageQuery) -> Result<()> {
        if self.fail_bulk_read.load(Ordering::SeqCst) {
            return Err(SyncError::internal("bulk read submission refused"));
        }
        self.read_jobs.lock().unwrap().push(query.clone());
        Ok(())
    }

    async fn download_result(&self, _download_url: &str, destination: &Path) -> Result<()> {
        let file = std::fs::File::create(destination)?;
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(
                format!("Table-{}.csv", self.table_name),
                SimpleFileOptions::default(),
            )
            .map_err(|e| SyncError::internal(e.to_string()))?;
        writer.write_all(b"ROWID,NAME,NOTES\n1,widget,na\n")?;
        writer
            .finish()
            .map_err(|e| SyncError::internal(e.to_string()))?;
        Ok(())
    }
}

#[derive(Default)]
struct MockAnalytics {
    orgs: Vec<String>,
    created_view_id: Option<String>,
    created_tables: Mutex<Vec<(String, Vec<ColumnSpec>)>>,
    imports: Mutex<Vec<ImportRecord>>,
    added_rows: Mutex<Vec<Value>>,
    update_result: AtomicU64,
    delete_result: AtomicU64,
}

#[derive(Debug, Clone)]
struct ImportRecord {
    view_id: String,
    csv: String,
    callback_url: String,
}

impl MockAnalytics {
    fn with_org(org_id: &str) -> Self {
        Self {
            orgs: vec![org_id.to_string()],
            update_result: AtomicU64::new(1),
            delete_result: AtomicU64::new(1),
            ..Self::default()
        }
    }

    fn imports(&self) -> Vec<ImportRecord> {
        self.imports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analytics for MockAnalytics {
    async fn org_exists(&self, org_id: &str) -> Result<bool> {
        Ok(self.orgs.iter().any(|org| org == org_id))
    }

    async fn create_table(
        &self,
        _org_id: &str,
        _workspace_id: &str,
        table_name: &str,
        columns: &[ColumnSpec],
    ) -> Result<String> {
        self.created_tables
            .lock()
            .unwrap()
            .push((table_name.to_string(), columns.to_vec()));
        Ok(self
            .created_view_id
            .clone()
            .unwrap_or_else(|| "view-created".to_string()))
    }

    async fn add_row(
        &self,
        _org_id: &str,
        _workspace_id: &str,
        _view_id: &str,
        row: &Value,
    ) -> Result<()> {
        self.added_rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn update_rows(
        &self,
        _org_id: &str,
        _workspace_id: &str,
        _view_id: &str,
        _row: &Value,
        _criteria: &str,
    ) -> Result<u64> {
        Ok(self.update_result.load(Ordering::SeqCst))
    }

    async fn delete_rows(
        &self,
        _org_id: &str,
        _workspace_id: &str,
        _view_id: &str,
        _criteria: &str,
    ) -> Result<u64> {
        Ok(self.delete_result.load(Ordering::SeqCst))
    }

    async fn import_csv(
        &self,
        _org_id: &str,
        _workspace_id: &str,
        view_id: &str,
        csv_path: &Path,
        callback_url: &str,
    ) -> Result<String> {
        let csv = std::fs::read_to_string(csv_path)?;
        self.imports.lock().unwrap().push(ImportRecord {
            view_id: view_id.to_string(),
            csv,
            callback_url: callback_url.to_string(),
        });
        Ok("import-job-1".to_string())
    }
}

struct Harness {
    segment: Arc<MemorySegmentStore>,
    datastore: Arc<MockDatastore>,
    analytics: Arc<MockAnalytics>,
    orchestrator: SyncOrchestrator,
}

fn harness(datastore: MockDatastore, analytics: MockAnalytics) -> Harness {
    let segment = Arc::new(MemorySegmentStore::new());
    let datastore = Arc::new(datastore);
    let analytics = Arc::new(analytics);
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&segment) as Arc<dyn SegmentStore>,
        Arc::clone(&datastore) as Arc<dyn Datastore>,
        Arc::clone(&analytics) as Arc<dyn Analytics>,
        &test_config(),
    );
    Harness {
        segment,
        datastore,
        analytics,
        orchestrator,
    }
}

fn start_request(view_id: Option<&str>) -> StartSyncRequest {
    StartSyncRequest {
        table_name: "Orders".to_string(),
        org_id: "org1".to_string(),
        workspace_id: "ws1".to_string(),
        view_id: view_id.map(str::to_string),
    }
}

fn read_callback(page: u32) -> ReadJobCallback {
    ReadJobCallback {
        page,
        status: "Job Completed".to_string(),
        download_url: Some(format!("https://files.example.com/Orders/{page}.zip")),
        description: None,
    }
}

fn import_callback(page: u32) -> ImportJobCallback {
    ImportJobCallback {
        page,
        job_status: "JOB COMPLETED".to_string(),
        job_info: None,
    }
}

async fn stored_job(segment: &MemorySegmentStore) -> Option<SyncJob> {
    let stored = segment.get("Analytics_Orders").await.unwrap()?;
    Some(serde_json::from_value(stored.value).unwrap())
}

#[tokio::test]
async fn test_start_sync_persists_job_and_dispatches_first_page() {
    let h = harness(MockDatastore::new("Orders", 450_000), MockAnalytics::with_org("org1"));

    let outcome = h
        .orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    assert_eq!(outcome, StartSyncOutcome::Started { total_pages: 3 });

    let job = stored_job(&h.segment).await.unwrap();
    assert_eq!(job.queries.len(), 3);
    assert_eq!(job.view_id, "view-7");
    // System metadata columns never reach the page queries.
    assert_eq!(job.queries[0].columns, vec!["ROWID", "NAME", "NOTES"]);
    assert!(job.queries[0]
        .callback_url
        .ends_with("/export-datastore"));

    assert_eq!(h.datastore.dispatched_pages(), vec![1]);
    assert!(h.analytics.created_tables.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_sync_creates_analytics_table_when_no_view_given() {
    let h = harness(MockDatastore::new("Orders", 100), MockAnalytics::with_org("org1"));

    h.orchestrator
        .start_sync(start_request(None))
        .await
        .unwrap();

    let created = h.analytics.created_tables.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, "Orders");
    assert_eq!(created[0].1.len(), 3);

    let job = stored_job(&h.segment).await.unwrap();
    assert_eq!(job.view_id, "view-created");
}

#[tokio::test]
async fn test_start_sync_rejects_double_start_without_clobbering() {
    let h = harness(MockDatastore::new("Orders", 100), MockAnalytics::with_org("org1"));

    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    let before = stored_job(&h.segment).await.unwrap();

    let err = h
        .orchestrator
        .start_sync(start_request(Some("view-8")))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(err.to_string().contains("already in the progress"));

    // The running job survives the rejected start untouched.
    let after = stored_job(&h.segment).await.unwrap();
    assert_eq!(after.view_id, before.view_id);
    assert_eq!(h.datastore.dispatched_pages(), vec![1]);
}

#[tokio::test]
async fn test_start_sync_unknown_org_and_table() {
    let h = harness(MockDatastore::new("Orders", 100), MockAnalytics::with_org("org1"));

    let mut request = start_request(Some("view-7"));
    request.org_id = "org-missing".to_string();
    let err = h.orchestrator.start_sync(request).await.unwrap_err();
    assert_eq!(err.http_status(), 404);
    assert!(err.to_string().contains("org-missing"));

    let mut request = start_request(Some("view-7"));
    request.table_name = "Unknown".to_string();
    let err = h.orchestrator.start_sync(request).await.unwrap_err();
    assert_eq!(err.http_status(), 404);

    assert!(stored_job(&h.segment).await.is_none());
    assert!(h.datastore.dispatched_pages().is_empty());
}

#[tokio::test]
async fn test_start_sync_empty_table_is_trivially_complete() {
    let h = harness(MockDatastore::new("Orders", 0), MockAnalytics::with_org("org1"));

    let outcome = h
        .orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    assert_eq!(outcome, StartSyncOutcome::NothingToSync);
    assert!(stored_job(&h.segment).await.is_none());
    assert!(h.datastore.dispatched_pages().is_empty());
}

#[tokio::test]
async fn test_start_sync_dispatch_failure_rolls_back_new_job() {
    let h = harness(MockDatastore::new("Orders", 100), MockAnalytics::with_org("org1"));
    h.datastore.fail_bulk_read.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 500);
    assert!(stored_job(&h.segment).await.is_none());
}

#[tokio::test]
async fn test_read_callbacks_advance_pages_in_order() {
    let h = harness(MockDatastore::new("Orders", 400_000), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();

    let message = h
        .orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap();
    assert_eq!(message, "Successfully initiated bulk read job for page - 2");
    assert_eq!(h.datastore.dispatched_pages(), vec![1, 2]);

    let job = stored_job(&h.segment).await.unwrap();
    assert!(job.queries[0].has_download());
    assert!(!job.queries[1].has_download());

    // Last read begins the import phase at page 1.
    let message = h
        .orchestrator
        .on_read_page_complete("Orders", read_callback(2))
        .await
        .unwrap();
    assert_eq!(message, "Successfully initiated bulk write job for page - 1");

    let imports = h.analytics.imports();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].view_id, "view-7");
    assert!(imports[0].csv.contains("ROWID,NAME,NOTES"));
    assert!(imports[0].callback_url.contains("tableName=Orders"));
    assert!(imports[0].callback_url.contains(&format!("secret-key={SECRET}")));
    assert!(imports[0].callback_url.contains("page=1"));
}

#[tokio::test]
async fn test_import_callbacks_chain_until_job_deleted() {
    let h = harness(MockDatastore::new("Orders", 400_000), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    h.orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap();
    h.orchestrator
        .on_read_page_complete("Orders", read_callback(2))
        .await
        .unwrap();

    // Page 1 imported: page 2 transfers next, carrying its own page number.
    let message = h
        .orchestrator
        .on_import_page_complete("Orders", import_callback(1))
        .await
        .unwrap();
    assert_eq!(message, "Successfully initiated bulk write job for page - 2");
    let imports = h.analytics.imports();
    assert_eq!(imports.len(), 2);
    assert!(imports[1].callback_url.contains("page=2"));

    // Import progress is persisted, so each accepted callback bumps the
    // document version.
    let job = stored_job(&h.segment).await.unwrap();
    assert_eq!(job.last_imported_page, 1);

    // Page 2 imported: nothing left, job deleted, pipeline complete.
    let message = h
        .orchestrator
        .on_import_page_complete("Orders", import_callback(2))
        .await
        .unwrap();
    assert_eq!(message, "Data sent successfully to the analytics workspace");
    assert!(stored_job(&h.segment).await.is_none());
}

#[tokio::test]
async fn test_duplicate_read_callback_conflicts_without_deleting_job() {
    let h = harness(MockDatastore::new("Orders", 400_000), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    h.orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Conflict { .. }));

    // The concurrent-callback loser must not destroy the winner's state.
    let job = stored_job(&h.segment).await.unwrap();
    assert!(job.queries[0].has_download());
}

#[tokio::test]
async fn test_duplicate_import_callback_conflicts_without_retransfer() {
    let h = harness(MockDatastore::new("Orders", 400_000), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    h.orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap();
    h.orchestrator
        .on_read_page_complete("Orders", read_callback(2))
        .await
        .unwrap();
    h.orchestrator
        .on_import_page_complete("Orders", import_callback(1))
        .await
        .unwrap();
    assert_eq!(h.analytics.imports().len(), 2);

    // A replayed completion for page 1 must not append page 2 again.
    let err = h
        .orchestrator
        .on_import_page_complete("Orders", import_callback(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Conflict { .. }));
    assert_eq!(h.analytics.imports().len(), 2);

    // The job survives and the real chain still completes.
    let message = h
        .orchestrator
        .on_import_page_complete("Orders", import_callback(2))
        .await
        .unwrap();
    assert_eq!(message, "Data sent successfully to the analytics workspace");
    assert!(stored_job(&h.segment).await.is_none());
}

#[tokio::test]
async fn test_failed_read_callback_deletes_job() {
    let h = harness(MockDatastore::new("Orders", 400_000), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .on_read_page_complete(
            "Orders",
            ReadJobCallback {
                page: 1,
                status: "Job Failed".to_string(),
                download_url: None,
                description: Some("disk quota exceeded".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::JobFailed(_)));
    assert!(stored_job(&h.segment).await.is_none());

    // A late callback for the deleted job reports the missing state.
    let err = h
        .orchestrator
        .on_read_page_complete("Orders", read_callback(2))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_failed_import_callback_deletes_job() {
    let h = harness(MockDatastore::new("Orders", 100), MockAnalytics::with_org("org1"));
    h.orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .on_import_page_complete(
            "Orders",
            ImportJobCallback {
                page: 1,
                job_status: "JOB FAILED".to_string(),
                job_info: Some("bad csv".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::JobFailed(_)));
    assert!(stored_job(&h.segment).await.is_none());
}

#[tokio::test]
async fn test_single_page_table_full_cycle() {
    let h = harness(MockDatastore::new("Orders", 5), MockAnalytics::with_org("org1"));

    let outcome = h
        .orchestrator
        .start_sync(start_request(Some("view-7")))
        .await
        .unwrap();
    assert_eq!(outcome, StartSyncOutcome::Started { total_pages: 1 });

    let message = h
        .orchestrator
        .on_read_page_complete("Orders", read_callback(1))
        .await
        .unwrap();
    assert_eq!(message, "Successfully initiated bulk write job for page - 1");

    let message = h
        .orchestrator
        .on_import_page_complete("Orders", import_callback(1))
        .await
        .unwrap();
    assert_eq!(message, "Data sent successfully to the analytics workspace");
    assert!(stored_job(&h.segment).await.is_none());
}

fn mirror(datastore: MockDatastore, analytics: MockAnalytics) -> (Arc<MockAnalytics>, RowMirror) {
    let analytics = Arc::new(analytics);
    let mirror = RowMirror::new(
        Arc::new(datastore) as Arc<dyn Datastore>,
        Arc::clone(&analytics) as Arc<dyn Analytics>,
        &test_config(),
    );
    (analytics, mirror)
}

#[tokio::test]
async fn test_mirror_row_insert_is_not_idempotent() {
    let datastore =
        MockDatastore::new("Orders", 1).with_row("42", json!({"ROWID": "42", "NAME": "widget"}));
    let (analytics, mirror) = mirror(datastore, MockAnalytics::with_org("org1"));

    for _ in 0..2 {
        let outcome = mirror
            .mirror_row("org1", "ws1", "view-7", "Orders", "42", RowAction::Insert)
            .await
            .unwrap();
        assert_eq!(outcome, RowOutcome::Inserted);
    }
    // Insert mirrors append; two calls mean two analytics rows.
    assert_eq!(analytics.added_rows.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_mirror_row_update_outcomes() {
    let datastore =
        MockDatastore::new("Orders", 1).with_row("42", json!({"ROWID": "42", "NAME": "widget"}));
    let (analytics, mirror) = mirror(datastore, MockAnalytics::with_org("org1"));

    let outcome = mirror
        .mirror_row("org1", "ws1", "view-7", "Orders", "42", RowAction::Update)
        .await
        .unwrap();
    assert_eq!(outcome, RowOutcome::Updated);

    analytics.update_result.store(0, Ordering::SeqCst);
    let outcome = mirror
        .mirror_row("org1", "ws1", "view-7", "Orders", "42", RowAction::Update)
        .await
        .unwrap();
    assert_eq!(outcome, RowOutcome::NoRowsAffected);
}

#[tokio::test]
async fn test_mirror_row_missing_row_is_not_found() {
    let datastore = MockDatastore::new("Orders", 1);
    let (_, mirror) = mirror(datastore, MockAnalytics::with_org("org1"));

    let err = mirror
        .mirror_row("org1", "ws1", "view-7", "Orders", "404", RowAction::Insert)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn test_change_event_applies_batch_and_counts_misses() {
    let datastore = MockDatastore::new("Orders", 1);
    let (analytics, mirror) = mirror(datastore, MockAnalytics::with_org("org1"));
    analytics.delete_result.store(0, Ordering::SeqCst);

    let event = ChangeEvent {
        table_name: "Orders".to_string(),
        action: ChangeAction::Delete,
        rows: vec![json!({"ROWID": 1}), json!({"NAME": "no id"})],
    };
    let summary = mirror.apply_change_event(&event).await.unwrap();
    assert_eq!(summary.applied, 0);
    assert_eq!(summary.missed, 2);

    analytics.delete_result.store(1, Ordering::SeqCst);
    let event = ChangeEvent {
        table_name: "Orders".to_string(),
        action: ChangeAction::Delete,
        rows: vec![json!({"ROWID": 1})],
    };
    let summary = mirror.apply_change_event(&event).await.unwrap();
    assert_eq!(summary.applied, 1);
    assert_eq!(summary.missed, 0);
}

#[tokio::test]
async fn test_change_event_insert_batch() {
    let datastore = MockDatastore::new("Orders", 1);
    let (analytics, mirror) = mirror(datastore, MockAnalytics::with_org("org1"));

    let event = ChangeEvent {
        table_name: "Orders".to_string(),
        action: ChangeAction::Insert,
        rows: vec![
            json!({"ROWID": 1, "NAME": "a"}),
            json!({"ROWID": 2, "NAME": "b"}),
        ],
    };
    let summary = mirror.apply_change_event(&event).await.unwrap();
    assert_eq!(summary.applied, 2);
    assert_eq!(analytics.added_rows.lock().unwrap().len(), 2);
}
