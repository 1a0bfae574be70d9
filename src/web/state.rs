//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::clients::{HttpAnalyticsClient, HttpDatastoreClient, OAuthTokenSource};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::orchestration::{RowMirror, SyncOrchestrator};
use crate::segment::{PostgresSegmentStore, SegmentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub row_mirror: Arc<RowMirror>,
}

impl AppState {
    /// Wire the full production stack: Postgres segment store plus the
    /// HTTP clients sharing one connection pool and token source.
    pub async fn build(config: SyncConfig) -> Result<Self> {
        let segment: Arc<dyn SegmentStore> =
            Arc::new(PostgresSegmentStore::connect(&config.database_url).await?);

        let http = reqwest::Client::new();
        let token = Arc::new(OAuthTokenSource::new(http.clone(), &config));
        let datastore = Arc::new(HttpDatastoreClient::new(
            http.clone(),
            &config,
            Arc::clone(&token),
        ));
        let analytics = Arc::new(HttpAnalyticsClient::new(http, &config, token));

        Ok(Self::assemble(config, segment, datastore, analytics))
    }

    /// Assemble state from already-built components. Tests use this with
    /// in-memory and mock implementations.
    pub fn assemble(
        config: SyncConfig,
        segment: Arc<dyn SegmentStore>,
        datastore: Arc<dyn crate::clients::Datastore>,
        analytics: Arc<dyn crate::clients::Analytics>,
    ) -> Self {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            segment,
            Arc::clone(&datastore),
            Arc::clone(&analytics),
            &config,
        ));
        let row_mirror = Arc::new(RowMirror::new(datastore, analytics, &config));
        Self {
            config: Arc::new(config),
            orchestrator,
            row_mirror,
        }
    }
}
