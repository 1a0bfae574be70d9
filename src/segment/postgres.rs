//! Postgres-backed segment provider.
//!
//! One row per table key in `sync_segments`, value stored as JSONB with a
//! version column driving the compare-and-swap update. The table is
//! created on startup; there is no migration history to manage for a
//! single self-contained KV table.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::debug;

use super::{SegmentError, SegmentResult, SegmentStore, VersionedValue};

const CREATE_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS sync_segments (
    key        TEXT PRIMARY KEY,
    value      JSONB NOT NULL,
    version    BIGINT NOT NULL DEFAULT 1,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

#[derive(Debug, Clone)]
pub struct PostgresSegmentStore {
    pool: PgPool,
}

impl PostgresSegmentStore {
    /// Connect to the database and ensure the segment table exists.
    pub async fn connect(database_url: &str) -> SegmentResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| SegmentError::Connection(e.to_string()))?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool and ensure the segment table exists.
    pub async fn with_pool(pool: PgPool) -> SegmentResult<Self> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&pool)
            .await
            .map_err(backend_error)?;
        debug!("segment table ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn backend_error(err: sqlx::Error) -> SegmentError {
    SegmentError::Backend(err.to_string())
}

#[async_trait]
impl SegmentStore for PostgresSegmentStore {
    async fn get(&self, key: &str) -> SegmentResult<Option<VersionedValue>> {
        let row = sqlx::query("SELECT value, version FROM sync_segments WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)?;

        Ok(row.map(|row| VersionedValue {
            value: row.get("value"),
            version: row.get("version"),
        }))
    }

    async fn put(&self, key: &str, value: &serde_json::Value) -> SegmentResult<()> {
        let result = sqlx::query(
            "INSERT INTO sync_segments (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        if result.rows_affected() == 0 {
            return Err(SegmentError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        value: &serde_json::Value,
        expected_version: i64,
    ) -> SegmentResult<i64> {
        let row = sqlx::query(
            "UPDATE sync_segments
             SET value = $2, version = version + 1, updated_at = now()
             WHERE key = $1 AND version = $3
             RETURNING version",
        )
        .bind(key)
        .bind(value)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        match row {
            Some(row) => Ok(row.get("version")),
            None => {
                // Distinguish a missing document from a lost race.
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sync_segments WHERE key = $1)")
                        .bind(key)
                        .fetch_one(&self.pool)
                        .await
                        .map_err(backend_error)?;
                if exists {
                    Err(SegmentError::VersionMismatch(key.to_string()))
                } else {
                    Err(SegmentError::Missing(key.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> SegmentResult<()> {
        sqlx::query("DELETE FROM sync_segments WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "postgres"
    }
}
