//! Job Status Repository
//!
//! Maps a job id to its current status. Writes overwrite unconditionally:
//! each job id is advanced by exactly one render task, so there is nothing
//! to arbitrate between writers.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::RwLock;
use typeset_core::domain::job::{JobId, JobStatus, UnknownStatus};

/// Prefix shared by every key this service writes
const KEY_PREFIX: &str = "typeset";

/// Status store error type
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status store query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("status record for {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: UnknownStatus,
    },
}

/// Key/value status storage
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Overwrite the status of a job
    async fn set(&self, id: JobId, status: JobStatus) -> Result<(), StoreError>;

    /// Read the status of a job, `None` when it has no record
    async fn get(&self, id: JobId) -> Result<Option<JobStatus>, StoreError>;

    /// Verify the backing service answers
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release the connection at shutdown
    async fn close(&self) {}
}

/// Key under which a job's status is stored
pub fn status_key(id: JobId) -> String {
    format!("{}-{}", KEY_PREFIX, id)
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// PostgreSQL-backed status store
///
/// Holds the process-wide connection pool created at startup.
pub struct PgStatusStore {
    pool: PgPool,
}

impl PgStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn set(&self, id: JobId, status: JobStatus) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO job_status (key, status, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(status_key(id))
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobStatus>, StoreError> {
        let key = status_key(id);
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM job_status WHERE key = $1")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(value,)| {
            value
                .parse::<JobStatus>()
                .map_err(|source| StoreError::Corrupt { key, source })
        })
        .transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Status store connection pool closed");
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local status store
///
/// Loses every record on restart; intended for development and tests.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<String, JobStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn set(&self, id: JobId, status: JobStatus) -> Result<(), StoreError> {
        self.records.write().await.insert(status_key(id), status);
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobStatus>, StoreError> {
        Ok(self.records.read().await.get(&status_key(id)).copied())
    }
}
