//! PostgreSQL-backed checkpoint store (`postgres` feature).

use super::{CheckpointError, CheckpointKey, CheckpointMarker, CheckpointResult, CheckpointStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::info;

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS batch_checkpoints (
    job_name    TEXT        NOT NULL,
    step_name   TEXT        NOT NULL,
    lineage_id  UUID        NOT NULL,
    reader      JSONB,
    writer      JSONB,
    saved_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (job_name, step_name, lineage_id)
)
"#;

/// Row per `(job_name, step_name, lineage_id)`, replaced with an upsert
#[derive(Debug, Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the checkpoint table if it does not exist yet
    pub async fn ensure_schema(&self) -> CheckpointResult<()> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::Database(e.to_string()))?;
        info!("Checkpoint table ready");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> CheckpointResult<Option<CheckpointMarker>> {
        let row = sqlx::query(
            "SELECT reader, writer FROM batch_checkpoints
             WHERE job_name = $1 AND step_name = $2 AND lineage_id = $3",
        )
        .bind(&key.job_name)
        .bind(&key.step_name)
        .bind(key.lineage_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CheckpointError::Database(e.to_string()))?;

        row.map(|row| {
            let reader: Option<Value> = row
                .try_get("reader")
                .map_err(|e| CheckpointError::Database(e.to_string()))?;
            let writer: Option<Value> = row
                .try_get("writer")
                .map_err(|e| CheckpointError::Database(e.to_string()))?;
            Ok(CheckpointMarker::new(reader, writer))
        })
        .transpose()
    }

    async fn save(&self, key: &CheckpointKey, marker: &CheckpointMarker) -> CheckpointResult<()> {
        // Row-level locking serializes concurrent upserts of one key
        sqlx::query(
            "INSERT INTO batch_checkpoints (job_name, step_name, lineage_id, reader, writer, saved_at)
             VALUES ($1, $2, $3, $4, $5, now())
             ON CONFLICT (job_name, step_name, lineage_id)
             DO UPDATE SET reader = EXCLUDED.reader, writer = EXCLUDED.writer, saved_at = now()",
        )
        .bind(&key.job_name)
        .bind(&key.step_name)
        .bind(key.lineage_id)
        .bind(&marker.reader)
        .bind(&marker.writer)
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Database(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
