//! SQLite persistence for model metrics
//!
//! One row per model. A snapshot write upserts every row inside a single
//! transaction, so a concurrent reader sees either the old or the new state.

use async_trait::async_trait;
use std::path::Path;

use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use super::{MetricsBackend, MetricsSnapshot, ModelMetrics};
use crate::error::{Error, Result};

/// SQL to create the model metrics table
pub const CREATE_MODEL_METRICS_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS model_metrics (
    model_id TEXT PRIMARY KEY NOT NULL,
    wins INTEGER NOT NULL DEFAULT 0,
    losses INTEGER NOT NULL DEFAULT 0,
    thumbs INTEGER NOT NULL DEFAULT 0,
    avg_latency_ms REAL NOT NULL,
    avg_cost REAL NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
"#;

/// Metrics backend on a SQLite database
pub struct SqliteBackend {
    pool: SqlitePool,
    location: String,
}

impl SqliteBackend {
    /// Create a backend from an existing connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            location: "sqlite:pool".to_string(),
        }
    }

    /// Connect to (or create) the database file and initialize the schema
    pub async fn connect(database_path: &Path) -> Result<Self> {
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let url = format!("sqlite://{}?mode=rwc", database_path.display());
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(Error::DatabaseError)?;

        let backend = Self {
            pool,
            location: format!("sqlite:{}", database_path.display()),
        };
        backend.init().await?;
        Ok(backend)
    }

    /// Initialize the database schema
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_MODEL_METRICS_TABLE_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;

        info!("Model metrics table initialized");
        Ok(())
    }

    /// Number of persisted rows
    pub async fn row_count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM model_metrics")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::DatabaseError)?;
        Ok(row.get::<i64, _>("count") as u64)
    }
}

fn counter(value: i64, column: &str, model_id: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        Error::InvalidInput(format!(
            "Negative {} ({}) stored for model '{}'",
            column, value, model_id
        ))
    })
}

#[async_trait]
impl MetricsBackend for SqliteBackend {
    async fn read(&self) -> Result<Option<MetricsSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT model_id, wins, losses, thumbs, avg_latency_ms, avg_cost
            FROM model_metrics
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::DatabaseError)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut snapshot = MetricsSnapshot::new();
        for row in rows {
            let model_id: String = row.get("model_id");
            let metrics = ModelMetrics {
                wins: counter(row.get("wins"), "wins", &model_id)?,
                losses: counter(row.get("losses"), "losses", &model_id)?,
                thumbs: row.get("thumbs"),
                avg_latency_ms: row.get("avg_latency_ms"),
                avg_cost: row.get("avg_cost"),
            };
            snapshot.insert(model_id, metrics);
        }

        debug!(models = snapshot.len(), "Loaded model metrics");
        Ok(Some(snapshot))
    }

    async fn write(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::DatabaseError)?;

        for (model_id, metrics) in snapshot {
            sqlx::query(
                r#"
                INSERT INTO model_metrics (
                    model_id, wins, losses, thumbs, avg_latency_ms, avg_cost, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(model_id) DO UPDATE SET
                    wins = excluded.wins,
                    losses = excluded.losses,
                    thumbs = excluded.thumbs,
                    avg_latency_ms = excluded.avg_latency_ms,
                    avg_cost = excluded.avg_cost,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(model_id)
            .bind(metrics.wins as i64)
            .bind(metrics.losses as i64)
            .bind(metrics.thumbs)
            .bind(metrics.avg_latency_ms)
            .bind(metrics.avg_cost)
            .execute(&mut *tx)
            .await
            .map_err(Error::DatabaseError)?;
        }

        tx.commit().await.map_err(Error::DatabaseError)?;

        debug!(count = snapshot.len(), "Saved model metrics");
        Ok(())
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsStore;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    async fn create_test_backend() -> (SqliteBackend, TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_metrics.db");

        let backend = SqliteBackend::connect(&db_path).await.unwrap();

        // Return the dir to keep it alive for the test duration
        (backend, dir)
    }

    #[tokio::test]
    async fn test_empty_table_reads_none() {
        let (backend, _temp) = create_test_backend().await;
        assert!(backend.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_and_read_snapshot() {
        let (backend, _temp) = create_test_backend().await;

        let mut snapshot = MetricsSnapshot::new();
        let mut metrics = ModelMetrics::seeded(950.0, 0.003);
        metrics.apply_feedback(-1);
        snapshot.insert("gpt-4-mini".to_string(), metrics);

        backend.write(&snapshot).await.unwrap();
        let loaded = backend.read().await.unwrap().unwrap();

        assert_eq!(loaded["gpt-4-mini"].losses, 1);
        assert_eq!(loaded["gpt-4-mini"].thumbs, -1);
        assert_eq!(loaded["gpt-4-mini"].avg_latency_ms, 950.0);
    }

    #[tokio::test]
    async fn test_write_upserts_existing_rows() {
        let (backend, _temp) = create_test_backend().await;

        let mut snapshot = MetricsSnapshot::new();
        snapshot.insert("you-pro".to_string(), ModelMetrics::seeded(900.0, 0.002));
        backend.write(&snapshot).await.unwrap();

        snapshot.get_mut("you-pro").unwrap().apply_feedback(1);
        backend.write(&snapshot).await.unwrap();

        assert_eq!(backend.row_count().await.unwrap(), 1);
        let loaded = backend.read().await.unwrap().unwrap();
        assert_eq!(loaded["you-pro"].wins, 1);
    }

    #[tokio::test]
    async fn test_store_over_sqlite() {
        let (backend, _temp) = create_test_backend().await;
        let store = MetricsStore::new(Arc::new(backend));

        store.record_feedback("claude-haiku", 1).await.unwrap();
        store
            .record_selection("claude-haiku", 780.0, 0.18)
            .await
            .unwrap();

        let snapshot = store.load().await;
        assert_eq!(snapshot.len(), 6);
        assert_eq!(snapshot["claude-haiku"].wins, 1);
        assert!((snapshot["claude-haiku"].avg_latency_ms - 940.0).abs() < 1e-9);
    }
}
