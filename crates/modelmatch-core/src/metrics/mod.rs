//! Per-model performance metrics and their persistence
//!
//! The [`MetricsStore`] owns the only shared mutable state of the router:
//! one [`ModelMetrics`] record per model, persisted write-through to an
//! injected [`MetricsBackend`] after every mutation.
//!
//! ## Consistency
//!
//! A single async mutex guards every load-mutate-save cycle, so concurrent
//! feedback for the same model never loses an update. Reads take the same
//! lock and therefore see either the state before or after an update.
//!
//! ## Failure handling
//!
//! A missing or unreadable snapshot is not an error: the store falls back to
//! the seeded defaults and logs a warning. A failed write is surfaced as
//! [`Error::StorageWriteFailed`].

mod backend;
mod sqlite;

pub use backend::{JsonFileBackend, MemoryBackend, MetricsBackend};
pub use sqlite::{SqliteBackend, CREATE_MODEL_METRICS_TABLE_SQL};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::routing::ModelCatalog;

/// Full metrics state, keyed by model identifier
pub type MetricsSnapshot = BTreeMap<String, ModelMetrics>;

/// Smoothing factor of the latency and cost moving averages
pub const EMA_ALPHA: f64 = 0.2;

/// Observed performance of a single model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Positive feedback count
    #[serde(default)]
    pub wins: u64,
    /// Negative feedback count
    #[serde(default)]
    pub losses: u64,
    /// Sum of all ratings ever recorded
    #[serde(default)]
    pub thumbs: i64,
    /// Moving average of observed latency
    #[serde(default = "fallback_latency")]
    pub avg_latency_ms: f64,
    /// Moving average of the per-call cost estimate
    #[serde(default = "fallback_cost")]
    pub avg_cost: f64,
}

fn fallback_latency() -> f64 {
    ModelMetrics::FALLBACK_LATENCY_MS
}

fn fallback_cost() -> f64 {
    ModelMetrics::FALLBACK_COST
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::seeded(Self::FALLBACK_LATENCY_MS, Self::FALLBACK_COST)
    }
}

impl ModelMetrics {
    /// Latency seed for models outside the catalog
    pub const FALLBACK_LATENCY_MS: f64 = 900.0;
    /// Cost seed for models outside the catalog
    pub const FALLBACK_COST: f64 = 0.002;

    /// Fresh record with zeroed counters
    pub fn seeded(avg_latency_ms: f64, avg_cost: f64) -> Self {
        Self {
            wins: 0,
            losses: 0,
            thumbs: 0,
            avg_latency_ms,
            avg_cost,
        }
    }

    /// Fold one execution into the moving averages
    pub fn observe_selection(&mut self, latency_ms: f64, cost: f64) {
        self.avg_latency_ms = (1.0 - EMA_ALPHA) * self.avg_latency_ms + EMA_ALPHA * latency_ms;
        self.avg_cost = (1.0 - EMA_ALPHA) * self.avg_cost + EMA_ALPHA * cost;
    }

    /// Fold one rating into the counters
    pub fn apply_feedback(&mut self, rating: i64) {
        if rating > 0 {
            self.wins += 1;
        }
        if rating < 0 {
            self.losses += 1;
        }
        self.thumbs = self.thumbs.saturating_add(rating);
    }

    /// Share of positive ratings, 0.5 without history
    pub fn win_rate(&self) -> f64 {
        let total = self.wins + self.losses;
        if total == 0 {
            return 0.5;
        }
        self.wins as f64 / total as f64
    }

    fn has_valid_averages(&self) -> bool {
        self.avg_latency_ms.is_finite()
            && self.avg_latency_ms > 0.0
            && self.avg_cost.is_finite()
            && self.avg_cost > 0.0
    }
}

/// Thread-safe store for per-model metrics
pub struct MetricsStore {
    backend: Arc<dyn MetricsBackend>,
    defaults: MetricsSnapshot,
    lock: Mutex<()>,
}

impl MetricsStore {
    /// Create a store seeded with the built-in catalog defaults
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        Self::with_defaults(backend, ModelCatalog::with_defaults().default_metrics())
    }

    /// Create a store with custom seed records
    pub fn with_defaults(backend: Arc<dyn MetricsBackend>, defaults: MetricsSnapshot) -> Self {
        debug!(backend = %backend.describe(), models = defaults.len(), "Metrics store created");
        Self {
            backend,
            defaults,
            lock: Mutex::new(()),
        }
    }

    /// Seed records used when nothing is persisted
    pub fn defaults(&self) -> &MetricsSnapshot {
        &self.defaults
    }

    /// Current snapshot, back-filled with defaults
    pub async fn load(&self) -> MetricsSnapshot {
        let _guard = self.lock.lock().await;
        self.read_snapshot().await
    }

    /// Metrics of a single model, falling back to its seed record
    pub async fn get(&self, model: &str) -> ModelMetrics {
        let snapshot = self.load().await;
        self.fetch_or_default(&snapshot, model)
    }

    /// Persist a full snapshot, replacing prior state
    pub async fn save(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_snapshot(snapshot).await
    }

    /// Record one execution of `model`
    pub async fn record_selection(
        &self,
        model: &str,
        latency_ms: f64,
        est_cost: f64,
    ) -> Result<ModelMetrics> {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Latency must be a non-negative number, got {}",
                latency_ms
            )));
        }
        if !est_cost.is_finite() || est_cost < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Cost estimate must be a non-negative number, got {}",
                est_cost
            )));
        }

        let _guard = self.lock.lock().await;
        let mut snapshot = self.read_snapshot().await;

        let mut metrics = self.fetch_or_default(&snapshot, model);
        metrics.observe_selection(latency_ms, est_cost);
        snapshot.insert(model.to_string(), metrics);

        self.write_snapshot(&snapshot).await?;

        debug!(
            model = %model,
            latency_ms = latency_ms,
            est_cost = est_cost,
            avg_latency_ms = metrics.avg_latency_ms,
            avg_cost = metrics.avg_cost,
            "Recorded model selection"
        );

        Ok(metrics)
    }

    /// Record a rating for `model`; positive counts as a win, negative as a loss
    pub async fn record_feedback(&self, model: &str, rating: i64) -> Result<ModelMetrics> {
        let _guard = self.lock.lock().await;
        let mut snapshot = self.read_snapshot().await;

        let mut metrics = self.fetch_or_default(&snapshot, model);
        metrics.apply_feedback(rating);
        snapshot.insert(model.to_string(), metrics);

        self.write_snapshot(&snapshot).await?;

        debug!(
            model = %model,
            rating = rating,
            wins = metrics.wins,
            losses = metrics.losses,
            thumbs = metrics.thumbs,
            "Recorded feedback"
        );

        Ok(metrics)
    }

    fn fetch_or_default(&self, snapshot: &MetricsSnapshot, model: &str) -> ModelMetrics {
        snapshot
            .get(model)
            .or_else(|| self.defaults.get(model))
            .copied()
            .unwrap_or_default()
    }

    /// Read without taking the lock; callers must hold it
    async fn read_snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = match self.backend.read().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!(backend = %self.backend.describe(), "No persisted metrics, using defaults");
                MetricsSnapshot::new()
            }
            Err(e) => {
                warn!(
                    backend = %self.backend.describe(),
                    error = %e,
                    "Unreadable metrics snapshot, falling back to defaults"
                );
                MetricsSnapshot::new()
            }
        };

        for (model, metrics) in snapshot.iter_mut() {
            if !metrics.has_valid_averages() {
                let seed = self.defaults.get(model).copied().unwrap_or_default();
                warn!(model = %model, "Discarding non-positive moving averages");
                metrics.avg_latency_ms = seed.avg_latency_ms;
                metrics.avg_cost = seed.avg_cost;
            }
        }

        for (model, seed) in &self.defaults {
            snapshot.entry(model.clone()).or_insert(*seed);
        }

        snapshot
    }

    /// Write without taking the lock; callers must hold it
    async fn write_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        self.backend
            .write(snapshot)
            .await
            .map_err(|e| Error::StorageWriteFailed(e.to_string()))
    }
}
