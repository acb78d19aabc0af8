//! Ranking engine - combines priors, evidence and learned adjustments
//!
//! Each candidate of a task's prior table is scored as
//!
//! ```text
//! score = alpha * prior
//!       + beta  * (1 - static_cost)
//!       + gamma * (1 - static_latency)
//!       + delta * evidence_boost
//!       + dynamic_adjustment
//! ```
//!
//! Candidates are sorted best first. With probability `epsilon` the top two
//! are swapped so the runner-up keeps collecting feedback.

use rand::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::adjustment::{dynamic_adjustment, round_to};
use super::catalog::ModelCatalog;
use super::evidence::evidence_boost;
use super::types::{RankedCandidate, Ranking, RoutingMode, Weights};
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, MetricsStore};

/// Scoring configuration of the ranking engine
#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    /// Weights used in balanced mode
    pub weights: Weights,
    /// Probability of swapping the top two candidates
    pub epsilon: f64,
    /// Weight overrides per non-balanced mode
    pub mode_weights: HashMap<RoutingMode, Weights>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
            epsilon: 0.03,
            mode_weights: default_mode_weights(),
        }
    }
}

/// Weight overrides applied when a caller asks for a specific mode
pub fn default_mode_weights() -> HashMap<RoutingMode, Weights> {
    HashMap::from([
        (RoutingMode::Quality, Weights::new(0.70, 0.10, 0.05, 0.15)),
        (RoutingMode::Cost, Weights::new(0.40, 0.40, 0.10, 0.10)),
        (RoutingMode::Fast, Weights::new(0.40, 0.15, 0.35, 0.10)),
    ])
}

impl RankingConfig {
    /// Weights applied for `mode`; balanced and unmapped modes use the base weights
    pub fn weights_for(&self, mode: RoutingMode) -> Weights {
        match mode {
            RoutingMode::Balanced => self.weights,
            other => self
                .mode_weights
                .get(&other)
                .copied()
                .unwrap_or(self.weights),
        }
    }

    /// Epsilon clamped into a valid probability
    pub fn exploration_probability(&self) -> f64 {
        if self.epsilon.is_nan() {
            return 0.0;
        }
        self.epsilon.clamp(0.0, 1.0)
    }

    /// Set the exploration probability
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.clamp(0.0, 1.0);
        self
    }

    /// Set the base weights
    pub fn with_weights(mut self, weights: Weights) -> Self {
        self.weights = weights;
        self
    }
}

/// Ranks candidate models for a task
pub struct RankingEngine {
    catalog: ModelCatalog,
    config: RankingConfig,
    store: Arc<MetricsStore>,
    rng: Mutex<StdRng>,
}

impl RankingEngine {
    /// Create an engine over the built-in catalog
    pub fn new(store: Arc<MetricsStore>) -> Self {
        Self::with_config(store, RankingConfig::default())
    }

    /// Create an engine with custom scoring configuration
    pub fn with_config(store: Arc<MetricsStore>, config: RankingConfig) -> Self {
        Self {
            catalog: ModelCatalog::with_defaults(),
            config,
            store,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use a custom model catalog
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Fix the exploration random source (for reproducible rankings)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    /// Rank the candidates of `task_type` using the engine's random source
    pub async fn rank(
        &self,
        task_type: &str,
        search_payload: &Value,
        mode: RoutingMode,
    ) -> Result<Ranking> {
        let metrics = self.store.load().await;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::Other("ranking rng lock poisoned".to_string()))?;
        self.rank_snapshot(task_type, search_payload, mode, &metrics, &mut *rng)
    }

    /// Rank the candidates of `task_type` with a caller-supplied random source
    pub async fn rank_with_rng<R: Rng>(
        &self,
        task_type: &str,
        search_payload: &Value,
        mode: RoutingMode,
        rng: &mut R,
    ) -> Result<Ranking> {
        let metrics = self.store.load().await;
        self.rank_snapshot(task_type, search_payload, mode, &metrics, rng)
    }

    /// Rank against an explicit metrics snapshot
    pub fn rank_snapshot<R: Rng>(
        &self,
        task_type: &str,
        search_payload: &Value,
        mode: RoutingMode,
        metrics: &MetricsSnapshot,
        rng: &mut R,
    ) -> Result<Ranking> {
        let priors = self.catalog.priors_for(task_type)?;
        let weights = self.config.weights_for(mode);
        let boost = evidence_boost(task_type, search_payload, priors);

        let mut candidates = Vec::with_capacity(priors.len());
        for (model, prior) in priors {
            let profile = self.catalog.get(model).ok_or_else(|| {
                Error::ConfigError(format!(
                    "Model '{}' has a prior for '{}' but no catalog entry",
                    model, task_type
                ))
            })?;
            let evidence = boost.get(model).copied().unwrap_or(0.0);
            let adjustment = dynamic_adjustment(model, metrics);

            let score = weights.alpha * prior
                + weights.beta * (1.0 - profile.static_cost)
                + weights.gamma * (1.0 - profile.static_latency)
                + weights.delta * evidence
                + adjustment;

            candidates.push(RankedCandidate::new(model.clone(), round_to(score, 4)));
        }

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.model.cmp(&b.model))
        });

        let explored = candidates.len() > 1 && rng.gen_bool(self.config.exploration_probability());
        if explored {
            candidates.swap(0, 1);
        }

        debug!(
            task_type = %task_type,
            mode = %mode,
            top = %candidates.first().map(|c| c.model.as_str()).unwrap_or("-"),
            explored = explored,
            "Ranked candidates"
        );

        Ok(Ranking {
            task_type: task_type.to_string(),
            mode,
            candidates,
            explored,
        })
    }
}
