//! Evidence-weighted model ranking with online adjustment
//!
//! This module turns heterogeneous signals into one ordered list of
//! candidate models. The key components are:
//!
//! - **Model Catalog**: the candidate models with their static cost and
//!   latency priors, and the per-task prior tables.
//!
//! - **Evidence Boost**: keyword evidence pulled from live search results.
//!
//! - **Dynamic Adjustment**: a bounded score delta learned from each model's
//!   win rate, observed latency and cost, and accumulated ratings.
//!
//! - **Ranking Engine**: combines all of the above with configurable weights
//!   and applies epsilon-greedy exploration.
//!
//! ## How It Works
//!
//! 1. The caller classifies the prompt into a task type
//! 2. Search results for the task are turned into an evidence boost
//! 3. Every model of the task's prior table is scored and sorted
//! 4. With a small probability the top two are swapped to keep exploring
//! 5. After execution and rating, the metrics store is updated and the next
//!    ranking reflects the outcome
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use modelmatch_core::metrics::{JsonFileBackend, MetricsStore};
//! use modelmatch_core::routing::{RankingEngine, RoutingMode};
//!
//! let store = Arc::new(MetricsStore::new(Arc::new(JsonFileBackend::new("data/metrics.json"))));
//! let engine = RankingEngine::new(Arc::clone(&store));
//!
//! let ranking = engine.rank("code", &search_payload, RoutingMode::Balanced).await?;
//! let chosen = &ranking.top().unwrap().model;
//!
//! // Execute the model, then report what happened
//! store.record_selection(chosen, latency_ms, est_cost).await?;
//! store.record_feedback(chosen, 1).await?;
//! ```

mod adjustment;
mod catalog;
mod evidence;
mod ranker;
mod types;

pub use adjustment::{dynamic_adjustment, AdjustmentParts, ADJUSTMENT_BOUND};
pub use catalog::{ModelCatalog, ModelProfile};
pub use evidence::{
    evidence_boost, evidence_corpus, normalize_results, SearchEvidence, COMPARISON_BOOST,
    MAX_EVIDENCE_RESULTS,
};
pub use ranker::{default_mode_weights, RankingConfig, RankingEngine};
pub use types::{RankedCandidate, Ranking, RoutingMode, TaskType, Weights};
