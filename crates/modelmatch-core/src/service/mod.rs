//! ModelMatch service - classify, gather evidence, rank, execute, learn
//!
//! This module provides [`ModelMatch`], which ties together:
//! - a [`TaskClassifier`] to pick the prior table for a prompt
//! - a [`SearchProvider`] that supplies live evidence
//! - the [`RankingEngine`] that orders the candidates
//! - an [`ExecutionProvider`] that runs the chosen model
//! - the [`MetricsStore`] and optional [`FeedbackLog`] that record outcomes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::classifier::{KeywordClassifier, TaskClassifier, TaskProfile};
use crate::error::{Error, Result};
use crate::feedback::{Feedback, FeedbackEvent, FeedbackLog, clamp_rating};
use crate::metrics::{MetricsSnapshot, MetricsStore, ModelMetrics};
use crate::routing::{ModelCatalog, RankedCandidate, RankingConfig, RankingEngine, RoutingMode, TaskType};

/// Source of live evidence about which models suit a task
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query` and return the provider's raw payload
    async fn search(&self, query: &str) -> Result<Value>;
}

/// Runs a prompt against a specific model
#[async_trait]
pub trait ExecutionProvider: Send + Sync {
    async fn execute(&self, model: &str, prompt: &str) -> Result<Execution>;
}

/// Output of one model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub output: String,
    /// Provider-reported cost of the call, if known
    pub cost_estimate: Option<f64>,
}

impl Execution {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            cost_estimate: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_estimate = Some(cost);
        self
    }
}

/// Search provider that always returns the same payload
#[derive(Debug, Clone)]
pub struct StaticSearch {
    payload: Value,
}

impl StaticSearch {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Provider with no results
    pub fn empty() -> Self {
        Self::new(empty_payload())
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Value> {
        Ok(self.payload.clone())
    }
}

fn empty_payload() -> Value {
    json!({"results": []})
}

/// Result of routing one prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteOutcome {
    pub task_type: TaskType,
    pub profile: TaskProfile,
    /// Candidates in final order, including any exploration swap
    pub candidates: Vec<RankedCandidate>,
    pub chosen: String,
    pub output: String,
    pub latency_ms: f64,
    pub explored: bool,
}

/// The model router
pub struct ModelMatch {
    classifier: Arc<dyn TaskClassifier>,
    search: Arc<dyn SearchProvider>,
    executor: Arc<dyn ExecutionProvider>,
    engine: RankingEngine,
    feedback_log: Option<FeedbackLog>,
}

impl ModelMatch {
    /// Create a router with the keyword classifier and default scoring
    pub fn new(
        store: Arc<MetricsStore>,
        search: Arc<dyn SearchProvider>,
        executor: Arc<dyn ExecutionProvider>,
    ) -> Self {
        info!("Creating model router");
        Self {
            classifier: Arc::new(KeywordClassifier::new()),
            search,
            executor,
            engine: RankingEngine::new(store),
            feedback_log: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TaskClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_ranking_config(mut self, config: RankingConfig) -> Self {
        let store = Arc::clone(self.engine.store());
        let catalog = self.engine.catalog().clone();
        self.engine = RankingEngine::with_config(store, config).with_catalog(catalog);
        self
    }

    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.engine = self.engine.with_catalog(catalog);
        self
    }

    /// Fix the exploration random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.engine = self.engine.with_seed(seed);
        self
    }

    /// Append every rating to `log`
    pub fn with_feedback_log(mut self, log: FeedbackLog) -> Self {
        self.feedback_log = Some(log);
        self
    }

    pub fn engine(&self) -> &RankingEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        self.engine.store()
    }

    /// Classify, rank and execute `prompt`, recording the selection
    pub async fn route(&self, prompt: &str, mode: RoutingMode) -> Result<RouteOutcome> {
        let profile = self.classifier.classify(prompt);
        let task_type = profile.task_type;

        let payload = match self.search.search(&task_type.search_query()).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(task_type = %task_type, error = %e, "Search failed, ranking without evidence");
                empty_payload()
            }
        };

        let ranking = self.engine.rank(task_type.as_str(), &payload, mode).await?;
        let chosen = ranking
            .top()
            .map(|c| c.model.clone())
            .ok_or_else(|| Error::ConfigError(format!("No candidates for task '{}'", task_type)))?;

        let start = Instant::now();
        let execution = self.executor.execute(&chosen, prompt).await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let cost = execution
            .cost_estimate
            .unwrap_or_else(|| self.engine.catalog().estimated_call_cost(&chosen));
        self.store().record_selection(&chosen, latency_ms, cost).await?;

        debug!(
            task_type = %task_type,
            chosen = %chosen,
            latency_ms = latency_ms,
            explored = ranking.explored,
            "Routed prompt"
        );

        Ok(RouteOutcome {
            task_type,
            profile,
            candidates: ranking.candidates,
            chosen,
            output: execution.output,
            latency_ms,
            explored: ranking.explored,
        })
    }

    /// Record a rating for `chosen`; the rating is clamped to its sign
    ///
    /// Once the metrics are saved the call succeeds. A failed log append is
    /// only warned about, so a retry never counts the rating twice.
    pub async fn feedback(&self, chosen: &str, rating: i64, note: &str) -> Result<ModelMetrics> {
        let rating = clamp_rating(rating);
        let metrics = self.store().record_feedback(chosen, rating).await?;

        if let Some(log) = &self.feedback_log
            && let Err(e) = log.append(Feedback::new(chosen, rating, note)).await
        {
            warn!(model = %chosen, error = %e, "Failed to append feedback event");
        }

        Ok(metrics)
    }

    /// Recent logged feedback, oldest first
    pub async fn history(&self, count: usize) -> Result<Vec<FeedbackEvent>> {
        match &self.feedback_log {
            Some(log) => log.recent(count).await,
            None => Ok(Vec::new()),
        }
    }

    /// Current metrics of every tracked model
    pub async fn metrics(&self) -> MetricsSnapshot {
        self.store().load().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MemoryBackend;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records calls and answers with a fixed output
    struct RecordingExecutor {
        calls: Mutex<Vec<String>>,
        cost: Option<f64>,
    }

    impl RecordingExecutor {
        fn new(cost: Option<f64>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                cost,
            }
        }
    }

    #[async_trait]
    impl ExecutionProvider for RecordingExecutor {
        async fn execute(&self, model: &str, prompt: &str) -> Result<Execution> {
            self.calls.lock().unwrap().push(model.to_string());
            let execution = Execution::new(format!("[{}] {}", model, prompt));
            Ok(match self.cost {
                Some(cost) => execution.with_cost(cost),
                None => execution,
            })
        }
    }

    struct FailingSearch;

    #[async_trait]
    impl SearchProvider for FailingSearch {
        async fn search(&self, _query: &str) -> Result<Value> {
            Err(Error::SearchFailed("timeout".to_string()))
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl ExecutionProvider for FailingExecutor {
        async fn execute(&self, model: &str, _prompt: &str) -> Result<Execution> {
            Err(Error::ExecutionFailed(format!("{} unavailable", model)))
        }
    }

    fn greedy(config: RankingConfig) -> RankingConfig {
        config.with_epsilon(0.0)
    }

    fn router(executor: Arc<dyn ExecutionProvider>, search: Arc<dyn SearchProvider>) -> ModelMatch {
        let store = Arc::new(MetricsStore::new(Arc::new(MemoryBackend::new())));
        ModelMatch::new(store, search, executor)
            .with_ranking_config(greedy(RankingConfig::default()))
            .with_seed(11)
    }

    #[tokio::test]
    async fn test_route_executes_top_candidate() {
        let executor = Arc::new(RecordingExecutor::new(Some(0.01)));
        let mm = router(executor.clone(), Arc::new(StaticSearch::empty()));

        let outcome = mm
            .route("Refactor this function", RoutingMode::Balanced)
            .await
            .unwrap();

        assert_eq!(outcome.task_type, TaskType::Code);
        assert_eq!(outcome.chosen, outcome.candidates[0].model);
        assert_eq!(outcome.candidates.len(), 6);
        assert!(!outcome.explored);
        assert!(outcome.output.starts_with(&format!("[{}]", outcome.chosen)));
        assert_eq!(*executor.calls.lock().unwrap(), vec![outcome.chosen.clone()]);

        let metrics = mm.metrics().await;
        let seed = mm.store().defaults()[&outcome.chosen];
        let recorded = metrics[&outcome.chosen];
        let expected_cost = 0.8 * seed.avg_cost + 0.2 * 0.01;
        assert!((recorded.avg_cost - expected_cost).abs() < 1e-12);
        assert!(recorded.avg_latency_ms < seed.avg_latency_ms);
    }

    #[tokio::test]
    async fn test_missing_cost_estimate_uses_static_cost() {
        let executor = Arc::new(RecordingExecutor::new(None));
        let mm = router(executor, Arc::new(StaticSearch::empty()));

        let outcome = mm.route("hello there", RoutingMode::Balanced).await.unwrap();
        let static_cost = mm.engine().catalog().estimated_call_cost(&outcome.chosen);
        let seed = mm.store().defaults()[&outcome.chosen];

        let recorded = mm.metrics().await[&outcome.chosen];
        assert!((recorded.avg_cost - (0.8 * seed.avg_cost + 0.2 * static_cost)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_search_failure_ranks_without_evidence() {
        let failing = router(
            Arc::new(RecordingExecutor::new(None)),
            Arc::new(FailingSearch),
        );
        let plain = router(
            Arc::new(RecordingExecutor::new(None)),
            Arc::new(StaticSearch::empty()),
        );

        let a = failing
            .route("Why is the sky blue?", RoutingMode::Balanced)
            .await
            .unwrap();
        let b = plain
            .route("Why is the sky blue?", RoutingMode::Balanced)
            .await
            .unwrap();

        assert_eq!(a.task_type, TaskType::Reasoning);
        assert_eq!(a.candidates, b.candidates);
    }

    #[tokio::test]
    async fn test_execution_failure_records_nothing() {
        let mm = router(Arc::new(FailingExecutor), Arc::new(StaticSearch::empty()));

        let err = mm
            .route("Summarize this article", RoutingMode::Balanced)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(_)));
        assert_eq!(mm.metrics().await, mm.store().defaults().clone());
    }

    #[tokio::test]
    async fn test_feedback_clamps_and_logs() {
        let dir = tempdir().unwrap();
        let mm = router(
            Arc::new(RecordingExecutor::new(None)),
            Arc::new(StaticSearch::empty()),
        )
        .with_feedback_log(FeedbackLog::new(dir.path().join("events.jsonl")));

        let metrics = mm.feedback("gemini-flash", 7, "great").await.unwrap();
        assert_eq!(metrics.wins, 1);
        assert_eq!(metrics.thumbs, 1);

        mm.feedback("gemini-flash", -4, "").await.unwrap();
        let history = mm.history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].feedback.rating, 1);
        assert_eq!(history[0].feedback.note, "great");
        assert_eq!(history[1].feedback.rating, -1);

        let metrics = mm.metrics().await;
        assert_eq!(metrics["gemini-flash"].thumbs, 0);
        assert_eq!(metrics["gemini-flash"].losses, 1);
    }

    #[tokio::test]
    async fn test_feedback_log_failure_keeps_saved_metrics() {
        let dir = tempdir().unwrap();
        // A directory cannot be appended to
        let mm = router(
            Arc::new(RecordingExecutor::new(None)),
            Arc::new(StaticSearch::empty()),
        )
        .with_feedback_log(FeedbackLog::new(dir.path()));

        let first = mm.feedback("you-pro", 1, "").await.unwrap();
        assert_eq!(first.wins, 1);
        let second = mm.feedback("you-pro", 1, "").await.unwrap();
        assert_eq!(second.wins, 2);

        assert_eq!(mm.metrics().await["you-pro"].wins, 2);
    }

    #[tokio::test]
    async fn test_history_without_log_is_empty() {
        let mm = router(
            Arc::new(RecordingExecutor::new(None)),
            Arc::new(StaticSearch::empty()),
        );
        mm.feedback("you-pro", 1, "").await.unwrap();
        assert!(mm.history(5).await.unwrap().is_empty());
    }
}
