//! Catalog of candidate models, their static priors and task-fit tables

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::TaskType;
use crate::error::{Error, Result};
use crate::metrics::{MetricsSnapshot, ModelMetrics};

/// Static profile of a candidate model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model identifier (e.g., "claude-haiku")
    pub model_id: String,
    /// Normalized cost prior in [0, 1], lower is cheaper
    pub static_cost: f64,
    /// Normalized latency prior in [0, 1], lower is faster
    pub static_latency: f64,
    /// Seed for the latency moving average
    pub default_latency_ms: f64,
    /// Seed for the per-call cost moving average
    pub default_cost: f64,
}

impl ModelProfile {
    /// Create a profile with neutral priors
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            static_cost: 0.5,
            static_latency: 0.5,
            default_latency_ms: ModelMetrics::FALLBACK_LATENCY_MS,
            default_cost: ModelMetrics::FALLBACK_COST,
        }
    }

    /// Set the normalized cost and latency priors
    pub fn with_static_priors(mut self, cost: f64, latency: f64) -> Self {
        self.static_cost = cost.clamp(0.0, 1.0);
        self.static_latency = latency.clamp(0.0, 1.0);
        self
    }

    /// Set the seeds of the moving averages
    pub fn with_defaults(mut self, latency_ms: f64, cost: f64) -> Self {
        self.default_latency_ms = latency_ms;
        self.default_cost = cost;
        self
    }

    /// Metrics record a model starts with before any observation
    pub fn default_metrics(&self) -> ModelMetrics {
        ModelMetrics::seeded(self.default_latency_ms, self.default_cost)
    }
}

/// Registry of models plus the per-task prior tables
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelProfile>,
    priors: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ModelCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the six built-in models and their priors
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        for (model_id, cost, latency, latency_ms, avg_cost) in [
            ("you-pro", 0.22, 0.75, 900.0, 0.0020),
            ("gpt-4-mini", 0.30, 0.80, 950.0, 0.0030),
            ("claude-haiku", 0.18, 0.78, 980.0, 0.0018),
            ("gemini-flash", 0.20, 0.77, 960.0, 0.0020),
            ("mistral-small", 0.12, 0.70, 880.0, 0.0010),
            ("xai-grok4", 0.35, 0.85, 1050.0, 0.0035),
        ] {
            catalog.register(
                ModelProfile::new(model_id)
                    .with_static_priors(cost, latency)
                    .with_defaults(latency_ms, avg_cost),
            );
        }

        // Columns: you-pro, gpt-4-mini, claude-haiku, gemini-flash, mistral-small, xai-grok4
        let tables: [(TaskType, [f64; 6]); 5] = [
            (TaskType::Code, [0.80, 0.77, 0.70, 0.72, 0.74, 0.73]),
            (TaskType::Reasoning, [0.80, 0.85, 0.74, 0.76, 0.78, 0.82]),
            (TaskType::Summarization, [0.81, 0.76, 0.74, 0.78, 0.73, 0.75]),
            (TaskType::SearchHeavy, [0.76, 0.73, 0.80, 0.77, 0.71, 0.74]),
            (TaskType::General, [0.78, 0.75, 0.74, 0.76, 0.73, 0.75]),
        ];
        let columns = [
            "you-pro",
            "gpt-4-mini",
            "claude-haiku",
            "gemini-flash",
            "mistral-small",
            "xai-grok4",
        ];

        for (task, row) in tables {
            let table = columns
                .iter()
                .zip(row)
                .map(|(model, prior)| (model.to_string(), prior))
                .collect();
            catalog.priors.insert(task.as_str().to_string(), table);
        }

        catalog
    }

    /// Register a model
    pub fn register(&mut self, profile: ModelProfile) {
        self.models.insert(profile.model_id.clone(), profile);
    }

    /// Install the prior table for a task label
    ///
    /// Every model named in the table must already be registered.
    pub fn set_priors(
        &mut self,
        task_type: impl Into<String>,
        priors: BTreeMap<String, f64>,
    ) -> Result<()> {
        let task_type = task_type.into();
        if let Some(unknown) = priors.keys().find(|m| !self.models.contains_key(*m)) {
            return Err(Error::ConfigError(format!(
                "Prior table '{}' references unregistered model '{}'",
                task_type, unknown
            )));
        }
        if let Some((model, prior)) = priors.iter().find(|(_, p)| !(0.0..=1.0).contains(*p)) {
            return Err(Error::ConfigError(format!(
                "Prior for '{}' in '{}' must be within [0, 1], got {}",
                model, task_type, prior
            )));
        }
        self.priors.insert(task_type, priors);
        Ok(())
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<&ModelProfile> {
        self.models.get(model_id)
    }

    /// Get all models
    pub fn all(&self) -> impl Iterator<Item = &ModelProfile> {
        self.models.values()
    }

    /// Known task labels
    pub fn task_types(&self) -> impl Iterator<Item = &str> {
        self.priors.keys().map(String::as_str)
    }

    /// Prior table for a task label
    pub fn priors_for(&self, task_type: &str) -> Result<&BTreeMap<String, f64>> {
        self.priors
            .get(task_type)
            .ok_or_else(|| Error::UnknownTaskType(task_type.to_string()))
    }

    /// Seed metrics for every registered model
    pub fn default_metrics(&self) -> MetricsSnapshot {
        self.models
            .values()
            .map(|p| (p.model_id.clone(), p.default_metrics()))
            .collect()
    }

    /// Per-call cost estimate recorded when the executor reports none
    pub fn estimated_call_cost(&self, model_id: &str) -> f64 {
        self.get(model_id)
            .map(|p| p.static_cost)
            .unwrap_or(Self::FALLBACK_CALL_COST)
    }

    const FALLBACK_CALL_COST: f64 = 0.0015;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_has_six_models() {
        let catalog = ModelCatalog::with_defaults();
        assert_eq!(catalog.all().count(), 6);
        assert_eq!(catalog.get("mistral-small").unwrap().static_cost, 0.12);
        assert_eq!(catalog.get("xai-grok4").unwrap().static_latency, 0.85);
    }

    #[test]
    fn test_every_task_type_has_a_full_table() {
        let catalog = ModelCatalog::with_defaults();
        for task in TaskType::ALL {
            let table = catalog.priors_for(task.as_str()).unwrap();
            assert_eq!(table.len(), 6, "table for {} is incomplete", task);
        }
        assert_eq!(
            catalog.priors_for("reasoning").unwrap()["gpt-4-mini"],
            0.85
        );
    }

    #[test]
    fn test_unknown_task_type_is_rejected() {
        let catalog = ModelCatalog::with_defaults();
        let err = catalog.priors_for("poetry").unwrap_err();
        assert!(matches!(err, Error::UnknownTaskType(_)));
    }

    #[test]
    fn test_default_metrics_seeds() {
        let catalog = ModelCatalog::with_defaults();
        let metrics = catalog.default_metrics();
        assert_eq!(metrics.len(), 6);

        let grok = &metrics["xai-grok4"];
        assert_eq!(grok.avg_latency_ms, 1050.0);
        assert_eq!(grok.avg_cost, 0.0035);
        assert_eq!(grok.wins, 0);
        assert_eq!(grok.thumbs, 0);
    }

    #[test]
    fn test_set_priors_validates_models() {
        let mut catalog = ModelCatalog::with_defaults();

        let mut table = BTreeMap::new();
        table.insert("unregistered".to_string(), 0.5);
        assert!(catalog.set_priors("translation", table).is_err());

        let mut table = BTreeMap::new();
        table.insert("claude-haiku".to_string(), 0.9);
        table.insert("you-pro".to_string(), 0.6);
        catalog.set_priors("translation", table).unwrap();
        assert_eq!(catalog.priors_for("translation").unwrap().len(), 2);
    }

    #[test]
    fn test_set_priors_rejects_out_of_range() {
        let mut catalog = ModelCatalog::with_defaults();
        let mut table = BTreeMap::new();
        table.insert("you-pro".to_string(), 1.5);
        assert!(catalog.set_priors("translation", table).is_err());
    }

    #[test]
    fn test_estimated_call_cost() {
        let catalog = ModelCatalog::with_defaults();
        assert_eq!(catalog.estimated_call_cost("claude-haiku"), 0.18);
        assert_eq!(catalog.estimated_call_cost("unknown"), 0.0015);
    }
}
