//! Types for evidence-weighted model ranking
//!
//! This module defines the task labels, routing modes, scoring weights and
//! ranking results shared by the ranking engine and its callers.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Coarse category of a prompt's intent, used to select a prior table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Writing, refactoring or debugging code
    Code,
    /// Multi-step reasoning, proofs, derivations
    Reasoning,
    /// Condensing existing text
    Summarization,
    /// Questions that lean on web sources and citations
    SearchHeavy,
    /// Everything else
    General,
}

impl TaskType {
    /// All supported task types in display order
    pub const ALL: [TaskType; 5] = [
        Self::Code,
        Self::Reasoning,
        Self::Summarization,
        Self::SearchHeavy,
        Self::General,
    ];

    /// Label used for prior tables and persisted records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Reasoning => "reasoning",
            Self::Summarization => "summarization",
            Self::SearchHeavy => "search-heavy",
            Self::General => "general",
        }
    }

    /// Query sent to the search provider to gather evidence for this task
    pub fn search_query(&self) -> String {
        format!("best llm for {} tasks benchmark 2025", self.as_str())
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "reasoning" => Ok(Self::Reasoning),
            "summarization" => Ok(Self::Summarization),
            "search-heavy" => Ok(Self::SearchHeavy),
            "general" => Ok(Self::General),
            _ => Err(Error::UnknownTaskType(s.to_string())),
        }
    }
}

/// Routing mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Configured base weights
    #[default]
    Balanced,
    /// Lean on task-fit priors and evidence
    Quality,
    /// Lean on the static cost prior
    Cost,
    /// Lean on the static latency prior
    Fast,
}

impl RoutingMode {
    /// All modes in display order
    pub const ALL: [RoutingMode; 4] = [Self::Balanced, Self::Quality, Self::Cost, Self::Fast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Quality => "quality",
            Self::Cost => "cost",
            Self::Fast => "fast",
        }
    }
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RoutingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "balanced" => Ok(Self::Balanced),
            "quality" => Ok(Self::Quality),
            "cost" => Ok(Self::Cost),
            "fast" => Ok(Self::Fast),
            _ => Err(Error::UnknownMode(s.to_string())),
        }
    }
}

/// Weights of the static score components
///
/// The weights are free configuration: they are expected to sum near 1.0
/// but nothing normalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Weight of the task-fit prior
    pub alpha: f64,
    /// Weight of the inverted static cost prior
    pub beta: f64,
    /// Weight of the inverted static latency prior
    pub gamma: f64,
    /// Weight of the search evidence boost
    pub delta: f64,
}

impl Weights {
    pub const fn new(alpha: f64, beta: f64, gamma: f64, delta: f64) -> Self {
        Self {
            alpha,
            beta,
            gamma,
            delta,
        }
    }

    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.alpha + self.beta + self.gamma + self.delta
    }

    /// Whether every weight is a finite number
    pub fn is_finite(&self) -> bool {
        self.alpha.is_finite()
            && self.beta.is_finite()
            && self.gamma.is_finite()
            && self.delta.is_finite()
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::new(0.55, 0.20, 0.15, 0.10)
    }
}

/// A model with its combined score for one ranking request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Model identifier
    pub model: String,
    /// Combined score, rounded to four decimals
    pub score: f64,
}

impl RankedCandidate {
    pub fn new(model: impl Into<String>, score: f64) -> Self {
        Self {
            model: model.into(),
            score,
        }
    }
}

/// Result of a ranking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    /// Task type the priors were taken from
    pub task_type: String,
    /// Mode whose weights were applied
    pub mode: RoutingMode,
    /// Candidates, best first
    pub candidates: Vec<RankedCandidate>,
    /// Whether exploration swapped the top two candidates
    pub explored: bool,
}

impl Ranking {
    /// The candidate the caller should execute
    pub fn top(&self) -> Option<&RankedCandidate> {
        self.candidates.first()
    }

    /// Model identifiers in ranked order
    pub fn model_ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.model.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse() {
        assert_eq!("code".parse::<TaskType>().unwrap(), TaskType::Code);
        assert_eq!(
            "Search-Heavy".parse::<TaskType>().unwrap(),
            TaskType::SearchHeavy
        );
        let err = "poetry".parse::<TaskType>().unwrap_err();
        assert!(matches!(err, Error::UnknownTaskType(ref t) if t == "poetry"));
    }

    #[test]
    fn test_task_type_labels_round_trip() {
        for task in TaskType::ALL {
            assert_eq!(task.as_str().parse::<TaskType>().unwrap(), task);
        }
    }

    #[test]
    fn test_task_type_serde_uses_labels() {
        let json = serde_json::to_string(&TaskType::SearchHeavy).unwrap();
        assert_eq!(json, "\"search-heavy\"");
    }

    #[test]
    fn test_search_query() {
        assert_eq!(
            TaskType::Reasoning.search_query(),
            "best llm for reasoning tasks benchmark 2025"
        );
    }

    #[test]
    fn test_routing_mode_parse() {
        assert_eq!(
            "balanced".parse::<RoutingMode>().unwrap(),
            RoutingMode::Balanced
        );
        assert_eq!("COST".parse::<RoutingMode>().unwrap(), RoutingMode::Cost);
        assert!("cheap".parse::<RoutingMode>().is_err());
        assert_eq!(RoutingMode::default(), RoutingMode::Balanced);
    }

    #[test]
    fn test_default_weights() {
        let weights = Weights::default();
        assert_eq!(weights.alpha, 0.55);
        assert_eq!(weights.delta, 0.10);
        assert!((weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_accessors() {
        let ranking = Ranking {
            task_type: "code".to_string(),
            mode: RoutingMode::Balanced,
            candidates: vec![
                RankedCandidate::new("you-pro", 0.8),
                RankedCandidate::new("mistral-small", 0.7),
            ],
            explored: false,
        };

        assert_eq!(ranking.top().unwrap().model, "you-pro");
        assert_eq!(ranking.model_ids(), vec!["you-pro", "mistral-small"]);
        assert_eq!(ranking.len(), 2);
    }
}
