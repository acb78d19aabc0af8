//! ModelMatch Core Library
//!
//! This crate provides the core functionality for ModelMatch, including:
//! - Task classification of incoming prompts
//! - Evidence-weighted model ranking with epsilon-greedy exploration
//! - Per-model metrics (moving averages, win/loss counters) with JSON or SQLite persistence
//! - Append-only feedback log
//! - The `ModelMatch` service tying classification, search, ranking and execution together

pub mod classifier;
pub mod config;
pub mod error;
pub mod feedback;
pub mod metrics;
pub mod routing;
pub mod service;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classifier::{KeywordClassifier, TaskClassifier, TaskProfile};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{MetricsStore, ModelMetrics};
    pub use crate::routing::{RankingEngine, Ranking, RoutingMode, TaskType};
    pub use crate::service::{ExecutionProvider, ModelMatch, SearchProvider};
}
