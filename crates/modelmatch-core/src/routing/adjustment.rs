//! Score adjustment learned from outcome history
//!
//! The adjustment is a small additive term built from four bounded parts:
//!
//! | part | formula | range |
//! |---|---|---|
//! | win rate | `0.10 * (win_rate - 0.5)` | ±0.05 |
//! | latency | `-0.04 * (latency / slowest - 1)` | [0, 0.04) |
//! | cost | `-0.06 * (cost / priciest - 1)` | [0, 0.06) |
//! | sentiment | `0.04 * tanh(thumbs / 10)` | (-0.04, 0.04) |
//!
//! Latency and cost are normalized against the slowest and most expensive
//! tracked model, so the total always stays within [`ADJUSTMENT_BOUND`].

use crate::metrics::{MetricsSnapshot, ModelMetrics};

/// Absolute bound of [`dynamic_adjustment`]
pub const ADJUSTMENT_BOUND: f64 = 0.19;

const WIN_RATE_WEIGHT: f64 = 0.10;
const LATENCY_WEIGHT: f64 = 0.04;
const COST_WEIGHT: f64 = 0.06;
const SENTIMENT_WEIGHT: f64 = 0.04;
const SENTIMENT_SCALE: f64 = 10.0;

const LATENCY_FLOOR_MS: f64 = 1.0;
const COST_FLOOR: f64 = 1e-6;

/// Additive score delta for `model` given the metrics of every tracked model
///
/// Models missing from `all_metrics` are scored from fallback metrics.
/// Must be recomputed for every ranking: the normalization depends on the
/// whole snapshot.
pub fn dynamic_adjustment(model: &str, all_metrics: &MetricsSnapshot) -> f64 {
    let metrics = all_metrics.get(model).copied().unwrap_or_default();
    let parts = AdjustmentParts::compute(&metrics, all_metrics);
    round_to(parts.total(), 6)
}

/// The individual terms of an adjustment, useful for explaining a ranking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentParts {
    pub win_rate: f64,
    pub latency: f64,
    pub cost: f64,
    pub sentiment: f64,
}

impl AdjustmentParts {
    pub fn compute(metrics: &ModelMetrics, all_metrics: &MetricsSnapshot) -> Self {
        let slowest = all_metrics
            .values()
            .chain(std::iter::once(metrics))
            .map(|m| m.avg_latency_ms.max(LATENCY_FLOOR_MS))
            .fold(LATENCY_FLOOR_MS, f64::max);
        let priciest = all_metrics
            .values()
            .chain(std::iter::once(metrics))
            .map(|m| m.avg_cost.max(COST_FLOOR))
            .fold(COST_FLOOR, f64::max);

        let norm_latency = metrics.avg_latency_ms.max(0.0) / slowest;
        let norm_cost = metrics.avg_cost.max(0.0) / priciest;

        Self {
            win_rate: WIN_RATE_WEIGHT * (metrics.win_rate() - 0.5),
            latency: -LATENCY_WEIGHT * (norm_latency - 1.0),
            cost: -COST_WEIGHT * (norm_cost - 1.0),
            sentiment: SENTIMENT_WEIGHT * (metrics.thumbs as f64 / SENTIMENT_SCALE).tanh(),
        }
    }

    pub fn total(&self) -> f64 {
        self.win_rate + self.latency + self.cost + self.sentiment
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
