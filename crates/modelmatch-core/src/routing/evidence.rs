//! Evidence boost derived from live search results
//!
//! Search providers disagree about the shape of their payloads: `results`
//! may be a list, an object keyed by rank, or missing altogether. The payload
//! is normalized into a list of [`SearchEvidence`] entries first; scoring only
//! ever sees that canonical form. Malformed input yields an empty boost set,
//! never an error.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

/// Number of leading search results that contribute to the corpus
pub const MAX_EVIDENCE_RESULTS: usize = 5;

/// Boost applied to every model when results look like a model comparison
pub const COMPARISON_BOOST: f64 = 0.05;

const COMPARISON_TERMS: &[&str] = &["benchmark", "leaderboard", "comparison"];

/// A task-specific keyword rule
struct KeywordRule {
    task_type: &'static str,
    terms: &'static [&'static str],
    boosts: &'static [(&'static str, f64)],
}

const TASK_RULES: &[KeywordRule] = &[
    KeywordRule {
        task_type: "code",
        terms: &["code"],
        boosts: &[("you-pro", 0.04), ("mistral-small", 0.02)],
    },
    KeywordRule {
        task_type: "reasoning",
        terms: &["reason", "logic", "math"],
        boosts: &[("gpt-4-mini", 0.04), ("xai-grok4", 0.03), ("gemini-flash", 0.02)],
    },
    KeywordRule {
        task_type: "search-heavy",
        terms: &["search", "sources", "web"],
        boosts: &[("claude-haiku", 0.04), ("gemini-flash", 0.02)],
    },
];

/// Title and snippet of one search result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchEvidence {
    pub title: String,
    pub snippet: String,
}

impl SearchEvidence {
    fn from_entry(entry: &Value) -> Option<Self> {
        let object = entry.as_object()?;
        Some(Self {
            title: text_field(object.get("title"))?,
            snippet: text_field(object.get("snippet"))?,
        })
    }
}

/// Absent or null fields read as empty; any other non-string is malformed
fn text_field(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => None,
    }
}

/// Normalize a raw search payload into its leading evidence entries
pub fn normalize_results(payload: &Value) -> Vec<SearchEvidence> {
    let entries: Vec<&Value> = match payload.get("results") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(keyed)) => keyed.values().collect(),
        Some(other) => {
            debug!(kind = %value_kind(other), "Ignoring search results of unexpected shape");
            Vec::new()
        }
        None => Vec::new(),
    };

    let total = entries.len();
    let evidence: Vec<SearchEvidence> = entries
        .into_iter()
        .take(MAX_EVIDENCE_RESULTS)
        .filter_map(SearchEvidence::from_entry)
        .collect();

    if evidence.len() < total.min(MAX_EVIDENCE_RESULTS) {
        debug!(
            kept = evidence.len(),
            considered = total.min(MAX_EVIDENCE_RESULTS),
            "Skipped malformed search results"
        );
    }

    evidence
}

/// Lower-cased corpus of all titles and snippets
pub fn evidence_corpus(evidence: &[SearchEvidence]) -> String {
    evidence
        .iter()
        .map(|e| format!("{} {}", e.title, e.snippet))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Per-model additive boost for `task_type`
///
/// Every model in `priors` starts at zero; only those models can be boosted.
pub fn evidence_boost(
    task_type: &str,
    payload: &Value,
    priors: &BTreeMap<String, f64>,
) -> HashMap<String, f64> {
    let mut boost: HashMap<String, f64> = priors.keys().map(|m| (m.clone(), 0.0)).collect();

    let corpus = evidence_corpus(&normalize_results(payload));
    if corpus.trim().is_empty() {
        return boost;
    }

    if contains_any(&corpus, COMPARISON_TERMS) {
        for value in boost.values_mut() {
            *value += COMPARISON_BOOST;
        }
    }

    for rule in TASK_RULES
        .iter()
        .filter(|r| r.task_type == task_type && contains_any(&corpus, r.terms))
    {
        for (model, increment) in rule.boosts {
            if let Some(value) = boost.get_mut(*model) {
                *value += increment;
            }
        }
    }

    debug!(task_type = %task_type, boost = ?boost, "Computed evidence boost");
    boost
}

fn contains_any(corpus: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| corpus.contains(t))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
