//! Prompt classification
//!
//! A [`TaskClassifier`] maps a raw prompt onto the task type whose prior
//! table the ranking engine should use. The built-in [`KeywordClassifier`]
//! is a cheap rule list; callers with a learned classifier can plug it in
//! through the trait.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::routing::TaskType;

/// Prompts shorter than this many characters are considered short
pub const SHORT_PROMPT_CHARS: usize = 240;

/// Rough size of the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLength {
    Short,
    Long,
}

/// Rough difficulty of the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Normal,
    High,
}

/// Classification result for a single prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProfile {
    pub task_type: TaskType,
    pub length: PromptLength,
    pub difficulty: Difficulty,
}

/// Maps a prompt onto a task profile
pub trait TaskClassifier: Send + Sync {
    fn classify(&self, prompt: &str) -> TaskProfile;
}

/// Ordered phrase rules; the first rule with a matching phrase wins
const TASK_RULES: &[(TaskType, &[&str])] = &[
    (
        TaskType::Code,
        &["write code", "refactor", "unit test", "python", "bug", "leetcode"],
    ),
    (
        TaskType::Summarization,
        &["summarize", "abstract", "tl;dr", "condense"],
    ),
    (
        TaskType::SearchHeavy,
        &["http", "www.", "sources", "citations", "research"],
    ),
    (
        TaskType::Reasoning,
        &["why", "prove", "derive", "step by step", "reason"],
    ),
];

static HARD_WORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(optimize|prove|theorem|multi-step|chain)\b")
        .expect("hard-word pattern is valid")
});

/// Phrase-matching classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn task_type(lowered: &str) -> TaskType {
        TASK_RULES
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| lowered.contains(p)))
            .map(|(task, _)| *task)
            .unwrap_or(TaskType::General)
    }

    fn difficulty(lowered: &str) -> Difficulty {
        if HARD_WORDS_RE.is_match(lowered) {
            Difficulty::High
        } else {
            Difficulty::Normal
        }
    }
}

impl TaskClassifier for KeywordClassifier {
    fn classify(&self, prompt: &str) -> TaskProfile {
        let lowered = prompt.to_lowercase();
        let length = if prompt.chars().count() < SHORT_PROMPT_CHARS {
            PromptLength::Short
        } else {
            PromptLength::Long
        };

        TaskProfile {
            task_type: Self::task_type(&lowered),
            length,
            difficulty: Self::difficulty(&lowered),
        }
    }
}
