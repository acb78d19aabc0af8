//! Feedback event log
//!
//! Every rating is appended as one JSON line to `events.jsonl` in the data
//! directory. The log is an audit trail only: the metrics store remains the
//! source of truth for ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Clamp a rating to its sign
pub fn clamp_rating(rating: i64) -> i64 {
    rating.signum()
}

/// A single rating of a chosen model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Model that produced the rated output
    pub chosen: String,
    /// -1, 0 or +1
    pub rating: i64,
    #[serde(default)]
    pub note: String,
}

impl Feedback {
    pub fn new(chosen: impl Into<String>, rating: i64, note: impl Into<String>) -> Self {
        Self {
            chosen: chosen.into(),
            rating: clamp_rating(rating),
            note: note.into(),
        }
    }
}

/// Logged feedback with its identity and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    pub feedback: Feedback,
}

impl FeedbackEvent {
    pub fn new(feedback: Feedback) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            feedback,
        }
    }
}

/// Append-only JSONL log of feedback events
pub struct FeedbackLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line
    pub async fn append(&self, feedback: Feedback) -> Result<FeedbackEvent> {
        let event = FeedbackEvent::new(feedback);
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(id = %event.id, model = %event.feedback.chosen, "Appended feedback event");
        Ok(event)
    }

    /// Most recent events, oldest first; unparsable lines are skipped
    pub async fn recent(&self, count: usize) -> Result<Vec<FeedbackEvent>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events: Vec<FeedbackEvent> = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(line = number + 1, error = %e, "Skipping malformed feedback event"),
            }
        }

        // Return last N events
        if events.len() > count {
            events.drain(0..events.len() - count);
        }
        Ok(events)
    }
}
