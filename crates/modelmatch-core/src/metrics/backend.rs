//! Storage backends for the metrics snapshot

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};

use super::MetricsSnapshot;
use crate::error::{Error, Result};

/// Durable storage for a full metrics snapshot
///
/// `read` returns `Ok(None)` when nothing has been persisted yet. Any other
/// failure is reported as an error and handled by the store.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Read the persisted snapshot, if any
    async fn read(&self) -> Result<Option<MetricsSnapshot>>;

    /// Replace the persisted snapshot
    async fn write(&self, snapshot: &MetricsSnapshot) -> Result<()>;

    /// Human-readable location, used in logs
    fn describe(&self) -> String;
}

/// JSON document on the local filesystem
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so readers never observe a partially written document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "metrics.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl MetricsBackend for JsonFileBackend {
    async fn read(&self) -> Result<Option<MetricsSnapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let snapshot: MetricsSnapshot = serde_json::from_str(&contents)?;
        debug!(path = %self.path.display(), models = snapshot.len(), "Loaded metrics file");
        Ok(Some(snapshot))
    }

    async fn write(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = serde_json::to_string_pretty(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), models = snapshot.len(), "Saved metrics file");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// In-process snapshot, nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: RwLock<Option<MetricsSnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: MetricsSnapshot) -> Self {
        info!(models = snapshot.len(), "Seeded in-memory metrics backend");
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl MetricsBackend for MemoryBackend {
    async fn read(&self) -> Result<Option<MetricsSnapshot>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| Error::Other("metrics snapshot lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    async fn write(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| Error::Other("metrics snapshot lock poisoned".to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
