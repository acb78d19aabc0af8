//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::metrics::{JsonFileBackend, MetricsBackend, SqliteBackend};
use crate::routing::{RankingConfig, RoutingMode, Weights, default_mode_weights};

/// ModelMatch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub routing: RoutingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub epsilon: f64,
    pub default_mode: String,
    /// Weight overrides keyed by mode name
    pub modes: BTreeMap<String, Weights>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub feedback_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routing: RoutingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let weights = Weights::default();
        Self {
            alpha: weights.alpha,
            beta: weights.beta,
            gamma: weights.gamma,
            delta: weights.delta,
            epsilon: RankingConfig::default().epsilon,
            default_mode: RoutingMode::Balanced.as_str().to_string(),
            modes: default_mode_weights()
                .into_iter()
                .map(|(mode, w)| (mode.as_str().to_string(), w))
                .collect(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            data_dir: None,
            feedback_log: true,
        }
    }
}

impl RoutingConfig {
    pub fn weights(&self) -> Weights {
        Weights::new(self.alpha, self.beta, self.gamma, self.delta)
    }

    fn mode_weights_mut(&mut self, mode: &str) -> anyhow::Result<&mut Weights> {
        let parsed: RoutingMode = mode.parse()?;
        if parsed == RoutingMode::Balanced {
            return Err(anyhow!(
                "Balanced mode uses routing.alpha|beta|gamma|delta; it has no override table"
            ));
        }
        let base = self.weights();
        Ok(self.modes.entry(parsed.as_str().to_string()).or_insert(base))
    }
}

/// Environment variables that override routing settings after the file is read
const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("ROUTING_ALPHA", "routing.alpha"),
    ("ROUTING_BETA", "routing.beta"),
    ("ROUTING_GAMMA", "routing.gamma"),
    ("ROUTING_DELTA", "routing.delta"),
    ("ROUTING_EPSILON", "routing.epsilon"),
];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("MODELMATCH_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("modelmatch")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file (or defaults) and apply environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file, without environment overrides
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            // Return default config without creating file
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Apply overrides looked up by environment variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                self.set(key, value.trim())
                    .with_context(|| format!("Invalid value in {}", var))?;
            }
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let routing = &self.routing;
        if !routing.weights().is_finite() {
            return Err(anyhow!("Routing weights must be finite numbers"));
        }
        if !(0.0..=1.0).contains(&routing.epsilon) {
            return Err(anyhow!("routing.epsilon must be between 0.0 and 1.0"));
        }
        routing.default_mode.parse::<RoutingMode>()?;
        for (mode, weights) in &routing.modes {
            mode.parse::<RoutingMode>()?;
            if !weights.is_finite() {
                return Err(anyhow!("Weights for mode '{}' must be finite numbers", mode));
            }
        }
        Ok(())
    }

    /// Mode used when a caller does not pick one
    pub fn default_mode(&self) -> anyhow::Result<RoutingMode> {
        Ok(self.routing.default_mode.parse::<RoutingMode>()?)
    }

    /// Scoring configuration for the ranking engine
    pub fn ranking_config(&self) -> anyhow::Result<RankingConfig> {
        let mut mode_weights = default_mode_weights();
        for (mode, weights) in &self.routing.modes {
            mode_weights.insert(mode.parse::<RoutingMode>()?, *weights);
        }
        Ok(RankingConfig {
            weights: self.routing.weights(),
            epsilon: self.routing.epsilon,
            mode_weights,
        })
    }

    /// Directory holding metrics and the feedback log
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        if let Ok(custom_dir) = env::var("MODELMATCH_DATA_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("modelmatch"))
    }

    /// Location of the persisted metrics for the configured backend
    pub fn metrics_path(&self) -> anyhow::Result<PathBuf> {
        let file = match self.storage.backend {
            StorageBackend::Json => "metrics.json",
            StorageBackend::Sqlite => "metrics.db",
        };
        Ok(self.data_dir()?.join(file))
    }

    /// Location of the feedback event log
    pub fn events_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.data_dir()?.join("events.jsonl"))
    }

    /// Open the configured metrics backend
    pub async fn open_metrics_backend(&self) -> anyhow::Result<Arc<dyn MetricsBackend>> {
        let path = self.metrics_path()?;
        let backend: Arc<dyn MetricsBackend> = match self.storage.backend {
            StorageBackend::Json => Arc::new(JsonFileBackend::new(&path)),
            StorageBackend::Sqlite => Arc::new(
                SqliteBackend::connect(&path)
                    .await
                    .with_context(|| format!("Failed to open metrics database: {}", path.display()))?,
            ),
        };
        Ok(backend)
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // Routing settings
            "routing.alpha" => Ok(self.routing.alpha.to_string()),
            "routing.beta" => Ok(self.routing.beta.to_string()),
            "routing.gamma" => Ok(self.routing.gamma.to_string()),
            "routing.delta" => Ok(self.routing.delta.to_string()),
            "routing.epsilon" => Ok(self.routing.epsilon.to_string()),
            "routing.default_mode" => Ok(self.routing.default_mode.clone()),

            // Storage settings
            "storage.backend" => Ok(self.storage.backend.as_str().to_string()),
            "storage.data_dir" => Ok(self.data_dir()?.display().to_string()),
            "storage.feedback_log" => Ok(self.storage.feedback_log.to_string()),

            _ => {
                if let Some((mode, field)) = parse_mode_key(key) {
                    let weights = self
                        .ranking_config()?
                        .weights_for(mode.parse::<RoutingMode>()?);
                    return weight_field(&weights, field, key).map(|v| v.to_string());
                }
                Err(anyhow!(
                    "Unknown configuration key: {}. Use `modelmatch config list` to see available keys.",
                    key
                ))
            }
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "routing.alpha" => self.routing.alpha = parse_weight(key, value)?,
            "routing.beta" => self.routing.beta = parse_weight(key, value)?,
            "routing.gamma" => self.routing.gamma = parse_weight(key, value)?,
            "routing.delta" => self.routing.delta = parse_weight(key, value)?,
            "routing.epsilon" => {
                let epsilon: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid epsilon value: {}", value))?;
                if !(0.0..=1.0).contains(&epsilon) {
                    return Err(anyhow!("Epsilon must be between 0.0 and 1.0"));
                }
                self.routing.epsilon = epsilon;
            }
            "routing.default_mode" => {
                let mode: RoutingMode = value.parse()?;
                self.routing.default_mode = mode.as_str().to_string();
            }

            "storage.backend" => {
                self.storage.backend = match value {
                    "json" => StorageBackend::Json,
                    "sqlite" => StorageBackend::Sqlite,
                    _ => {
                        return Err(anyhow!(
                            "Invalid storage backend: {}. Valid options: json, sqlite",
                            value
                        ));
                    }
                };
            }
            "storage.data_dir" => {
                self.storage.data_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "storage.feedback_log" => {
                self.storage.feedback_log = value
                    .parse()
                    .with_context(|| format!("Invalid feedback_log value: {} (expected true or false)", value))?;
            }

            _ => {
                let Some((mode, field)) = parse_mode_key(key) else {
                    return Err(anyhow!(
                        "Unknown configuration key: {}. Use `modelmatch config list` to see available keys.",
                        key
                    ));
                };
                let parsed = parse_weight(key, value)?;
                let weights = self.routing.mode_weights_mut(mode)?;
                *weight_field_mut(weights, field, key)? = parsed;
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut keys: Vec<String> = [
            "routing.alpha",
            "routing.beta",
            "routing.gamma",
            "routing.delta",
            "routing.epsilon",
            "routing.default_mode",
            "storage.backend",
            "storage.data_dir",
            "storage.feedback_log",
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();

        for mode in RoutingMode::ALL.iter().filter(|m| **m != RoutingMode::Balanced) {
            for field in WEIGHT_FIELDS {
                keys.push(format!("routing.modes.{}.{}", mode, field));
            }
        }

        keys.into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

const WEIGHT_FIELDS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// Split `routing.modes.<mode>.<field>` into its mode and field
fn parse_mode_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("routing.modes.")?;
    let (mode, field) = rest.split_once('.')?;
    Some((mode, field))
}

fn weight_field(weights: &Weights, field: &str, key: &str) -> anyhow::Result<f64> {
    match field {
        "alpha" => Ok(weights.alpha),
        "beta" => Ok(weights.beta),
        "gamma" => Ok(weights.gamma),
        "delta" => Ok(weights.delta),
        _ => Err(anyhow!("Unknown configuration key: {}", key)),
    }
}

fn weight_field_mut<'a>(weights: &'a mut Weights, field: &str, key: &str) -> anyhow::Result<&'a mut f64> {
    match field {
        "alpha" => Ok(&mut weights.alpha),
        "beta" => Ok(&mut weights.beta),
        "gamma" => Ok(&mut weights.gamma),
        "delta" => Ok(&mut weights.delta),
        _ => Err(anyhow!("Unknown configuration key: {}", key)),
    }
}

fn parse_weight(key: &str, value: &str) -> anyhow::Result<f64> {
    let weight: f64 = value
        .parse()
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;
    if !weight.is_finite() {
        return Err(anyhow!("{} must be a finite number", key));
    }
    Ok(weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_ranking_defaults() {
        let config = Config::default();
        assert_eq!(config.ranking_config().unwrap(), RankingConfig::default());
        assert_eq!(config.default_mode().unwrap(), RoutingMode::Balanced);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(config.storage.feedback_log);
    }

    #[test]
    fn test_get_and_set_weights() {
        let mut config = Config::default();
        config.set("routing.alpha", "0.6").unwrap();
        assert_eq!(config.get("routing.alpha").unwrap(), "0.6");
        assert_eq!(config.ranking_config().unwrap().weights.alpha, 0.6);

        assert!(config.set("routing.beta", "heavy").is_err());
        assert!(config.set("routing.beta", "inf").is_err());
    }

    #[test]
    fn test_epsilon_range_is_enforced() {
        let mut config = Config::default();
        assert!(config.set("routing.epsilon", "1.5").is_err());
        assert!(config.set("routing.epsilon", "-0.1").is_err());
        config.set("routing.epsilon", "0.25").unwrap();
        assert_eq!(config.routing.epsilon, 0.25);
    }

    #[test]
    fn test_mode_weight_keys() {
        let mut config = Config::default();
        assert_eq!(config.get("routing.modes.cost.beta").unwrap(), "0.4");

        config.set("routing.modes.fast.gamma", "0.5").unwrap();
        let ranking = config.ranking_config().unwrap();
        assert_eq!(ranking.weights_for(RoutingMode::Fast).gamma, 0.5);

        assert!(config.set("routing.modes.balanced.alpha", "0.9").is_err());
        assert!(config.set("routing.modes.turbo.alpha", "0.9").is_err());
        assert!(config.set("routing.modes.cost.omega", "0.9").is_err());
    }

    #[test]
    fn test_default_mode_and_backend_validation() {
        let mut config = Config::default();
        config.set("routing.default_mode", "Quality").unwrap();
        assert_eq!(config.default_mode().unwrap(), RoutingMode::Quality);
        assert!(config.set("routing.default_mode", "turbo").is_err());

        config.set("storage.backend", "sqlite").unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.set("storage.backend", "postgres").is_err());
    }

    #[test]
    fn test_unknown_key() {
        let mut config = Config::default();
        let err = config.get("llm.model").unwrap_err();
        assert!(err.to_string().contains("modelmatch config list"));
        assert!(config.set("llm.model", "x").is_err());
    }

    #[test]
    fn test_list_contains_every_key() {
        let mut config = Config::default();
        config.set("storage.data_dir", "/tmp/modelmatch-test").unwrap();

        let entries = config.list().unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"routing.epsilon"));
        assert!(keys.contains(&"routing.modes.quality.delta"));
        assert_eq!(entries.len(), 9 + 3 * 4);

        let data_dir = entries.iter().find(|(k, _)| k == "storage.data_dir").unwrap();
        assert_eq!(data_dir.1, "/tmp/modelmatch-test");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("ROUTING_ALPHA", "0.7"), ("ROUTING_EPSILON", " 0 ")]);
        let mut config = Config::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.routing.alpha, 0.7);
        assert_eq!(config.routing.epsilon, 0.0);
        assert_eq!(config.routing.beta, 0.20);

        let bad: HashMap<&str, &str> = HashMap::from([("ROUTING_EPSILON", "2")]);
        let err = Config::default()
            .apply_overrides(|name| bad.get(name).map(|v| v.to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ROUTING_EPSILON"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("routing.delta", "0.2").unwrap();
        config.set("storage.backend", "sqlite").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[routing]\nepsilon = 0.1\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.routing.epsilon, 0.1);
        assert_eq!(loaded.routing.alpha, 0.55);
        assert_eq!(loaded.routing.modes.len(), 3);
        assert_eq!(loaded.storage, StorageConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[routing]\nepsilon = 3.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_metrics_path_follows_backend() {
        let mut config = Config::default();
        config.set("storage.data_dir", "/var/lib/modelmatch").unwrap();
        assert_eq!(
            config.metrics_path().unwrap(),
            PathBuf::from("/var/lib/modelmatch/metrics.json")
        );
        config.set("storage.backend", "sqlite").unwrap();
        assert_eq!(
            config.metrics_path().unwrap(),
            PathBuf::from("/var/lib/modelmatch/metrics.db")
        );
        assert_eq!(
            config.events_path().unwrap(),
            PathBuf::from("/var/lib/modelmatch/events.jsonl")
        );
    }

    #[tokio::test]
    async fn test_open_configured_backends() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config
            .set("storage.data_dir", &dir.path().display().to_string())
            .unwrap();

        let json = config.open_metrics_backend().await.unwrap();
        assert!(json.describe().ends_with("metrics.json"));

        config.set("storage.backend", "sqlite").unwrap();
        let sqlite = config.open_metrics_backend().await.unwrap();
        assert!(sqlite.describe().starts_with("sqlite:"));
        assert!(dir.path().join("metrics.db").exists());
    }
}
