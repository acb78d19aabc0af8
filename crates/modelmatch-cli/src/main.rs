//! ModelMatch CLI - evidence-weighted LLM routing

use clap::{Parser, Subcommand};
use modelmatch_core::classifier::{KeywordClassifier, TaskClassifier};
use modelmatch_core::config::Config;
use modelmatch_core::error::Error;
use modelmatch_core::feedback::{Feedback, FeedbackLog, clamp_rating};
use modelmatch_core::metrics::MetricsStore;
use modelmatch_core::routing::{ModelCatalog, RankingEngine, RoutingMode};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "modelmatch")]
#[command(author, version, about = "Evidence-weighted LLM routing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a prompt into a task type
    Classify {
        /// Prompt text
        prompt: String,
    },

    /// Rank candidate models for a task
    Rank {
        /// Task type (code, reasoning, summarization, search-heavy, general)
        #[arg(short, long)]
        task: String,
        /// Routing mode (balanced, quality, cost, fast); defaults to routing.default_mode
        #[arg(short, long)]
        mode: Option<String>,
        /// JSON file with a search payload ({"results": [...]})
        #[arg(short, long)]
        search: Option<PathBuf>,
        /// Seed for the exploration draw
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Record an execution of a model
    Select {
        /// Model identifier
        model: String,
        /// Observed latency in milliseconds
        #[arg(long)]
        latency_ms: f64,
        /// Cost estimate of the call (defaults to the model's static cost)
        #[arg(long)]
        cost: Option<f64>,
    },

    /// Rate a model's output
    Feedback {
        /// Model identifier
        model: String,
        /// Rating; positive counts as a win, negative as a loss
        #[arg(allow_negative_numbers = true)]
        rating: i64,
        /// Free-form note stored in the feedback log
        #[arg(short, long, default_value = "")]
        note: String,
    },

    /// Show per-model metrics
    Metrics,

    /// Show recent feedback events
    History {
        /// Number of events to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("modelmatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify { prompt } => cmd_classify(&prompt, cli.format),

        Commands::Rank {
            task,
            mode,
            search,
            seed,
        } => {
            cmd_rank(
                &task,
                mode.as_deref(),
                search.as_deref(),
                seed,
                cli.format,
                cli.quiet,
            )
            .await
        }

        Commands::Select {
            model,
            latency_ms,
            cost,
        } => cmd_select(&model, latency_ms, cost, cli.format, cli.quiet).await,

        Commands::Feedback {
            model,
            rating,
            note,
        } => cmd_feedback(&model, rating, &note, cli.format, cli.quiet).await,

        Commands::Metrics => cmd_metrics(cli.format).await,

        Commands::History { limit } => cmd_history(limit, cli.format).await,

        Commands::Config { action } => cmd_config(action, cli.quiet),
    };

    if let Err(e) = &result
        && let Some(hint) = e.downcast_ref::<Error>().and_then(Error::suggestion)
    {
        eprintln!("Hint: {}", hint);
    }
    result
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<MetricsStore>> {
    let backend = config.open_metrics_backend().await?;
    info!(backend = %backend.describe(), "Opened metrics store");
    Ok(Arc::new(MetricsStore::new(backend)))
}

fn read_search_payload(path: &Path) -> anyhow::Result<Value> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read search payload {}: {}", path.display(), e))?;
    let payload = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Search payload {} is not valid JSON: {}", path.display(), e))?;
    Ok(payload)
}

fn cmd_classify(prompt: &str, format: OutputFormat) -> anyhow::Result<()> {
    let profile = KeywordClassifier::new().classify(prompt);
    let query = profile.task_type.search_query();

    match format {
        OutputFormat::Json => print_json(&json!({
            "task_type": profile.task_type,
            "length": profile.length,
            "difficulty": profile.difficulty,
            "search_query": query,
        })),
        OutputFormat::Text => {
            println!("Task type:    {}", profile.task_type);
            println!("Length:       {:?}", profile.length);
            println!("Difficulty:   {:?}", profile.difficulty);
            println!("Search query: {}", query);
            Ok(())
        }
    }
}

async fn cmd_rank(
    task: &str,
    mode: Option<&str>,
    search: Option<&Path>,
    seed: Option<u64>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let mode: RoutingMode = match mode {
        Some(m) => m.parse()?,
        None => config.default_mode()?,
    };
    let payload = match search {
        Some(path) => read_search_payload(path)?,
        None => json!({"results": []}),
    };

    let store = open_store(&config).await?;
    let mut engine = RankingEngine::with_config(store, config.ranking_config()?);
    if let Some(seed) = seed {
        engine = engine.with_seed(seed);
    }

    let ranking = engine.rank(task, &payload, mode).await?;
    debug!(task = %task, candidates = ranking.len(), "Ranking complete");

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&ranking)?),
        OutputFormat::Text => {
            if quiet {
                if let Some(top) = ranking.top() {
                    println!("{}", top.model);
                }
                return Ok(());
            }
            println!("Ranking for '{}' ({} mode):", ranking.task_type, ranking.mode);
            for (i, candidate) in ranking.candidates.iter().enumerate() {
                println!("  {}. {:<14} {:.4}", i + 1, candidate.model, candidate.score);
            }
            if ranking.explored {
                println!("  (exploring: top two swapped)");
            }
            Ok(())
        }
    }
}

async fn cmd_select(
    model: &str,
    latency_ms: f64,
    cost: Option<f64>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config).await?;
    let cost = cost.unwrap_or_else(|| ModelCatalog::with_defaults().estimated_call_cost(model));

    let metrics = store.record_selection(model, latency_ms, cost).await?;

    match format {
        OutputFormat::Json => print_json(&json!({ "model": model, "metrics": metrics })),
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "Recorded {}: avg latency {:.1} ms, avg cost {:.6}",
                    model, metrics.avg_latency_ms, metrics.avg_cost
                );
            }
            Ok(())
        }
    }
}

async fn cmd_feedback(
    model: &str,
    rating: i64,
    note: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config).await?;
    let rating = clamp_rating(rating);

    let metrics = store.record_feedback(model, rating).await?;
    if config.storage.feedback_log {
        let log = FeedbackLog::new(config.events_path()?);
        if let Err(e) = log.append(Feedback::new(model, rating, note)).await {
            warn!(model = %model, error = %e, "Failed to append feedback event");
        }
    }

    match format {
        OutputFormat::Json => print_json(&json!({ "model": model, "metrics": metrics })),
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "Recorded feedback for {}: wins {}, losses {}, thumbs {}",
                    model, metrics.wins, metrics.losses, metrics.thumbs
                );
            }
            Ok(())
        }
    }
}

async fn cmd_metrics(format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config).await?;
    let snapshot = store.load().await;

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&snapshot)?),
        OutputFormat::Text => {
            println!(
                "{:<14} {:>5} {:>6} {:>6} {:>10} {:>10}",
                "MODEL", "WINS", "LOSSES", "THUMBS", "LATENCY", "COST"
            );
            for (model, m) in &snapshot {
                println!(
                    "{:<14} {:>5} {:>6} {:>6} {:>10.1} {:>10.6}",
                    model, m.wins, m.losses, m.thumbs, m.avg_latency_ms, m.avg_cost
                );
            }
            Ok(())
        }
    }
}

async fn cmd_history(limit: usize, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let events = FeedbackLog::new(config.events_path()?).recent(limit).await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::to_value(&events)?),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("(No feedback recorded yet)");
            }
            for event in &events {
                let note = if event.feedback.note.is_empty() {
                    String::new()
                } else {
                    format!("  \"{}\"", event.feedback.note)
                };
                println!(
                    "{}  {:<14} {:+}{}",
                    event.ts.format("%Y-%m-%d %H:%M:%S"),
                    event.feedback.chosen,
                    event.feedback.rating,
                    note
                );
            }
            Ok(())
        }
    }
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rank_args() {
        let cli = Cli::try_parse_from([
            "modelmatch", "rank", "--task", "code", "--mode", "cost", "--seed", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Rank {
                task, mode, seed, ..
            } => {
                assert_eq!(task, "code");
                assert_eq!(mode.as_deref(), Some("cost"));
                assert_eq!(seed, Some(3));
            }
            _ => panic!("expected rank"),
        }
    }

    #[test]
    fn test_feedback_accepts_negative_rating() {
        let cli = Cli::try_parse_from(["modelmatch", "feedback", "you-pro", "-1"]).unwrap();
        match cli.command {
            Commands::Feedback { model, rating, note } => {
                assert_eq!(model, "you-pro");
                assert_eq!(rating, -1);
                assert!(note.is_empty());
            }
            _ => panic!("expected feedback"),
        }
    }

    #[test]
    fn test_global_format_flag() {
        let cli = Cli::try_parse_from(["modelmatch", "metrics", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_select_requires_latency() {
        assert!(Cli::try_parse_from(["modelmatch", "select", "you-pro"]).is_err());
    }
}
