//! Watchdog Agent: binary entrypoint.
//! Loads config, wires the pipeline, and dispatches CLI subcommands.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use watchdog_agent::config::{write_default_config, AgentConfig};
use watchdog_agent::daemon::{check_topics, spawn_signal_listener, Daemon, DaemonSettings};
use watchdog_agent::gate::{Signal, SystemGate};
use watchdog_agent::manager::{extract_action, TopicBook};
use watchdog_agent::notify::NotifierMux;
use watchdog_agent::topic::{closest_name, find_topic, Topic};
use watchdog_agent::{build_engine, telemetry, FingerprintCache};

#[derive(Debug, Parser)]
#[command(
    name = "watchdog-agent",
    version,
    about = "Monitors topics on the web and notifies you of updates"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "WATCHDOG_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run as background daemon
    Daemon,
    /// Run a single check, ignoring power/idle state
    Check {
        /// Specific topic to check
        #[arg(short, long)]
        topic: Option<String>,
    },
    /// List configured topics
    List,
    /// Create default config file
    Init,
    /// Show current status
    Status,
    /// Add a topic to the config file
    Add {
        name: String,
        #[arg(default_value = "")]
        description: String,
        /// Search query (repeatable)
        #[arg(short, long = "query")]
        queries: Vec<String>,
        /// URL to fetch directly (repeatable)
        #[arg(short, long = "url")]
        urls: Vec<String>,
        /// Check interval in hours
        #[arg(short, long)]
        interval: Option<u32>,
    },
    /// Remove a topic from the config file
    Remove { name: String },
    /// Apply the topic action embedded in an assistant reply read from stdin
    Apply,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    telemetry::init_tracing(cli.verbose, cli.json_logs);

    let cfg = AgentConfig::load(cli.config.as_deref());

    match cli.command.unwrap_or(Command::Daemon) {
        Command::Daemon => run_daemon(cfg).await,
        Command::Check { topic } => run_once(&cfg, topic.as_deref()).await,
        Command::List => {
            list_topics(&cfg.topics);
            Ok(())
        }
        Command::Init => {
            write_default_config(&cfg.config_path)?;
            println!("Created config: {}", cfg.config_path.display());
            Ok(())
        }
        Command::Status => status(&cfg).await,
        Command::Add {
            name,
            description,
            queries,
            urls,
            interval,
        } => {
            let topic = Topic::new(name, description)
                .with_queries(queries)
                .with_urls(urls)
                .with_interval_hours(interval.unwrap_or(cfg.default_check_interval_hours));
            let mut book = TopicBook::open(&cfg.config_path)?;
            println!("{}", book.add(topic)?);
            Ok(())
        }
        Command::Remove { name } => {
            let mut book = TopicBook::open(&cfg.config_path)?;
            println!("{}", book.remove(&name)?);
            Ok(())
        }
        Command::Apply => {
            let mut reply = String::new();
            std::io::stdin()
                .read_to_string(&mut reply)
                .context("reading reply from stdin")?;
            let Some(action) = extract_action(&reply) else {
                bail!("no topic action found in input");
            };
            let mut book = TopicBook::open(&cfg.config_path)?;
            println!("{}", book.apply(action)?);
            Ok(())
        }
    }
}

async fn run_daemon(cfg: AgentConfig) -> Result<()> {
    cfg.validate_for_run()?;
    if let Some(addr) = cfg.metrics_listen {
        telemetry::install_prometheus(addr)?;
    }

    let engine = build_engine(&cfg)?;
    let notifier = NotifierMux::from_env();
    let mut daemon = Daemon::new(DaemonSettings::from(&cfg), engine, SystemGate::linux(), notifier);

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());
    daemon.run(shutdown).await;
    Ok(())
}

async fn run_once(cfg: &AgentConfig, topic_name: Option<&str>) -> Result<()> {
    cfg.validate_for_run()?;

    let topics: Vec<Topic> = match topic_name {
        None => cfg.topics.clone(),
        Some(name) => match find_topic(&cfg.topics, name) {
            Some(t) => vec![t.clone()],
            None => match closest_name(&cfg.topics, name) {
                Some(hint) => bail!("topic not found: {name} (did you mean '{hint}'?)"),
                None => bail!("topic not found: {name}"),
            },
        },
    };

    let engine = build_engine(cfg)?;
    for verdict in check_topics(&engine, &topics).await {
        println!("\nChecking: {}", verdict.topic_name);
        if verdict.has_update {
            println!("UPDATE FOUND!");
        } else {
            println!("No significant updates");
        }
        println!("Summary: {}", verdict.summary);
        println!("Confidence: {:.0}%", verdict.confidence * 100.0);
        if let Some(url) = &verdict.source_url {
            println!("Source: {url}");
        }
    }
    Ok(())
}

fn list_topics(topics: &[Topic]) {
    if topics.is_empty() {
        println!("No topics configured");
        return;
    }
    let width = topics.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    println!("{:<width$}  {:>8}  {:>7}", "Name", "Interval", "Queries");
    for t in topics {
        println!(
            "{:<width$}  {:>8}  {:>7}",
            t.name,
            format!("{}h", t.check_interval_hours),
            t.search_queries.len()
        );
    }
}

async fn status(cfg: &AgentConfig) -> Result<()> {
    println!("Config file: {}", cfg.config_path.display());
    println!("Cache dir: {}", cfg.cache_dir.display());
    println!("Topics: {}", cfg.topics.len());
    let power = match SystemGate::linux().power_signal() {
        Signal::Available(true) => "Connected",
        Signal::Available(false) => "Battery",
        Signal::Unavailable => "Unknown",
    };
    println!("AC power: {power}");
    println!(
        "Oracle: {:?} (API key {})",
        cfg.oracle_provider,
        if cfg.api_key().is_some() { "set" } else { "not set" }
    );

    let cache = FingerprintCache::new(&cfg.cache_dir);
    for topic in &cfg.topics {
        match cache.load(&topic.name).await {
            Some(entry) => {
                let when = entry
                    .last_checked_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  {}: last checked {when}", topic.name);
                if !entry.last_summary.is_empty() {
                    println!("    {}", entry.last_summary);
                }
            }
            None => println!("  {}: never checked", topic.name),
        }
    }
    Ok(())
}
