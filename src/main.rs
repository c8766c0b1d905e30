use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use torrent_aggregator::client::torznab::{diagnose, IndexerConfig};
use torrent_aggregator::client::{HttpClientConfig, HttpFetcher, Record};
use torrent_aggregator::config::LoggingSettings;
use torrent_aggregator::{Category, Config, SearchEngine, SourceRegistry};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "torrent-aggregator",
    about = "Search many torrent sites and Torznab indexers at once",
    version
)]
struct Cli {
    /// Configuration file (defaults to the per-user config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every eligible source
    Search {
        query: String,

        #[arg(short = 'C', long, default_value = "all")]
        category: Category,

        /// Only query these source ids (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Print one JSON record per line
        #[arg(long)]
        json: bool,
    },
    /// List the known sources
    Sources {
        #[arg(short = 'C', long, default_value = "all")]
        category: Category,
    },
    /// Print the effective configuration
    Config,
    /// Check the connection to a Torznab indexer
    Diagnose {
        #[arg(long)]
        url: String,

        #[arg(long, default_value = "")]
        api_key: String,
    },
}

fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if settings.is_json() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    let fetcher = HttpFetcher::new(&HttpClientConfig::from(&config.http))
        .context("Failed to build HTTP client")?;

    match cli.command {
        Command::Search {
            query,
            category,
            sources,
            json,
        } => search(&config, Arc::new(fetcher), &query, category, sources, json).await,
        Command::Sources { category } => {
            list_sources(&config, category);
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Diagnose { url, api_key } => {
            let indexer = IndexerConfig {
                id: "diagnose".to_string(),
                name: "Diagnose".to_string(),
                url,
                api_key,
                category: Category::All,
            };
            let status = diagnose(&indexer, &fetcher).await;
            println!("{status}");
            if status.is_established() {
                Ok(())
            } else {
                std::process::exit(1)
            }
        }
    }
}

fn enabled_sources(config: &Config, registry: &SourceRegistry) -> HashSet<String> {
    config
        .sources
        .enabled
        .clone()
        .unwrap_or_else(|| registry.default_enabled())
        .into_iter()
        .collect()
}

async fn search(
    config: &Config,
    fetcher: Arc<HttpFetcher>,
    query: &str,
    category: Category,
    sources: Vec<String>,
    json: bool,
) -> Result<()> {
    let registry = SourceRegistry::from_config(config);
    let enabled = if sources.is_empty() {
        enabled_sources(config, &registry)
    } else {
        for id in &sources {
            if registry.get(id).is_none() {
                warn!("Unknown source '{}'", id);
            }
        }
        sources.into_iter().collect()
    };

    let engine = SearchEngine::new(registry, fetcher);
    let mut session = engine.search(query, category, &enabled).await;
    info!("Querying {} sources", session.expected());

    let mut records: Vec<Record> = Vec::new();
    loop {
        tokio::select! {
            outcome = session.next() => {
                let Some(outcome) = outcome else { break };
                match outcome.result {
                    Ok(found) => {
                        eprintln!(
                            "{:<18} {:>4} results in {:.1}s",
                            outcome.source_name,
                            found.len(),
                            outcome.elapsed.as_secs_f64()
                        );
                        records.extend(found);
                    }
                    Err(e) => eprintln!("{:<18} failed: {}", outcome.source_name, e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                engine.cancel().await;
                eprintln!("Interrupted");
                break;
            }
        }
    }

    records.sort_by(|a, b| b.seeders.cmp(&a.seeders));
    for record in &records {
        if json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{}", format_row(record));
        }
    }
    Ok(())
}

/// Table line for one record, with the magnet URI indented underneath
fn format_row(record: &Record) -> String {
    format!(
        "{:>6} {:>6} {:>10} {:>10}  {:<14} {}\n{:>48}{}",
        record.seeders,
        record.peers,
        record.size,
        record.date,
        record.source_id,
        record.name,
        "",
        record.magnet_uri()
    )
}

fn list_sources(config: &Config, category: Category) {
    let registry = SourceRegistry::from_config(config);
    let enabled = enabled_sources(config, &registry);
    let eligible: HashSet<String> = registry
        .eligible(&enabled, category)
        .iter()
        .map(|provider| provider.id().to_string())
        .collect();

    for descriptor in registry.descriptors() {
        let marks = format!(
            "{}{}{}",
            if enabled.contains(&descriptor.id) { 'E' } else { '-' },
            if eligible.contains(&descriptor.id) { '*' } else { ' ' },
            if descriptor.safety.is_safe() { ' ' } else { '!' },
        );
        println!(
            "{marks} {:<18} {:<8} {}",
            descriptor.id, descriptor.category, descriptor.base_url
        );
    }
}
