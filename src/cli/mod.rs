//! CLI module for the News RAG Gateway
//!
//! Operational subcommands over the query pipeline:
//! - `query` / `chat`: ask a question, optionally inside a session
//! - `init-index` / `ingest`: prepare the vector collection and load articles
//! - `warm` / `stats` / `clear`: manage the content cache
//! - `health`: probe every backing service

pub mod cache;
pub mod index;
pub mod query;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::observability::init_metrics;
use crate::{App, create_app};

/// News RAG Gateway - question answering over a news corpus
#[derive(Parser)]
#[command(name = "news-rag-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the vector collection if it does not exist
    InitIndex,

    /// Embed and index articles from a JSON file
    Ingest(index::IngestArgs),

    /// Answer a question
    Query(query::QueryArgs),

    /// Send a chat message within a session
    Chat(query::ChatArgs),

    /// Pre-compute embeddings for anticipated queries
    Warm(cache::WarmArgs),

    /// Show cache key counts and collection info
    Stats,

    /// Remove cached entries
    Clear(cache::ClearArgs),

    /// Check connectivity of cache, embedding provider and vector index
    Health,
}

/// Loads configuration, wires the services and runs one command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let metrics = if cli.print_metrics {
        init_metrics()
    } else {
        None
    };

    let app = create_app(&config).await?;
    let result = dispatch(&app, cli.command).await;

    if let Some(metrics) = metrics {
        eprintln!("{}", metrics.render());
    }

    result
}

async fn dispatch(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::InitIndex => index::init(app).await,
        Command::Ingest(args) => index::ingest(app, args).await,
        Command::Query(args) => query::query(app, args).await,
        Command::Chat(args) => query::chat(app, args).await,
        Command::Warm(args) => cache::warm(app, args).await,
        Command::Stats => cache::stats(app).await,
        Command::Clear(args) => cache::clear(app, args).await,
        Command::Health => health(app).await,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthReport {
    cache: bool,
    embedding: bool,
    vector_index: bool,
}

async fn health(app: &App) -> anyhow::Result<()> {
    let (cache, embedding, vector_index) = tokio::join!(
        app.cache.health_check(),
        app.embeddings.health_check(),
        app.search.health_check(),
    );

    let report = HealthReport {
        cache,
        embedding,
        vector_index,
    };
    print_json(&report)?;

    if cache && embedding && vector_index {
        Ok(())
    } else {
        Err(anyhow::anyhow!("One or more services are unhealthy"))
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    debug!(bytes = json.len(), "Writing command output");
    println!("{}", json);
    Ok(())
}
