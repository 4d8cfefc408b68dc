//! Vector collection setup and article ingestion

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tracing::info;

use super::print_json;
use crate::App;
use crate::infrastructure::services::{IngestionService, parse_articles};

/// Arguments for the ingest command
#[derive(Args, Clone)]
pub struct IngestArgs {
    /// JSON file holding an array of articles (or `{"articles": [...]}`)
    pub file: PathBuf,

    /// Articles embedded per provider call
    #[arg(long)]
    pub batch_size: Option<usize>,
}

pub async fn init(app: &App) -> anyhow::Result<()> {
    let created = app.search.initialize().await?;
    let info = app.search.collection_info().await;

    print_json(&json!({
        "collection": app.search.collection().name,
        "created": created,
        "info": info,
    }))
}

pub async fn ingest(app: &App, args: IngestArgs) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&args.file).await?;
    let articles = parse_articles(&raw)?;
    info!(file = %args.file.display(), count = articles.len(), "Loaded articles");

    app.search.initialize().await?;

    let ingestion = match args.batch_size {
        Some(size) => Arc::new(
            IngestionService::new(app.embeddings.clone(), app.search.clone())
                .with_batch_size(size),
        ),
        None => app.ingestion.clone(),
    };
    let report = ingestion.ingest(articles).await?;

    print_json(&report)
}
