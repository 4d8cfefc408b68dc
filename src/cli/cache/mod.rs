//! Cache maintenance commands

use clap::Args;
use serde_json::json;

use super::print_json;
use crate::App;
use crate::domain::cache::ClearScope;

/// Arguments for the warm command
#[derive(Args, Clone)]
pub struct WarmArgs {
    /// Texts to warm; the default popular queries when empty
    pub texts: Vec<String>,
}

/// Arguments for the clear command
#[derive(Args, Clone)]
pub struct ClearArgs {
    /// all, embeddings, queries or searches
    #[arg(default_value = "all")]
    pub scope: String,
}

pub async fn warm(app: &App, args: WarmArgs) -> anyhow::Result<()> {
    let warmed = app.embeddings.warm(&args.texts).await?;
    print_json(&json!({ "warmed": warmed }))
}

pub async fn stats(app: &App) -> anyhow::Result<()> {
    let (cache, collection) = tokio::join!(app.cache.stats(), app.search.collection_info());

    print_json(&json!({
        "cache": cache,
        "collection": collection,
    }))
}

pub async fn clear(app: &App, args: ClearArgs) -> anyhow::Result<()> {
    let scope: ClearScope = args.scope.parse()?;
    let removed = app.cache.clear(scope).await;

    print_json(&json!({
        "scope": scope.to_string(),
        "removed": removed,
    }))
}
