//! Search index administration.
//!
//! ```text
//! search-index create
//! search-index delete --force
//! search-index rebuild
//! search-index update
//! ```

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use forum_server::application::search_service::SearchService;
use forum_server::data::post_repository::{PostRepository, PostgresPostRepository};
use forum_server::infrastructure::{
    config::AppConfig, database::create_pool, events::EventNotifier, logging::init_logging,
    search::ElasticsearchIndex,
};

#[derive(Parser)]
#[command(name = "search-index", about = "Manage the posts search index")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Required by `delete`.
    #[arg(long, global = true)]
    force: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create the index if it does not exist
    Create,
    /// Delete the index
    Delete,
    /// Delete, recreate and reindex every post
    Rebuild,
    /// Reindex every post into the existing index
    Update,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;

    let index = ElasticsearchIndex::new(&config.elasticsearch_url, &config.elasticsearch_index)
        .context("invalid Elasticsearch configuration")?;
    let index_name = index.index_name().to_string();
    let search = SearchService::new(Arc::new(index), EventNotifier::disabled());

    match cli.command {
        Command::Create => {
            search.create_index().await?;
            info!(index = %index_name, "index ready");
        }
        Command::Delete => {
            if !cli.force {
                bail!("refusing to delete index {index_name} without --force");
            }
            search.delete_index().await?;
            info!(index = %index_name, "index deleted");
        }
        Command::Rebuild => {
            search.delete_index().await?;
            search.create_index().await?;
            let count = reindex(&config, &search).await?;
            info!(index = %index_name, count, "index rebuilt");
        }
        Command::Update => {
            search.create_index().await?;
            let count = reindex(&config, &search).await?;
            info!(index = %index_name, count, "index updated");
        }
    }

    Ok(())
}

async fn reindex(config: &AppConfig, search: &SearchService) -> anyhow::Result<usize> {
    let pool = create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    let posts = PostgresPostRepository::new(pool)
        .list_all()
        .await
        .map_err(|err| anyhow::anyhow!("failed to load posts: {err}"))?;
    Ok(search.index_all(&posts).await?)
}
