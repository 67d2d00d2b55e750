//! Read URLs from stdin and record each one under its host in the store.
use anyhow::{Context, Result};
use envconfig::Envconfig;
use tokio::io::BufReader;

use lookup_worker::config::ToolConfig;
use lookup_worker::url_store::store_urls;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = ToolConfig::init_from_env().context("invalid configuration")?;
    let store = config.store().context("failed to create redis client")?;

    let stored = store_urls(
        &store,
        config.merge_strategy(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    tracing::info!(stored, "finished storing urls");
    Ok(())
}
