//! Echo addresses read from stdin, followed by the URLs hosted on each open address.
use anyhow::{Context, Result};
use envconfig::Envconfig;
use tokio::io::BufReader;

use lookup_worker::config::ToolConfig;
use lookup_worker::ip_join::join_ips;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = ToolConfig::init_from_env().context("invalid configuration")?;
    let store = config.store().context("failed to create redis client")?;

    join_ips(store, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    Ok(())
}
