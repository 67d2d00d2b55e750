//! Look up every name read from the input handler and write one JSON result per name.
use std::sync::Arc;

use envconfig::Envconfig;
use tracing_subscriber::EnvFilter;

use lookup_common::metrics::start_metrics_server;
use lookup_common::redis::RedisClient;
use lookup_common::store::{DedupStore, StoreOutputHandler};
use lookup_worker::config::{Config, StoreConfig};
use lookup_worker::error::WorkerError;
use lookup_worker::{default_registry, pipeline::run_lookups};

fn build_store(config: &StoreConfig) -> Result<Option<StoreOutputHandler>, WorkerError> {
    let Some(url) = config.redis_url.as_deref().filter(|_| config.enabled()) else {
        return Ok(None);
    };

    let client = RedisClient::with_credentials(
        url,
        config.redis_password.clone(),
        config.redis_db,
        config.redis_timeout.0,
    )?;

    Ok(Some(StoreOutputHandler::new(
        DedupStore::new(Arc::new(client)),
        config.merge_strategy(),
    )))
}

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // Results go to stdout, so logs must not.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::init_from_env().expect("Invalid configuration:");
    let run_config = config.run_config()?;

    // The recorder must exist before the first worker records anything.
    if config.export_prometheus {
        let _recorder =
            start_metrics_server(config.bind()).expect("failed to install metrics recorder");
    }

    let store = build_store(&config.store)?;
    let registry = default_registry(&run_config);

    run_lookups(&registry, run_config, store).await?;

    Ok(())
}
