//! Wiring of a lookup run: input feeder, worker pool and output sinks.
//!
//! Shutdown happens in a fixed order. Every worker finishes (and has sent its statistics)
//! before the pipeline drops its own senders, which is what closes the output channels.
//! Workers hold the remaining senders, so no channel can close while a send is possible.
//! Only after every sink has drained its channel is the run summary computed.
use std::sync::Arc;

use lookup_common::handlers::HandlerError;
use lookup_common::metadata::{aggregate_metadata, Metadata};
use lookup_common::registry::Registry;
use lookup_common::store::StoreOutputHandler;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::RunConfig;
use crate::error::WorkerError;
use crate::worker::{LookupWorker, WorkerChannels};

/// Capacity of the input and output channels. Kept minimal so a slow side exerts
/// backpressure on the other rather than buffering.
const CHANNEL_CAPACITY: usize = 1;

/// Run every input item through the configured lookup module and write the results.
///
/// Returns the aggregated statistics of the run, which are also written to the metadata
/// file when one is configured. Any setup, I/O or serialization failure ends the whole
/// run; failures of individual lookups only show up in the results.
pub async fn run_lookups(
    registry: &Registry,
    config: RunConfig,
    store: Option<StoreOutputHandler>,
) -> Result<Metadata, WorkerError> {
    let config = Arc::new(config);
    if config.threads == 0 {
        return Err(WorkerError::InvalidConfig(
            "at least one worker thread is required".to_owned(),
        ));
    }

    let module = registry.module(&config.module)?;
    let handler_config = config.handler_config();
    let mut input_handler = registry.input_handler(&config.input_handler)?(&handler_config)?;
    let output_handler = registry.output_handler(&config.output_handler)?(&handler_config)?;
    let zonefile_input = config.zonefile_input || module.zonefile_input();

    let factories = (0..config.threads)
        .map(|thread_id| module.make_routine_factory(thread_id))
        .collect::<Result<Vec<_>, _>>()?;

    let (input_tx, input_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (json_tx, json_rx) = mpsc::channel(CHANNEL_CAPACITY);
    // One slot per worker, so no worker ever blocks delivering its statistics.
    let (metadata_tx, metadata_rx) = mpsc::channel(config.threads);

    let feeder =
        tokio::spawn(async move { input_handler.feed_channel(input_tx, zonefile_input).await });

    let mut sinks: JoinSet<Result<(), HandlerError>> = JoinSet::new();

    let primary = output_handler.clone();
    sinks.spawn(async move { primary.write_results(json_rx, false).await });

    let filtered_tx = if config.output_filter.is_empty() {
        None
    } else {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let filtered = output_handler.clone();
        sinks.spawn(async move { filtered.write_results(rx, true).await });
        Some(tx)
    };

    let results_tx = store.map(|store| {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        sinks.spawn(async move { store.write_results(rx).await });
        tx
    });

    let channels = WorkerChannels {
        json: json_tx,
        filtered: filtered_tx,
        results: results_tx,
        metadata: metadata_tx,
    };

    let start_time = config.time_format.now()?;
    info!(
        threads = config.threads,
        module = %config.module,
        zonefile_input,
        "starting lookups"
    );

    let input = Arc::new(Mutex::new(input_rx));
    let mut workers = JoinSet::new();
    for (thread_id, factory) in factories.into_iter().enumerate() {
        let worker = LookupWorker::new(thread_id, factory, config.clone(), channels.clone());
        workers.spawn(worker.run(input.clone()));
    }
    drop(input);

    let workers_result = join_workers(&mut workers).await;
    if workers_result.is_err() {
        feeder.abort();
    }

    // Every worker is gone, so these are the last senders: dropping them closes the
    // output and statistics channels.
    drop(channels);

    let feeder_result = match feeder.await {
        Ok(result) => result.map_err(WorkerError::from),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(WorkerError::from(e)),
    };
    let sinks_result = join_sinks(&mut sinks).await;

    // A failing sink makes workers see a closed channel; report the sink's own error.
    sinks_result?;
    workers_result?;
    feeder_result?;

    let mut metadata = aggregate_metadata(metadata_rx).await;
    metadata.start_time = start_time;
    metadata.end_time = config.time_format.now()?;
    metadata.name_servers = config.name_servers.clone();
    metadata.retries = config.retries;
    metadata.timeout = config.timeout.as_secs();
    metadata.conf = serde_json::to_value(config.as_ref())?;

    info!(names = metadata.names, "lookups finished");

    if let Some(path) = &config.metadata_file {
        write_metadata(path, &metadata).await?;
    }

    Ok(metadata)
}

/// Wait for every worker. On the first failure the rest of the pool is aborted.
async fn join_workers(workers: &mut JoinSet<Result<(), WorkerError>>) -> Result<(), WorkerError> {
    let mut outcome = Ok(());

    while let Some(joined) = workers.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => continue,
            Err(e) => Err(WorkerError::from(e)),
        };

        if let Err(e) = result {
            if outcome.is_ok() {
                error!("lookup worker failed: {}", e);
                workers.abort_all();
                outcome = Err(e);
            }
        }
    }

    outcome
}

/// Wait for every sink to drain its channel, keeping the first failure.
async fn join_sinks(sinks: &mut JoinSet<Result<(), HandlerError>>) -> Result<(), WorkerError> {
    let mut outcome = Ok(());

    while let Some(joined) = sinks.join_next().await {
        let result = match joined {
            Ok(result) => result.map_err(WorkerError::from),
            Err(e) => Err(WorkerError::from(e)),
        };

        if let Err(e) = result {
            error!("output sink failed: {}", e);
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }

    outcome
}

/// Write the run summary to `path`, or to stderr when `path` is `-`.
pub async fn write_metadata(path: &str, metadata: &Metadata) -> Result<(), WorkerError> {
    let mut json = serde_json::to_string(metadata)?;
    json.push('\n');

    let written = if path == "-" {
        let mut stderr = tokio::io::stderr();
        match stderr.write_all(json.as_bytes()).await {
            Ok(()) => stderr.flush().await,
            Err(e) => Err(e),
        }
    } else {
        tokio::fs::write(path, json).await
    };

    written.map_err(|error| WorkerError::MetadataWrite {
        path: path.to_owned(),
        error,
    })
}
