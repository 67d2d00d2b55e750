use std::sync::Arc;

use lookup_common::input::{InputItem, ZoneRecord};
use lookup_common::lookup::{LookupOutcome, RoutineFactory};
use lookup_common::metadata::RoutineMetadata;
use lookup_common::result::{LookupResult, OutputFilter};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::error::WorkerError;

/// The names derived from an input item before it is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedName {
    /// The original name, without any prefix.
    pub name: String,
    /// The name handed to the lookup module.
    pub lookup_name: String,
    pub altered_name: Option<String>,
    pub alexa_rank: Option<i64>,
    pub nameserver: Option<String>,
}

/// Split a `rank,name` line of a ranked list. The rank is a signed decimal integer with no
/// surrounding whitespace.
pub fn parse_alexa(line: &str) -> Result<(i64, &str), WorkerError> {
    let malformed = |reason: &str| WorkerError::MalformedRankedLine {
        line: line.to_owned(),
        reason: reason.to_owned(),
    };

    let (rank, name) = line
        .split_once(',')
        .ok_or_else(|| malformed("missing ',' separator"))?;
    let rank = rank
        .parse::<i64>()
        .map_err(|e| malformed(&e.to_string()))?;

    Ok((rank, name))
}

/// Apply the configured name prefix. Returns the name to look up and whether it changed.
pub fn make_name(name: &str, prefix: &str) -> (String, bool) {
    if prefix.is_empty() {
        (name.to_owned(), false)
    } else {
        (format!("{}{}", prefix, name), true)
    }
}

pub fn prepare_line(line: &str, config: &RunConfig) -> Result<PreparedName, WorkerError> {
    let (raw_name, alexa_rank) = if config.alexa {
        let (rank, name) = parse_alexa(line)?;
        (name, Some(rank))
    } else {
        (line, None)
    };

    let (lookup_name, changed) = make_name(raw_name, &config.name_prefix);

    Ok(PreparedName {
        name: raw_name.to_owned(),
        altered_name: changed.then(|| lookup_name.clone()),
        lookup_name,
        alexa_rank,
        nameserver: None,
    })
}

/// Derive names from a zone-file record. Records whose owner is empty once the trailing
/// dot is removed are skipped entirely.
pub fn prepare_zone_record(record: &ZoneRecord) -> Option<PreparedName> {
    let name = record.owner_name();
    if name.is_empty() {
        return None;
    }

    Some(PreparedName {
        name: name.to_owned(),
        lookup_name: name.to_owned(),
        altered_name: None,
        alexa_rank: None,
        nameserver: record.nameserver(),
    })
}

/// Build the result for a prepared name, or `None` when the outcome must be suppressed.
pub fn build_result(
    prepared: PreparedName,
    outcome: LookupOutcome,
    class: &str,
    timestamp: String,
) -> Option<LookupResult> {
    if outcome.status.is_suppressed() {
        return None;
    }

    Some(LookupResult {
        name: prepared.name,
        altered_name: prepared.altered_name,
        alexa_rank: prepared.alexa_rank,
        class: class.to_owned(),
        nameserver: prepared.nameserver,
        status: outcome.status,
        data: outcome.data,
        trace: outcome.trace,
        error: outcome.error,
        timestamp,
    })
}

/// Senders a worker writes to. Each worker owns a clone; a channel closes once every
/// worker and the pipeline have dropped theirs.
#[derive(Clone)]
pub struct WorkerChannels {
    pub json: mpsc::Sender<String>,
    pub filtered: Option<mpsc::Sender<String>>,
    pub results: Option<mpsc::Sender<LookupResult>>,
    pub metadata: mpsc::Sender<RoutineMetadata>,
}

/// One member of the pool. Pulls items off the shared input channel until it is closed.
pub struct LookupWorker {
    thread_id: usize,
    config: Arc<RunConfig>,
    factory: Box<dyn RoutineFactory>,
    channels: WorkerChannels,
    metadata: RoutineMetadata,
}

impl LookupWorker {
    pub fn new(
        thread_id: usize,
        factory: Box<dyn RoutineFactory>,
        config: Arc<RunConfig>,
        channels: WorkerChannels,
    ) -> Self {
        Self {
            thread_id,
            config,
            factory,
            channels,
            metadata: RoutineMetadata::new(),
        }
    }

    /// Process items until the input channel is closed and drained, then report this
    /// worker's statistics exactly once.
    pub async fn run(
        mut self,
        input: Arc<Mutex<mpsc::Receiver<InputItem>>>,
    ) -> Result<(), WorkerError> {
        loop {
            let item = {
                let mut input = input.lock().await;
                input.recv().await
            };

            match item {
                Some(item) => self.process(item).await?,
                None => break,
            }
        }

        debug!(
            thread_id = self.thread_id,
            names = self.metadata.names,
            "lookup worker finished"
        );

        self.channels
            .metadata
            .send(self.metadata)
            .await
            .map_err(|_| WorkerError::ChannelClosed("metadata"))
    }

    async fn process(&mut self, item: InputItem) -> Result<(), WorkerError> {
        let mut lookup = self.factory.make_lookup()?;
        let now = tokio::time::Instant::now();

        let (prepared, outcome) = match item {
            InputItem::Zone(record) => {
                let Some(prepared) = prepare_zone_record(&record) else {
                    return Ok(());
                };
                let outcome = lookup.do_zonefile_lookup(&record).await;
                (prepared, outcome)
            }
            InputItem::Line(line) => {
                let prepared = prepare_line(&line, &self.config)?;
                let outcome = lookup.do_lookup(&prepared.lookup_name).await;
                (prepared, outcome)
            }
        };

        let status = outcome.status;
        let labels = [("status", status.to_string())];
        metrics::histogram!("lookup_duration_seconds", &labels)
            .record(now.elapsed().as_secs_f64());

        let timestamp = self.config.time_format.now()?;
        if let Some(result) = build_result(prepared, outcome, &self.config.class, timestamp) {
            self.channels
                .emit(result, &self.config.output_filter)
                .await?;
        }

        self.metadata.record(status);
        metrics::counter!("lookup_results_total", &labels).increment(1);

        Ok(())
    }
}

impl WorkerChannels {
    /// Route one result: to the store sink when present, as a JSON line to the primary
    /// sink, and as its best single value to the filtered sink when it has one.
    async fn emit(&self, result: LookupResult, filter: &OutputFilter) -> Result<(), WorkerError> {
        let json = serde_json::to_string(&result)?;

        let best_value = match &self.filtered {
            Some(_) => match result.best_value(filter) {
                Ok(value) => value.map(str::to_owned),
                Err(e) => {
                    warn!(name = %result.name, "unable to filter result: {}", e);
                    None
                }
            },
            None => None,
        };

        if let Some(results) = &self.results {
            results
                .send(result)
                .await
                .map_err(|_| WorkerError::ChannelClosed("store"))?;
        }

        self.json
            .send(json)
            .await
            .map_err(|_| WorkerError::ChannelClosed("output"))?;

        if let (Some(filtered), Some(value)) = (&self.filtered, best_value) {
            filtered
                .send(value)
                .await
                .map_err(|_| WorkerError::ChannelClosed("filtered output"))?;
            metrics::counter!("lookup_filtered_total").increment(1);
        }

        Ok(())
    }
}
