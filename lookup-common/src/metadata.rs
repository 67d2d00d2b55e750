use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::result::Status;

/// Statistics of a single worker. Owned by that worker and sent once when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutineMetadata {
    pub names: usize,
    pub status: HashMap<Status, usize>,
}

impl RoutineMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, status: Status) {
        self.names += 1;
        *self.status.entry(status).or_default() += 1;
    }
}

/// Summary of a whole run, written to the metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    pub names: usize,
    pub status: BTreeMap<String, usize>,
    pub start_time: String,
    pub end_time: String,
    pub name_servers: Vec<String>,
    pub retries: u32,
    /// Seconds.
    pub timeout: u64,
    pub conf: Value,
}

impl Metadata {
    pub fn absorb(&mut self, routine: RoutineMetadata) {
        self.names += routine.names;
        for (status, count) in routine.status {
            *self.status.entry(status.to_string()).or_default() += count;
        }
    }

    pub fn status_total(&self) -> usize {
        self.status.values().sum()
    }
}

/// Drain `routines` until every sender is gone and sum what arrived.
pub async fn aggregate_metadata(mut routines: mpsc::Receiver<RoutineMetadata>) -> Metadata {
    let mut metadata = Metadata::default();
    while let Some(routine) = routines.recv().await {
        metadata.absorb(routine);
    }
    metadata
}
