//! The seam between the pipeline and a lookup module.
//!
//! A module hands every worker its own `RoutineFactory`, and the factory builds a fresh
//! `Lookup` for every item. Resolver state held by a lookup is therefore never shared
//! between concurrently running workers, and modules need no internal locking.
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::input::ZoneRecord;
use crate::result::{ModuleData, Status};

/// Enumeration of errors raised while constructing lookup machinery. All of them end the run.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("unable to create routine factory for thread {thread_id}: {reason}")]
    RoutineFactory { thread_id: usize, reason: String },
    #[error("unable to build lookup instance: {0}")]
    Instance(String),
}

/// What a lookup produced for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub data: Option<ModuleData>,
    pub trace: Option<Vec<Value>>,
    pub status: Status,
    pub error: Option<String>,
}

impl LookupOutcome {
    pub fn new(status: Status) -> Self {
        Self {
            data: None,
            trace: None,
            status,
            error: None,
        }
    }

    pub fn data(mut self, data: ModuleData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn error(mut self, error: &str) -> Self {
        self.error = Some(error.to_owned());
        self
    }

    /// Attach the intermediate steps a module recorded. An empty trace is dropped.
    pub fn trace(mut self, trace: Vec<Value>) -> Self {
        self.trace = if trace.is_empty() { None } else { Some(trace) };
        self
    }
}

/// A registered lookup module, shared by every worker of a run.
pub trait LookupModule: Send + Sync {
    /// Whether this module consumes zone-file records rather than names.
    fn zonefile_input(&self) -> bool {
        false
    }

    /// Called once per worker when the pool starts.
    fn make_routine_factory(&self, thread_id: usize)
        -> Result<Box<dyn RoutineFactory>, LookupError>;
}

/// Per-worker factory. Owned by exactly one worker.
pub trait RoutineFactory: Send {
    /// Called once per input item.
    fn make_lookup(&mut self) -> Result<Box<dyn Lookup>, LookupError>;
}

#[async_trait]
pub trait Lookup: Send {
    async fn do_lookup(&mut self, name: &str) -> LookupOutcome;

    async fn do_zonefile_lookup(&mut self, record: &ZoneRecord) -> LookupOutcome {
        LookupOutcome::new(Status::IllegalInput).error(&format!(
            "zone-file records are not supported by this module ({} {})",
            record.owner,
            record.record_type()
        ))
    }
}
