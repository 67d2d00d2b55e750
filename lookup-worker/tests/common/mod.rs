#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lookup_common::handlers::{HandlerConfig, HandlerError, InputHandler, OutputHandler};
use lookup_common::input::InputItem;
use lookup_common::lookup::{Lookup, LookupError, LookupModule, LookupOutcome, RoutineFactory};
use lookup_common::registry::Registry;
use lookup_common::result::{AddressSetResult, ModuleData, Status};
use rand::Rng;
use tokio::sync::mpsc;

use lookup_worker::config::RunConfig;

pub const MOCK: &str = "mock";

/// Names starting with this prefix produce an outcome that must not be written.
pub const SUPPRESSED_PREFIX: &str = "skip.";

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}_{}", prefix, suffix)
}

pub fn lines<S: AsRef<str>>(names: &[S]) -> Vec<InputItem> {
    names
        .iter()
        .map(|name| InputItem::Line(name.as_ref().to_owned()))
        .collect()
}

/// Feeds a fixed list of items, remembering which input mode it was asked for.
pub struct MemoryInput {
    items: Vec<InputItem>,
    zonefile_input: Arc<AtomicBool>,
}

#[async_trait]
impl InputHandler for MemoryInput {
    async fn feed_channel(
        &mut self,
        items: mpsc::Sender<InputItem>,
        zonefile_input: bool,
    ) -> Result<(), HandlerError> {
        self.zonefile_input.store(zonefile_input, Ordering::SeqCst);
        for item in self.items.drain(..) {
            items
                .send(item)
                .await
                .map_err(|_| HandlerError::ChannelClosed("input"))?;
        }
        Ok(())
    }
}

/// Collects both output streams in memory.
#[derive(Clone, Default)]
pub struct MemoryOutput {
    pub primary: Arc<Mutex<Vec<String>>>,
    pub filtered: Arc<Mutex<Vec<String>>>,
    pub raw_sinks: Arc<AtomicUsize>,
    /// Fail as soon as the primary sink starts.
    pub fail_primary: bool,
}

impl MemoryOutput {
    pub fn primary(&self) -> Vec<String> {
        self.primary.lock().unwrap().clone()
    }

    pub fn primary_json(&self) -> Vec<serde_json::Value> {
        self.primary()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    pub fn filtered(&self) -> Vec<String> {
        self.filtered.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputHandler for MemoryOutput {
    async fn write_results(
        &self,
        mut results: mpsc::Receiver<String>,
        raw: bool,
    ) -> Result<(), HandlerError> {
        if raw {
            self.raw_sinks.fetch_add(1, Ordering::SeqCst);
        } else if self.fail_primary {
            return Err(HandlerError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "output is gone",
            )));
        }

        let sink = if raw { &self.filtered } else { &self.primary };
        while let Some(line) = results.recv().await {
            sink.lock().unwrap().push(line);
        }
        Ok(())
    }
}

/// Resolves names from a fixed table after a random delay.
#[derive(Clone, Default)]
pub struct MockModule {
    pub addresses: Arc<HashMap<String, AddressSetResult>>,
    pub max_delay_ms: u64,
    pub fail_factory_for: Option<usize>,
    pub zonefile_input: bool,
    pub lookups: Arc<AtomicUsize>,
    /// Refuse to build the lookup instance for the n-th item, counted from 1 across threads.
    pub fail_lookup_at: Option<usize>,
    pub instances: Arc<AtomicUsize>,
}

impl MockModule {
    pub fn new(addresses: &[(&str, &[&str], &[&str])]) -> Self {
        let addresses = addresses
            .iter()
            .map(|(name, v4, v6)| {
                (
                    name.to_string(),
                    AddressSetResult {
                        ipv4_addresses: v4.iter().map(|a| a.to_string()).collect(),
                        ipv6_addresses: v6.iter().map(|a| a.to_string()).collect(),
                    },
                )
            })
            .collect();

        Self {
            addresses: Arc::new(addresses),
            ..Default::default()
        }
    }

    pub fn max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

impl LookupModule for MockModule {
    fn zonefile_input(&self) -> bool {
        self.zonefile_input
    }

    fn make_routine_factory(
        &self,
        thread_id: usize,
    ) -> Result<Box<dyn RoutineFactory>, LookupError> {
        if self.fail_factory_for == Some(thread_id) {
            return Err(LookupError::RoutineFactory {
                thread_id,
                reason: "mock refused".to_owned(),
            });
        }
        Ok(Box::new(self.clone()))
    }
}

impl RoutineFactory for MockModule {
    fn make_lookup(&mut self) -> Result<Box<dyn Lookup>, LookupError> {
        let made = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_lookup_at == Some(made) {
            return Err(LookupError::Instance(format!("mock refused item {}", made)));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl Lookup for MockModule {
    async fn do_lookup(&mut self, name: &str) -> LookupOutcome {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.max_delay_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if name.starts_with(SUPPRESSED_PREFIX) {
            return LookupOutcome::new(Status::NoOutput);
        }

        match self.addresses.get(name) {
            Some(addresses) => LookupOutcome::new(Status::NoError)
                .data(ModuleData::AddressSet(addresses.clone())),
            None => LookupOutcome::new(Status::NxDomain).error("no such name"),
        }
    }
}

/// Everything a test needs to drive one run through the pipeline.
pub struct Harness {
    pub registry: Registry,
    pub output: MemoryOutput,
    pub zonefile_input: Arc<AtomicBool>,
}

impl Harness {
    pub fn new(module: MockModule, items: Vec<InputItem>) -> Self {
        Self::with_output(module, items, MemoryOutput::default())
    }

    pub fn with_output(module: MockModule, items: Vec<InputItem>, output: MemoryOutput) -> Self {
        let zonefile_input = Arc::new(AtomicBool::new(false));
        let mut registry = Registry::new();

        let seen_mode = zonefile_input.clone();
        registry.register_input_handler(MOCK, move |_: &HandlerConfig| {
            let handler: Box<dyn InputHandler> = Box::new(MemoryInput {
                items: items.clone(),
                zonefile_input: seen_mode.clone(),
            });
            Ok(handler)
        });

        let sink = output.clone();
        registry.register_output_handler(MOCK, move |_: &HandlerConfig| {
            let handler: Arc<dyn OutputHandler> = Arc::new(sink.clone());
            Ok(handler)
        });

        registry.register_module(MOCK, Arc::new(module));

        Self {
            registry,
            output,
            zonefile_input,
        }
    }
}

pub fn run_config(threads: usize) -> RunConfig {
    RunConfig {
        threads,
        module: MOCK.to_owned(),
        input_handler: MOCK.to_owned(),
        output_handler: MOCK.to_owned(),
        ..Default::default()
    }
}
