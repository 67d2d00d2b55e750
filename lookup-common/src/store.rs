//! Keyed set-union store on top of redis.
//!
//! Every key holds a JSON array of unique member strings, for example an address mapped
//! to every name that resolved to it. A missing key reads as the empty set.
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::handlers::HandlerError;
use crate::redis::{Client, CustomRedisError};
use crate::result::{LookupResult, StorePair};

/// How a member is folded into the stored set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Read the set, union in memory and write it back. Not atomic with respect to other
    /// writers of the same key: overlapping merges from separate processes can lose updates.
    ReadModifyWrite,
    /// Union on the server in a single step.
    Atomic,
}

/// Add `member` to `members` unless it is already present. Returns whether it was added.
pub fn union_member(members: &mut Vec<String>, member: &str) -> bool {
    if members.iter().any(|m| m == member) {
        return false;
    }
    members.push(member.to_owned());
    true
}

#[derive(Clone)]
pub struct DedupStore {
    client: Arc<dyn Client + Send + Sync>,
}

impl DedupStore {
    pub fn new(client: Arc<dyn Client + Send + Sync>) -> Self {
        Self { client }
    }

    /// The set stored under `key`, or the empty set when the key is absent.
    pub async fn members(&self, key: &str) -> Result<Vec<String>, CustomRedisError> {
        match self.client.get(key.to_owned()).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                CustomRedisError::ParseError(format!("stored value of {key} is not a list: {e}"))
            }),
            Err(CustomRedisError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn write_members(&self, key: &str, members: &[String]) -> Result<(), CustomRedisError> {
        let raw = serde_json::to_string(members)
            .map_err(|e| CustomRedisError::ParseError(e.to_string()))?;
        self.client.set(key.to_owned(), raw).await
    }

    /// Read-merge-write `member` into the set under `key`. Returns whether it was new.
    pub async fn merge(&self, key: &str, member: &str) -> Result<bool, CustomRedisError> {
        let mut members = self.members(key).await?;
        if !union_member(&mut members, member) {
            return Ok(false);
        }
        self.write_members(key, &members).await?;
        Ok(true)
    }

    /// Same union as `merge`, performed by the server in one step.
    pub async fn merge_atomic(&self, key: &str, member: &str) -> Result<bool, CustomRedisError> {
        self.client
            .add_json_member(key.to_owned(), member.to_owned())
            .await
    }

    pub async fn merge_with(
        &self,
        strategy: MergeStrategy,
        key: &str,
        member: &str,
    ) -> Result<bool, CustomRedisError> {
        match strategy {
            MergeStrategy::ReadModifyWrite => self.merge(key, member).await,
            MergeStrategy::Atomic => self.merge_atomic(key, member).await,
        }
    }
}

/// Sink that folds every result's (key, member) pairs into a `DedupStore`.
///
/// It consumes structured results rather than JSON lines so it sees the full payload.
/// All merges of a run go through the single task draining the channel, which rules out
/// lost updates between workers of the same run.
pub struct StoreOutputHandler {
    store: DedupStore,
    strategy: MergeStrategy,
}

impl StoreOutputHandler {
    pub fn new(store: DedupStore, strategy: MergeStrategy) -> Self {
        Self { store, strategy }
    }

    /// Drain `results` until the channel is closed. A storage failure ends the run.
    pub async fn write_results(
        &self,
        mut results: mpsc::Receiver<LookupResult>,
    ) -> Result<(), HandlerError> {
        while let Some(result) = results.recv().await {
            let pairs = match result.store_pairs() {
                Ok(pairs) => pairs,
                Err(e) => {
                    warn!(name = %result.name, "unable to parse result for the store: {}", e);
                    continue;
                }
            };

            for StorePair { key, member } in pairs {
                let added = self.store.merge_with(self.strategy, &key, &member).await?;
                debug!(%key, %member, added, "merged into store");
                metrics::counter!("store_merges_total", "added" => added.to_string())
                    .increment(1);
            }
        }

        Ok(())
    }
}
