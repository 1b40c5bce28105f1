//! The keyed store behind all list queries.
//!
//! Entries are populated by fetch completion and marked stale by invalidation. Nothing is ever
//! evicted.
//!
//! ## Ordering
//! Every fetch takes a sequence number from a single counter when it is issued. A response is
//! only applied if its number is newer than the one of the response applied last for the same
//! key, so a slow response to an older request can never overwrite newer data.
//!
//! Invalidation records the newest sequence number issued so far. A response to a request
//! issued before that point may still replace the data, but the entry stays stale until a
//! request issued after the invalidation succeeds.

use std::collections::HashMap;

use serde_json::Value;

use coursereg_client::Error;

use crate::key::ResourceKey;
use crate::state::{QueryState, QueryStatus};

/// Handed out when a fetch starts, needed to complete it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    key: ResourceKey,
    seq: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

#[derive(Debug, Default)]
struct CacheEntry {
    state: QueryState<Value>,
    stale: bool,
    issued: u64,
    applied: u64,
    invalidated_at: u64,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.state.status == QueryStatus::Success && !self.stale
    }
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<ResourceKey, CacheEntry>,
    last_seq: u64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state for `key`, idle if it was never fetched.
    pub fn get(&self, key: &ResourceKey) -> QueryState<Value> {
        self.entries
            .get(key)
            .map(|entry| entry.state.clone())
            .unwrap_or_default()
    }

    /// The cached state, only if it can be served without a network read.
    pub fn get_fresh(&self, key: &ResourceKey) -> Option<QueryState<Value>> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.state.clone())
    }

    pub fn is_fresh(&self, key: &ResourceKey) -> bool {
        self.entries.get(key).is_some_and(CacheEntry::is_fresh)
    }

    pub fn is_stale(&self, key: &ResourceKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.stale)
    }

    /// Whether a request for `key` is still waiting for its response.
    pub fn is_fetching(&self, key: &ResourceKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.issued > entry.applied)
    }

    /// Register a new request for `key` and move its state to loading.
    pub fn begin_fetch(&mut self, key: &ResourceKey) -> FetchTicket {
        self.last_seq += 1;
        let seq = self.last_seq;

        let entry = self.entries.entry(key.clone()).or_default();
        entry.issued = seq;
        entry.state.status = QueryStatus::Loading;

        FetchTicket {
            key: key.clone(),
            seq,
        }
    }

    /// Apply the outcome of a request, unless a newer response was applied already.
    ///
    /// Returns whether the response was applied.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Value>, Error>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            log::warn!("dropping response for unknown query {}", ticket.key);
            return false;
        };

        if ticket.seq <= entry.applied {
            log::warn!(
                "discarding outdated response #{} for {} (applied #{})",
                ticket.seq,
                ticket.key,
                entry.applied
            );
            return false;
        }
        entry.applied = ticket.seq;

        match result {
            Ok(rows) => {
                log::debug!(
                    "query {} (#{}) returned {} rows",
                    ticket.key,
                    ticket.seq,
                    rows.len()
                );
                entry.state = QueryState {
                    status: QueryStatus::Success,
                    data: Some(rows),
                    error: None,
                };
                if ticket.seq > entry.invalidated_at {
                    entry.stale = false;
                }
            }
            Err(err) => {
                log::debug!("query {} (#{}) failed: {err}", ticket.key, ticket.seq);
                entry.state.status = QueryStatus::Error;
                entry.state.error = Some(err);
            }
        }

        true
    }

    /// Mark all entries cached under `name` as stale. Returns the number of affected entries.
    pub fn invalidate(&mut self, name: &str) -> usize {
        let mut count = 0;
        for (key, entry) in self.entries.iter_mut() {
            if key.matches(name) {
                entry.stale = true;
                entry.invalidated_at = self.last_seq;
                count += 1;
            }
        }
        log::debug!("invalidated {count} cached queries for '{name}'");
        count
    }
}
