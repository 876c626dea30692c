use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use futures::future::BoxFuture;

use crate::db::models::ErrorRecord;
use crate::db::StoreError;
use crate::ledger_client::{BlockResults, Event, EventAttribute, LedgerClientError, TxResult};

use super::fetcher::BlockFetcher;
use super::persister::EventStore;
use super::types::BatchEvents;

fn attribute(key: &str, value: &str) -> EventAttribute {
    let engine = base64::engine::general_purpose::STANDARD;
    EventAttribute {
        key: Some(engine.encode(key)),
        value: Some(engine.encode(value)),
        index: true,
    }
}

pub(crate) fn claim_event(height: i64) -> Event {
    Event {
        type_: "claim".to_string(),
        attributes: vec![
            attribute("sender", &format!("evmos1sender{height}")),
            attribute("amount", "30"),
            attribute("action", "ACTION_IBC_TRANSFER"),
        ],
    }
}

pub(crate) fn merged_event(height: i64) -> Event {
    Event {
        type_: "merge_claims_records".to_string(),
        attributes: vec![
            attribute("recipient", &format!("osmo1recipient{height}")),
            attribute("claimed_coins", "100aevmos"),
            attribute("fund_community_pool", "false"),
        ],
    }
}

/// Scripted ledger. Every height succeeds unless listed in `failing`.
///
/// Also measures how many fetches run at once, which bounds how many batches are in flight
/// because each worker queries its heights one at a time.
#[derive(Default)]
pub(crate) struct MockFetcher {
    claim_every_height: bool,
    merged_heights: HashSet<i64>,
    failing: HashSet<i64>,
    delay: Duration,
    call_counts: Mutex<HashMap<i64, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub(crate) fn empty_blocks() -> Self {
        Self::default()
    }

    /// Each height carries one `claim` event for that height.
    pub(crate) fn claims_everywhere() -> Self {
        Self {
            claim_every_height: true,
            ..Self::default()
        }
    }

    pub(crate) fn failing_at(mut self, heights: impl IntoIterator<Item = i64>) -> Self {
        self.failing.extend(heights);
        self
    }

    pub(crate) fn with_merged_at(mut self, heights: impl IntoIterator<Item = i64>) -> Self {
        self.merged_heights.extend(heights);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls_for(&self, height: i64) -> u32 {
        *self
            .call_counts
            .lock()
            .expect("call_count mutex poisoned")
            .get(&height)
            .unwrap_or(&0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.call_counts
            .lock()
            .expect("call_count mutex poisoned")
            .values()
            .sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn block_for(&self, height: i64) -> BlockResults {
        let mut events = Vec::new();
        if self.merged_heights.contains(&height) {
            events.push(merged_event(height));
        }
        if self.claim_every_height {
            events.push(claim_event(height));
        }
        BlockResults {
            height: height.to_string(),
            txs_results: vec![TxResult {
                events,
                ..TxResult::default()
            }],
        }
    }
}

impl BlockFetcher for MockFetcher {
    fn fetch_block<'a>(
        &'a self,
        height: i64,
    ) -> BoxFuture<'a, Result<BlockResults, LedgerClientError>> {
        Box::pin(async move {
            {
                let mut counts = self.call_counts.lock().expect("call_count mutex poisoned");
                *counts.entry(height).or_insert(0) += 1;
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&height) {
                return Err(LedgerClientError::Rpc {
                    height,
                    code: -32603,
                    message: format!("height {height} is not available"),
                });
            }
            Ok(self.block_for(height))
        })
    }
}

/// In-memory store recording every write. Event batches containing a height listed in
/// `failing_heights` are rejected whole.
#[derive(Default)]
pub(crate) struct RecordingStore {
    failing_heights: HashSet<i64>,
    fail_error_inserts: bool,
    persisted: Mutex<Vec<BatchEvents>>,
    errors: Mutex<Vec<i64>>,
    event_calls: AtomicUsize,
}

impl RecordingStore {
    pub(crate) fn failing_batches_containing(
        mut self,
        heights: impl IntoIterator<Item = i64>,
    ) -> Self {
        self.failing_heights.extend(heights);
        self
    }

    pub(crate) fn failing_error_inserts(mut self) -> Self {
        self.fail_error_inserts = true;
        self
    }

    pub(crate) fn persisted_batches(&self) -> Vec<BatchEvents> {
        self.persisted.lock().expect("persisted mutex poisoned").clone()
    }

    pub(crate) fn error_heights(&self) -> Vec<i64> {
        let mut heights = self.errors.lock().expect("errors mutex poisoned").clone();
        heights.sort_unstable();
        heights
    }

    pub(crate) fn persist_event_calls(&self) -> usize {
        self.event_calls.load(Ordering::SeqCst)
    }
}

impl EventStore for RecordingStore {
    fn persist_events<'a>(
        &'a self,
        events: &'a BatchEvents,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.event_calls.fetch_add(1, Ordering::SeqCst);
            let rejected = events
                .merged
                .iter()
                .map(|m| m.height)
                .chain(events.claims.iter().map(|c| c.height))
                .any(|height| self.failing_heights.contains(&height));
            if rejected {
                return Err(StoreError::DieselError(
                    diesel::result::Error::RollbackTransaction,
                ));
            }
            self.persisted
                .lock()
                .expect("persisted mutex poisoned")
                .push(events.clone());
            Ok(())
        })
    }

    fn persist_error<'a>(
        &'a self,
        record: &'a ErrorRecord,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            if self.fail_error_inserts {
                return Err(StoreError::DieselError(diesel::result::Error::NotFound));
            }
            self.errors
                .lock()
                .expect("errors mutex poisoned")
                .push(record.height);
            Ok(())
        })
    }
}
