use super::error::Error;
use crate::db::models::{ClaimEvent, MergedEvent};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::RateLimiter;
use std::sync::Arc;

/// Request budget shared by every worker's ledger fetcher.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Inclusive `[from, to]` height bounds of one extraction run.
///
/// Only constructible through `new`, so every value has `0 < from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightRange {
    from: i64,
    to: i64,
}

impl HeightRange {
    pub fn new(from: i64, to: i64) -> Result<Self, Error> {
        if from <= 0 {
            return Err(Error::InvalidRange(format!(
                "from height must be positive, got {from}"
            )));
        }
        if from > to {
            return Err(Error::InvalidRange(format!(
                "from height ({from}) must be <= to height ({to})"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> i64 {
        self.from
    }

    pub fn to(&self) -> i64 {
        self.to
    }

    /// Number of heights in the range. Never zero.
    pub fn height_count(&self) -> i64 {
        self.to - self.from + 1
    }
}

/// A contiguous `[start, end]` slice of the run, processed start-to-finish by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub start: i64,
    pub end: i64,
}

impl Batch {
    pub fn heights(&self) -> std::ops::RangeInclusive<i64> {
        self.start..=self.end
    }

    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Decoded records collected by one batch, in ascending height order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchEvents {
    pub merged: Vec<MergedEvent>,
    pub claims: Vec<ClaimEvent>,
}

impl BatchEvents {
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.claims.is_empty()
    }

    pub fn extend(&mut self, other: BatchEvents) {
        self.merged.extend(other.merged);
        self.claims.extend(other.claims);
    }
}

/// Knobs of the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Heights per batch. Every decoded record of a batch stays in memory until its
    /// transaction commits.
    pub batch_size: i64,
    /// Concurrent workers and job queue capacity.
    pub max_workers: usize,
}

/// What one batch produced, reported by the processor for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batch: Option<Batch>,
    pub heights_queried: usize,
    pub query_failures: usize,
    pub error_records_lost: usize,
    pub merged_events: usize,
    pub claim_events: usize,
    pub persisted: bool,
}

/// Totals across all workers of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub batches_planned: usize,
    pub batches_processed: usize,
    pub batches_failed_to_persist: usize,
    pub query_failures: usize,
    pub merged_events: usize,
    pub claim_events: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn absorb(&mut self, report: &BatchReport) {
        self.batches_processed += 1;
        if !report.persisted {
            self.batches_failed_to_persist += 1;
        }
        self.query_failures += report.query_failures;
        if report.persisted {
            self.merged_events += report.merged_events;
            self.claim_events += report.claim_events;
        }
    }

    pub(crate) fn merge(&mut self, other: RunSummary) {
        self.batches_processed += other.batches_processed;
        self.batches_failed_to_persist += other.batches_failed_to_persist;
        self.query_failures += other.query_failures;
        self.merged_events += other.merged_events;
        self.claim_events += other.claim_events;
    }
}
