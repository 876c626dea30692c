mod batch_processor;
mod decoder;
mod error;
mod fetcher;
mod persister;
pub mod ranges;
pub mod types;
mod worker_pool;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Instant;

use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use batch_processor::BatchProcessor;
pub use decoder::{
    decode_block, decode_event, DecodeError, DecodedEvent, EventKind, CLAIM_TAG,
    EXPECTED_ATTRIBUTES, MERGE_CLAIMS_RECORDS_TAG,
};
pub use error::Error;
pub use fetcher::{BlockFetcher, LedgerBlockFetcher};
pub use persister::EventStore;
pub use worker_pool::run_pool;

use crate::config::Config;
use crate::db::Store;
use crate::ledger_client::{AttributeEncoding, LedgerClient};
use types::{GlobalRateLimiter, HeightRange, PoolSettings, RunSummary};

/// Drives one extraction run: partition, fan out, join, report.
pub struct ExtractService<F> {
    store: Store,
    fetcher: Arc<F>,
    settings: PoolSettings,
    encoding: AttributeEncoding,
    cancel: CancellationToken,
}

impl ExtractService<LedgerBlockFetcher> {
    /// Opens the store (bootstrapping the schema) and builds the RPC fetcher.
    ///
    /// Every failure here is a fatal setup failure.
    pub async fn from_config(config: &Config) -> Result<Self, Error> {
        let store = Store::open(&config.db_url).await?;
        let client = LedgerClient::new(&config.ledger_rpc_url, config.ledger_timeout)?;
        let rate_limiter: Option<GlobalRateLimiter> = config
            .ledger_max_rps
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        info!(
            event = "extract_service_ready",
            database_url = %store.database_url(),
            ledger_rpc_url = %client.base_url(),
            ledger_max_rps = ?config.ledger_max_rps,
            ledger_timeout_secs = config.ledger_timeout.as_secs(),
            attribute_encoding = %config.attribute_encoding,
            "store bootstrapped and ledger client ready"
        );

        Ok(Self::new(
            store,
            LedgerBlockFetcher::new(client, rate_limiter),
            PoolSettings {
                batch_size: config.batch_size,
                max_workers: config.max_workers,
            },
            config.attribute_encoding,
        ))
    }
}

impl<F> ExtractService<F>
where
    F: BlockFetcher + 'static,
{
    pub fn new(
        store: Store,
        fetcher: F,
        settings: PoolSettings,
        encoding: AttributeEncoding,
    ) -> Self {
        Self {
            store,
            fetcher: Arc::new(fetcher),
            settings,
            encoding,
            cancel: CancellationToken::new(),
        }
    }

    /// Handle for stopping the run early. Batches already taken by a worker still finish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Extracts every height of `range`.
    ///
    /// Returns once all workers have drained the queue. Query, decode and persistence
    /// failures are logged and counted in the summary; only invalid settings or a worker
    /// that failed to join produce an `Err`.
    pub async fn run(&self, range: HeightRange) -> Result<RunSummary, Error> {
        if self.settings.batch_size < 1 {
            return Err(Error::InvalidSettings(format!(
                "batch_size must be at least 1, got {}",
                self.settings.batch_size
            )));
        }

        let started_at = Instant::now();
        let batches = ranges::partition(range, self.settings.batch_size);
        info!(
            event = "extraction_started",
            from_height = range.from(),
            to_height = range.to(),
            heights = range.height_count(),
            batches = batches.len(),
            batch_size = self.settings.batch_size,
            max_workers = self.settings.max_workers,
            "starting extraction"
        );

        let processor = Arc::new(BatchProcessor::new(
            self.fetcher.clone(),
            self.store.clone(),
            self.encoding,
        ));
        let summary = run_pool(
            processor,
            batches,
            self.settings.max_workers,
            self.cancel.clone(),
        )
        .await?;

        info!(
            event = "extraction_finished",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            batches_planned = summary.batches_planned,
            batches_processed = summary.batches_processed,
            batches_failed_to_persist = summary.batches_failed_to_persist,
            query_failures = summary.query_failures,
            merged_events = summary.merged_events,
            claim_events = summary.claim_events,
            cancelled = summary.cancelled,
            "work is done"
        );

        match self.store.table_counts().await {
            Ok(counts) => info!(
                event = "store_totals",
                merged_events = counts.merged_events,
                claim_events = counts.claim_events,
                error_heights = counts.error_heights,
                "store row counts"
            ),
            Err(err) => warn!(
                event = "store_totals_failed",
                error = %err,
                "could not read store row counts"
            ),
        }

        Ok(summary)
    }
}
