use tracing::{debug, error, info, warn};

use crate::db::models::ErrorRecord;
use crate::ledger_client::AttributeEncoding;

use super::decoder::decode_block;
use super::fetcher::BlockFetcher;
use super::persister::EventStore;
use super::types::{Batch, BatchEvents, BatchReport};

/// Runs one batch start-to-finish: sequential queries, decoding, then one persist call.
pub struct BatchProcessor<F, S> {
    fetcher: F,
    store: S,
    encoding: AttributeEncoding,
}

impl<F, S> BatchProcessor<F, S>
where
    F: BlockFetcher,
    S: EventStore,
{
    pub fn new(fetcher: F, store: S, encoding: AttributeEncoding) -> Self {
        Self {
            fetcher,
            store,
            encoding,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queries every height of `batch` in ascending order and accumulates decoded events.
    ///
    /// A failed query produces an error record, persisted right away in its own transaction,
    /// and the loop moves on to the next height.
    pub async fn collect_batch(&self, batch: Batch) -> (BatchEvents, BatchReport) {
        let mut events = BatchEvents::default();
        let mut report = BatchReport {
            batch: Some(batch),
            ..BatchReport::default()
        };

        for height in batch.heights() {
            report.heights_queried += 1;
            match self.fetcher.fetch_block(height).await {
                Ok(block) => {
                    let decoded = decode_block(&block.txs_results, height, self.encoding);
                    if !decoded.is_empty() {
                        debug!(
                            event = "height_decoded",
                            height,
                            merged_events = decoded.merged.len(),
                            claim_events = decoded.claims.len(),
                            "decoded block events"
                        );
                    }
                    events.extend(decoded);
                }
                Err(err) => {
                    report.query_failures += 1;
                    if let Err(store_err) = self.store.persist_error(&ErrorRecord { height }).await
                    {
                        report.error_records_lost += 1;
                        error!(
                            event = "error_record_persist_failed",
                            height,
                            error = %store_err,
                            "error inserting error value into the store"
                        );
                    }
                    warn!(
                        event = "block_query_failed",
                        height,
                        error = %err,
                        "error querying ledger"
                    );
                }
            }
        }

        report.merged_events = events.merged.len();
        report.claim_events = events.claims.len();
        (events, report)
    }

    /// Collects and persists one batch. Persistence failures are logged and reported, never
    /// propagated, so the calling worker keeps going.
    pub async fn run_batch(&self, worker_idx: usize, batch: Batch) -> BatchReport {
        info!(
            event = "batch_started",
            worker = worker_idx,
            start = batch.start,
            end = batch.end,
            "starting batch"
        );

        let (events, mut report) = self.collect_batch(batch).await;

        if events.is_empty() {
            report.persisted = true;
        } else {
            match self.store.persist_events(&events).await {
                Ok(()) => report.persisted = true,
                Err(err) => {
                    error!(
                        event = "batch_persist_failed",
                        worker = worker_idx,
                        start = batch.start,
                        end = batch.end,
                        merged_events = report.merged_events,
                        claim_events = report.claim_events,
                        error = %err,
                        "error inserting batch into the store; batch records dropped"
                    );
                }
            }
        }

        info!(
            event = "batch_finished",
            worker = worker_idx,
            start = batch.start,
            end = batch.end,
            query_failures = report.query_failures,
            merged_events = report.merged_events,
            claim_events = report.claim_events,
            persisted = report.persisted,
            "finished batch"
        );
        report
    }
}
