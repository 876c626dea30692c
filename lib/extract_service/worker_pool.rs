use std::sync::Arc;

use flume::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::batch_processor::BatchProcessor;
use super::error::Error;
use super::fetcher::BlockFetcher;
use super::persister::EventStore;
use super::types::{Batch, RunSummary};

/// Fans `batches` out to `max_workers` workers over a bounded queue of the same capacity.
///
/// The calling task is the producer: it enqueues batches in ascending order, blocking while
/// the queue is full, then closes the queue and joins every worker. Cancelling `cancel`
/// stops the producer and idle workers; batches already being processed run to completion.
///
/// Per-batch failures only show up in logs and in the returned summary. An `Err` means a
/// worker task itself failed to join.
pub async fn run_pool<F, S>(
    processor: Arc<BatchProcessor<F, S>>,
    batches: Vec<Batch>,
    max_workers: usize,
    cancel: CancellationToken,
) -> Result<RunSummary, Error>
where
    F: BlockFetcher + 'static,
    S: EventStore + 'static,
{
    if max_workers == 0 {
        return Err(Error::InvalidSettings(
            "max_workers must be at least 1".to_string(),
        ));
    }

    let batches_planned = batches.len();
    let (sender, receiver) = flume::bounded::<Batch>(max_workers);

    let mut worker_handles = Vec::with_capacity(max_workers);
    for worker_idx in 0..max_workers {
        let worker_processor = processor.clone();
        let worker_receiver = receiver.clone();
        let worker_cancel = cancel.clone();
        worker_handles.push(tokio::spawn(async move {
            run_worker_loop(worker_idx, worker_processor, worker_receiver, worker_cancel).await
        }));
    }
    drop(receiver);

    let mut enqueued = 0usize;
    for batch in batches {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(
                    event = "producer_cancelled",
                    enqueued,
                    remaining = batches_planned - enqueued,
                    "cancellation requested; no further batches will be queued"
                );
                break;
            }
            sent = sender.send_async(batch) => sent,
        };
        if sent.is_err() {
            error!(
                event = "batch_queue_closed",
                enqueued,
                remaining = batches_planned - enqueued,
                "every worker stopped before all batches were queued"
            );
            break;
        }
        enqueued += 1;
    }
    drop(sender);

    let mut summary = RunSummary {
        batches_planned,
        ..RunSummary::default()
    };
    let mut join_failure = None;
    for handle in worker_handles {
        match handle.await {
            Ok(worker_summary) => summary.merge(worker_summary),
            Err(err) => {
                error!(event = "worker_join_failed", error = %err, "worker task failed");
                join_failure.get_or_insert(err);
            }
        }
    }
    summary.cancelled = cancel.is_cancelled();

    match join_failure {
        Some(err) => Err(Error::TaskJoinError(err)),
        None => Ok(summary),
    }
}

async fn run_worker_loop<F, S>(
    worker_idx: usize,
    processor: Arc<BatchProcessor<F, S>>,
    receiver: Receiver<Batch>,
    cancel: CancellationToken,
) -> RunSummary
where
    F: BlockFetcher,
    S: EventStore,
{
    let mut summary = RunSummary::default();
    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = receiver.recv_async() => match received {
                Ok(batch) => batch,
                Err(_) => break,
            },
        };
        let report = processor.run_batch(worker_idx, batch).await;
        summary.absorb(&report);
    }

    info!(
        event = "worker_stopped",
        worker = worker_idx,
        batches = summary.batches_processed,
        "worker drained"
    );
    summary
}
