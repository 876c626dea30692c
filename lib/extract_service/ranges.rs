use super::types::{Batch, HeightRange};

/// Splits `range` into contiguous `[start, end]` batches of at most `batch_size` heights.
///
/// Starts advance by `batch_size`; the last batch is clamped to `range.to()`. The result is an
/// ordered, non-overlapping cover of the whole range.
pub fn partition(range: HeightRange, batch_size: i64) -> Vec<Batch> {
    assert!(batch_size >= 1, "batch_size must be >= 1, got {batch_size}");

    let batch_count = (range.height_count() - 1) / batch_size + 1;
    let mut batches = Vec::with_capacity(usize::try_from(batch_count).unwrap_or(0));
    let mut start = range.from();
    loop {
        let end = start.saturating_add(batch_size - 1).min(range.to());
        batches.push(Batch { start, end });
        if end >= range.to() {
            break;
        }
        start = end + 1;
    }
    batches
}
