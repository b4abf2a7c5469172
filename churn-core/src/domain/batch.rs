//! Concurrency arithmetic
//!
//! Decides how wide each batch of repetitions is and how a job's
//! repetitions are split into consecutive batches.

/// Resolves the global concurrency cap against the machine's parallelism
///
/// The configured value may be zero or negative; the result is never below 1.
pub fn global_concurrency_cap(configured: i64, available_parallelism: usize) -> usize {
    let configured = usize::try_from(configured).unwrap_or(0);
    configured.min(available_parallelism).max(1)
}

/// Number of repetitions of a job that run side by side
pub fn effective_concurrency(job_max_concurrency: u32, global_cap: usize) -> usize {
    (job_max_concurrency as usize).min(global_cap).max(1)
}

/// Splits `repetitions` into consecutive batch sizes of at most `width`
///
/// Every batch except possibly the last has exactly `width` members.
/// A width of zero is treated as one.
pub fn partition(repetitions: u32, width: usize) -> Vec<usize> {
    let width = width.max(1);
    let mut remaining = repetitions as usize;
    let mut batches = Vec::with_capacity(remaining.div_ceil(width));

    while remaining > 0 {
        let size = remaining.min(width);
        batches.push(size);
        remaining -= size;
    }

    batches
}
