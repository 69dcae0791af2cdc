use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::Result;

pub(crate) fn create_thread_pool(num_threads: usize) -> Result<ThreadPool> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()?;

    Ok(pool)
}

/// Split `0..len` into `parts` contiguous slices of `len / parts` elements,
/// the last slice absorbing the remainder.
pub(crate) fn split_contiguous(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let step = len / parts;
    (0..parts)
        .map(|p| {
            let start = p * step;
            let end = if p == parts - 1 { len } else { start + step };
            start..end
        })
        .collect()
}

/// Run `task` on every slice of `0..len` inside `pool` and return the partial
/// results in slice order, regardless of which worker finished first.
///
/// The first failing slice aborts the whole computation.
pub(crate) fn dispatch_ordered<R, F>(
    pool: &ThreadPool,
    len: usize,
    parts: usize,
    task: F,
) -> Result<Vec<R>>
where
    R: Send,
    F: Fn(usize, Range<usize>) -> Result<R> + Sync,
{
    let slices = split_contiguous(len, parts);
    pool.install(|| {
        slices
            .into_par_iter()
            .enumerate()
            .map(|(worker, slice)| task(worker, slice))
            .collect()
    })
}
