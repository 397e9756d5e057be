//! Parallel processing utilities.

use rayon::prelude::*;

/// Multiplier for number of chunks relative to CPU threads.
/// Using 3x threads provides good load balancing when some chunks finish faster.
const CHUNKS_PER_THREAD: usize = 3;

/// Below this many elements the work is done on the calling thread.
const MIN_PARALLEL_LEN: usize = 1024;

/// Compute chunk size that splits `len` into roughly `threads * CHUNKS_PER_THREAD` ranges.
#[inline]
fn auto_chunk_size(len: usize) -> usize {
    let num_chunks = rayon::current_num_threads() * CHUNKS_PER_THREAD;
    (len / num_chunks).max(1)
}

/// Fill `data[i] = f(i)` for every index, in parallel over contiguous index ranges.
///
/// Each element is written exactly once by exactly one worker, so `f` only
/// needs shared (read-only) access to its captured state.
pub fn fill_indexed<T, F>(data: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if data.len() < MIN_PARALLEL_LEN {
        for (i, val) in data.iter_mut().enumerate() {
            *val = f(i);
        }
        return;
    }

    let chunk_size = auto_chunk_size(data.len());
    data.par_chunks_mut(chunk_size)
        .enumerate()
        .for_each(|(chunk_idx, chunk)| {
            let start_idx = chunk_idx * chunk_size;
            for (i, val) in chunk.iter_mut().enumerate() {
                *val = f(start_idx + i);
            }
        });
}
