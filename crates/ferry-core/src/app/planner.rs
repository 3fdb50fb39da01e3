//! Chunk planner: which byte range goes next.
//!
//! Pure functions only. The acknowledged offset comes from the session,
//! so a resumed upload re-plans from wherever the remote says it is.

use crate::domain::ChunkRange;

/// Remote's minimum chunk granularity (256 KiB). Every chunk except the
/// last must be a multiple of it.
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;

/// Non-zero multiple of [`CHUNK_GRANULARITY`].
pub fn is_aligned_chunk_size(chunk_size: u64) -> bool {
    chunk_size != 0 && chunk_size % CHUNK_GRANULARITY == 0
}

/// Next range to send, or `None` once everything is acknowledged.
pub fn next_range(acknowledged_bytes: u64, total_bytes: u64, chunk_size: u64) -> Option<ChunkRange> {
    if acknowledged_bytes >= total_bytes {
        return None;
    }
    let end = acknowledged_bytes.saturating_add(chunk_size).min(total_bytes);
    Some(ChunkRange::new(acknowledged_bytes, end))
}

/// All ranges of an uninterrupted upload, in order.
pub fn plan(total_bytes: u64, chunk_size: u64) -> impl Iterator<Item = ChunkRange> {
    std::iter::successors(next_range(0, total_bytes, chunk_size), move |prev| {
        next_range(prev.end, total_bytes, chunk_size)
    })
}
