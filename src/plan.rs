//! Choosing the chunk size of an upload.
use crate::config::MAX_CHUNK_COUNT;

/// Returns the chunk size to use for a file of `file_size` bytes given the
/// `proposed` chunk size.
///
/// The proposal is kept unless it would split the file into more than
/// [`MAX_CHUNK_COUNT`] chunks, in which case the smallest size that keeps the
/// count in bounds, `file_size / 1024 + 1`, is used instead. A proposal that
/// is zero or negative counts as one byte.
///
/// # Examples
///
/// ```rust
/// use resumable_upload::plan::plan_chunk_size;
///
/// assert_eq!(plan_chunk_size(1, 1024), 1);
/// assert_eq!(plan_chunk_size(1, 1025), 2);
/// assert_eq!(plan_chunk_size(3, 1), 3);
/// ```
pub fn plan_chunk_size(proposed: i64, file_size: u64) -> u64 {
    let proposed = u64::try_from(proposed).unwrap_or(0).max(1);
    let chunks = file_size.div_ceil(proposed);
    if chunks > MAX_CHUNK_COUNT {
        file_size / MAX_CHUNK_COUNT + 1
    } else {
        proposed
    }
}
