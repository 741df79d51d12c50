//! # Record Chunker
//!
//! Pure, lazy partitioning of an ordered record sequence into bounded-size
//! shards. Order is preserved within and across shards and every record
//! appears exactly once.

use crate::error::{ChargenError, Result};
use crate::models::{Record, Shard, ShardId};

/// Split `records` into shards of at most `max_shard_size` records.
///
/// Produces `ceil(N / S)` shards lazily; concatenating the shards in order
/// reproduces the input exactly. Fails fast if the shard size is zero.
pub fn chunk(
    records: &[Record],
    max_shard_size: usize,
) -> Result<impl Iterator<Item = Shard> + '_> {
    if max_shard_size == 0 {
        return Err(ChargenError::configuration(
            "max_shard_size must be greater than zero",
        ));
    }

    Ok(records
        .chunks(max_shard_size)
        .enumerate()
        .map(|(index, window)| Shard::new(ShardId(index), window.to_vec())))
}
