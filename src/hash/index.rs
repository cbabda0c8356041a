// Hash-sorted index of the old stream's fixed-size chunks.
//
// The old stream is cut into `len / window` non-overlapping chunks; a trailing
// partial chunk is not indexed and can never be matched. Records are sorted by
// (hash, chunk) so every collision chain is one contiguous run, ordered by
// old-stream position, and can be found with two binary searches.

use std::ops::Range;

use super::rolling::PolyHash;
use crate::store::BlockStore;

/// One indexed chunk. Its first byte is at old offset `chunk * window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChunkRecord {
    // Field order gives the derived `Ord` the (hash, chunk) ordering.
    pub hash: u64,
    pub chunk: u64,
}

/// Sorted chunk index, built once per old stream and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ChunkIndex {
    hasher: PolyHash,
    /// Chunk hashes in old-stream order (`by_chunk[c]` is the hash of chunk `c`).
    by_chunk: Vec<u64>,
    /// Records sorted ascending by (hash, chunk).
    sorted: Vec<ChunkRecord>,
}

impl ChunkIndex {
    /// Hash every full chunk of `old` and sort the result.
    pub fn build(old: &BlockStore, hasher: PolyHash) -> Self {
        let window = hasher.window() as u64;
        let chunk_count = old.len() / window;

        let by_chunk: Vec<u64> = (0..chunk_count)
            .map(|c| hasher.hash_of_segments(old.segments(c * window, window)))
            .collect();

        let mut sorted: Vec<ChunkRecord> = by_chunk
            .iter()
            .enumerate()
            .map(|(c, &hash)| ChunkRecord {
                hash,
                chunk: c as u64,
            })
            .collect();
        // Keys are unique (chunk numbers differ), so the order is deterministic.
        sorted.sort_unstable();

        log::debug!(
            "chunk index: {} chunks of {} bytes ({} trailing bytes unindexed)",
            chunk_count,
            window,
            old.len() % window
        );

        Self {
            hasher,
            by_chunk,
            sorted,
        }
    }

    /// Hash parameters the index was built with.
    #[inline]
    pub fn hasher(&self) -> &PolyHash {
        &self.hasher
    }

    /// Chunk width in bytes.
    #[inline]
    pub fn window(&self) -> usize {
        self.hasher.window()
    }

    /// Number of indexed chunks.
    #[inline]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// True when the old stream was shorter than one chunk.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Record at sorted position `i`.
    #[inline]
    pub fn record(&self, i: usize) -> ChunkRecord {
        self.sorted[i]
    }

    /// Hash of chunk `chunk` in old-stream order, if it exists.
    #[inline]
    pub fn hash_of_chunk(&self, chunk: u64) -> Option<u64> {
        usize::try_from(chunk)
            .ok()
            .and_then(|c| self.by_chunk.get(c).copied())
    }

    /// Old-stream byte offset of `chunk`.
    #[inline]
    pub fn chunk_offset(&self, chunk: u64) -> u64 {
        chunk * self.window() as u64
    }

    /// Sorted positions of every record whose hash equals `hash`.
    ///
    /// Empty when there is no such record. Never allocates.
    #[inline]
    pub fn equal_range(&self, hash: u64) -> Range<usize> {
        let start = self.sorted.partition_point(|r| r.hash < hash);
        let len = self.sorted[start..].partition_point(|r| r.hash == hash);
        start..start + len
    }

    /// Whether records are in strict (hash, chunk) order.
    pub fn is_sorted(&self) -> bool {
        self.sorted.windows(2).all(|w| w[0] < w[1])
    }
}
