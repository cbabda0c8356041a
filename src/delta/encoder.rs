// Delta encoder: the chunk-index matching loop.
//
// One left-to-right pass over the new stream:
//   1. Roll a hash over the `window`-byte window starting at `p`.
//   2. Binary-search the chunk index for it. Misses advance `p` by one.
//   3. On a hit, compare real bytes; the first chain entry that verifies
//      becomes the match start.
//   4. Extend in `window` strides along old-stream chunk order. When the next
//      old chunk does not continue the match, look along the collision chain
//      for another start whose continuation covers what was matched so far.
//   5. Matches of at least `min_match` bytes flush the literal run and become
//      a COPY; shorter ones are left in the literal run.
//   6. Whatever literal run remains at the end is one final ADD.

use std::io::{self, Read};
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::hash::config::{ConfigError, DeltaOptions};
use crate::hash::index::ChunkIndex;
use crate::hash::rolling::PolyHash;
use crate::store::BlockStore;

use super::sink::OpSink;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// Reading either stream, or writing to the sink, failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid options: {0}")]
    Config(#[from] ConfigError),
    #[error("encode cancelled")]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag shared between the caller and an encode.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every encode holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Counters for one encode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub old_len: u64,
    pub new_len: u64,
    /// Old-stream chunks in the index.
    pub chunks_indexed: u64,
    pub adds: u64,
    pub copies: u64,
    pub literal_bytes: u64,
    pub copied_bytes: u64,
    /// Hash hits whose bytes did not match.
    pub collisions: u64,
    /// Verified matches shorter than `min_match`.
    pub short_matches: u64,
}

/// A verified equal span between the two streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub new_offset: u64,
    pub old_offset: u64,
    pub length: u64,
}

// ---------------------------------------------------------------------------
// DeltaEncoder
// ---------------------------------------------------------------------------

/// Computes ADD/COPY edit scripts turning an old stream into a new one.
///
/// # Example
/// ```
/// use chunkdelta::delta::{DeltaEncoder, Op, OpRecorder};
/// use chunkdelta::hash::config::DeltaOptions;
///
/// let encoder = DeltaEncoder::new(DeltaOptions::default()).unwrap();
/// let mut ops = OpRecorder::new();
/// encoder
///     .encode(&b"ABCDEFGHIJKLMNOP"[..], &b"XYZEFGHIJKLMNOPQR"[..], &mut ops)
///     .unwrap();
/// assert_eq!(ops.ops()[1], Op::Copy { offset: 4, len: 12 });
/// ```
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    opts: DeltaOptions,
    cancel: Option<CancelToken>,
}

impl DeltaEncoder {
    /// Create an encoder, rejecting invalid options up front.
    pub fn new(opts: DeltaOptions) -> Result<Self, ConfigError> {
        opts.validate()?;
        Ok(Self { opts, cancel: None })
    }

    /// Check `token` once per scanned position and stop when it is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &DeltaOptions {
        &self.opts
    }

    /// Read both streams to exhaustion and encode.
    ///
    /// Pooled blocks are released on every return path, including I/O errors
    /// part way through either stream.
    pub fn encode<O, N, S>(&self, old: O, new: N, sink: &mut S) -> Result<EncodeStats, EncodeError>
    where
        O: Read,
        N: Read,
        S: OpSink + ?Sized,
    {
        let old = BlockStore::read(old, self.opts.block_size)?;
        let new = BlockStore::read(new, self.opts.block_size)?;
        self.encode_stores(&old, &new, sink)
    }

    /// Build the chunk index for `old`.
    pub fn index(&self, old: &BlockStore) -> ChunkIndex {
        ChunkIndex::build(old, PolyHash::new(self.opts.window_size))
    }

    /// Encode already-buffered streams.
    pub fn encode_stores<S>(
        &self,
        old: &BlockStore,
        new: &BlockStore,
        sink: &mut S,
    ) -> Result<EncodeStats, EncodeError>
    where
        S: OpSink + ?Sized,
    {
        if !self.opts.matching {
            let mut scan = Scan::new(self, old, new, None, sink);
            scan.flush_literal(0, new.len())?;
            return Ok(scan.finish());
        }
        let index = self.index(old);
        self.encode_with_index(old, &index, new, sink)
    }

    /// Encode against a prebuilt index, so one old stream can be diffed
    /// against many new ones.
    ///
    /// # Panics
    /// If `index` is not sorted or was built with a different window size.
    pub fn encode_with_index<S>(
        &self,
        old: &BlockStore,
        index: &ChunkIndex,
        new: &BlockStore,
        sink: &mut S,
    ) -> Result<EncodeStats, EncodeError>
    where
        S: OpSink + ?Sized,
    {
        assert_eq!(
            index.window(),
            self.opts.window_size,
            "chunk index window does not match encoder options"
        );
        assert!(index.is_sorted(), "chunk index is not sorted");

        let mut scan = Scan::new(self, old, new, Some(index), sink);
        scan.run()?;
        let stats = scan.finish();
        log::debug!(
            "encoded {} -> {} bytes: {} copies ({} bytes), {} adds ({} bytes), {} collisions",
            stats.old_len,
            stats.new_len,
            stats.copies,
            stats.copied_bytes,
            stats.adds,
            stats.literal_bytes,
            stats.collisions
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

struct Scan<'a, S: OpSink + ?Sized> {
    old: &'a BlockStore,
    new: &'a BlockStore,
    index: Option<&'a ChunkIndex>,
    sink: &'a mut S,
    cancel: Option<&'a CancelToken>,
    window: u64,
    min_match: u64,
    max_chain: usize,
    /// Staging buffer for literal runs that straddle blocks.
    scratch: Vec<u8>,
    stats: EncodeStats,
}

impl<'a, S: OpSink + ?Sized> Scan<'a, S> {
    fn new(
        encoder: &'a DeltaEncoder,
        old: &'a BlockStore,
        new: &'a BlockStore,
        index: Option<&'a ChunkIndex>,
        sink: &'a mut S,
    ) -> Self {
        Self {
            old,
            new,
            index,
            sink,
            cancel: encoder.cancel.as_ref(),
            window: encoder.opts.window_size as u64,
            min_match: encoder.opts.min_match as u64,
            max_chain: encoder.opts.max_chain,
            scratch: Vec::new(),
            stats: EncodeStats {
                old_len: old.len(),
                new_len: new.len(),
                chunks_indexed: index.map_or(0, |i| i.len() as u64),
                ..EncodeStats::default()
            },
        }
    }

    fn finish(self) -> EncodeStats {
        self.stats
    }

    fn run(&mut self) -> Result<(), EncodeError> {
        let Some(index) = self.index else {
            return self.flush_literal(0, self.new.len());
        };
        let end = self.new.len();
        if index.is_empty() || end < self.window {
            return self.flush_literal(0, end);
        }

        let hasher = *index.hasher();
        let w = self.window;
        let mut p = 0u64;
        let mut literal_start = 0u64;
        let mut h = self.new_hash(&hasher, p);

        while p + w <= end {
            self.check_cancel()?;

            if let Some(m) = self.longest_match(index, p, h) {
                if m.length >= self.min_match {
                    log::trace!(
                        "copy: new {}..{} <- old {}",
                        m.new_offset,
                        m.new_offset + m.length,
                        m.old_offset
                    );
                    self.flush_literal(literal_start, p)?;
                    self.sink.copy(m.old_offset, m.length)?;
                    self.stats.copies += 1;
                    self.stats.copied_bytes += m.length;

                    p += m.length;
                    literal_start = p;
                    if p + w <= end {
                        h = self.new_hash(&hasher, p);
                    }
                    continue;
                }
                log::trace!("short match at {p}: {} < {}", m.length, self.min_match);
                self.stats.short_matches += 1;
            }

            if p + w < end {
                h = hasher.update(h, self.new.byte_at(p + w), self.new.byte_at(p));
            }
            p += 1;
        }

        self.flush_literal(literal_start, end)
    }

    /// Find the longest verified match for the new window at `p`, whose hash is `h`.
    fn longest_match(&mut self, index: &ChunkIndex, p: u64, h: u64) -> Option<Match> {
        let chain = index.equal_range(h);
        if chain.is_empty() {
            return None;
        }

        let w = self.window;
        let mut pos = None;
        for i in chain.clone().take(self.max_chain) {
            let chunk = index.record(i).chunk;
            if self
                .old
                .range_eq(index.chunk_offset(chunk), self.new, p, w)
            {
                pos = Some(i);
                break;
            }
            self.stats.collisions += 1;
        }
        let mut pos = pos?;
        let mut start = index.record(pos).chunk;
        let mut matched = 1u64;

        let hasher = *index.hasher();
        let end = self.new.len();
        loop {
            let next = p + matched * w;
            if next + w > end {
                break;
            }
            let next_hash = self.new_hash(&hasher, next);
            if self.continues(index, start + matched, next_hash, next) {
                matched += 1;
                continue;
            }
            match self.resync(index, chain.clone(), pos, matched, next_hash, p) {
                Some(alt) => {
                    log::trace!(
                        "resync at new {next}: chunk {start} -> {}",
                        index.record(alt).chunk
                    );
                    pos = alt;
                    start = index.record(alt).chunk;
                    matched += 1;
                }
                None => break,
            }
        }

        Some(Match {
            new_offset: p,
            old_offset: index.chunk_offset(start),
            length: matched * w,
        })
    }

    /// Whether old chunk `chunk` holds the new window at `new_offset`.
    fn continues(&self, index: &ChunkIndex, chunk: u64, hash: u64, new_offset: u64) -> bool {
        index.hash_of_chunk(chunk) == Some(hash)
            && self
                .old
                .range_eq(index.chunk_offset(chunk), self.new, new_offset, self.window)
    }

    /// Search the collision chain around sorted position `pos`, nearest first
    /// in both directions, for a start chunk `c` such that the old bytes from
    /// `c` match the new bytes from `p` for `matched + 1` windows.
    ///
    /// Returns the sorted position of that chunk.
    fn resync(
        &mut self,
        index: &ChunkIndex,
        chain: Range<usize>,
        pos: usize,
        matched: u64,
        next_hash: u64,
        p: u64,
    ) -> Option<usize> {
        let span = (matched + 1) * self.window;
        let mut up = pos + 1;
        let mut down = pos;
        let mut probes = 0usize;

        while probes < self.max_chain && (up < chain.end || down > chain.start) {
            for candidate in [
                (up < chain.end).then_some(up),
                (down > chain.start).then(|| down - 1),
            ]
            .into_iter()
            .flatten()
            {
                probes += 1;
                let chunk = index.record(candidate).chunk;
                if index.hash_of_chunk(chunk + matched) == Some(next_hash)
                    && self
                        .old
                        .range_eq(index.chunk_offset(chunk), self.new, p, span)
                {
                    return Some(candidate);
                }
            }
            up += 1;
            down = down.saturating_sub(1);
        }
        None
    }

    fn new_hash(&self, hasher: &PolyHash, offset: u64) -> u64 {
        hasher.hash_of_segments(self.new.segments(offset, self.window))
    }

    fn check_cancel(&self) -> Result<(), EncodeError> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(EncodeError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Emit `new[start..end]` as one ADD. Empty runs emit nothing.
    fn flush_literal(&mut self, start: u64, end: u64) -> Result<(), EncodeError> {
        if end <= start {
            return Ok(());
        }
        let len = end - start;
        let mut segments = self.new.segments(start, len);
        match (segments.next(), segments.next()) {
            (Some(only), None) => self.sink.add(only)?,
            _ => {
                self.scratch.clear();
                self.scratch.resize(len as usize, 0);
                self.new.copy_range(start, &mut self.scratch);
                self.sink.add(&self.scratch)?;
            }
        }
        self.stats.adds += 1;
        self.stats.literal_bytes += len;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
