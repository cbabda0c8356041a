// Block store: an input stream buffered into pooled fixed-size blocks.
//
// Offset `o` lives at `blocks[o / block_size][o % block_size]`. All blocks but
// the last are full. The store is immutable once read and gives its blocks
// back to the pool when dropped.

use std::io::{self, Read};

use super::pool::Block;

/// Default block size (8 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// A fully-read input stream held in pooled blocks.
pub struct BlockStore {
    blocks: Vec<Block>,
    block_size: usize,
    len: u64,
}

impl BlockStore {
    /// Read `reader` to exhaustion into blocks of `block_size` bytes.
    ///
    /// A short read only ends the stream when it returns 0 bytes, so partial
    /// reads from pipes and sockets are handled. If the reader fails, every
    /// block acquired so far is returned to the pool before the error
    /// propagates.
    pub fn read<R: Read>(mut reader: R, block_size: usize) -> io::Result<Self> {
        assert!(block_size > 0, "block size must be non-zero");
        let mut blocks = Vec::new();
        let mut len = 0u64;

        loop {
            let mut block = Block::take(block_size);
            let filled = fill_block(&mut reader, &mut block)?;
            len += filled as u64;
            if filled > 0 {
                blocks.push(block);
            }
            if filled < block_size {
                break;
            }
        }

        log::trace!("block store: read {len} bytes into {} blocks", blocks.len());
        Ok(Self {
            blocks,
            block_size,
            len,
        })
    }

    /// Buffer an in-memory byte slice.
    pub fn from_bytes(data: &[u8], block_size: usize) -> Self {
        // Reading from a slice cannot fail.
        match Self::read(data, block_size) {
            Ok(store) => store,
            Err(e) => unreachable!("slice read failed: {e}"),
        }
    }

    /// Total logical length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream was empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Block size the store was read with.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks held.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Byte at global `offset`.
    ///
    /// # Panics
    /// If `offset >= self.len()`.
    #[inline]
    pub fn byte_at(&self, offset: u64) -> u8 {
        assert!(
            offset < self.len,
            "offset {offset} out of range for stream of {} bytes",
            self.len
        );
        let (block, within) = self.locate(offset);
        self.blocks[block][within]
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// # Panics
    /// If the range reaches past the end of the stream.
    pub fn copy_range(&self, offset: u64, buf: &mut [u8]) {
        let mut pos = 0usize;
        for seg in self.segments(offset, buf.len() as u64) {
            buf[pos..pos + seg.len()].copy_from_slice(seg);
            pos += seg.len();
        }
    }

    /// Contiguous slices covering `[offset, offset + len)`, in order.
    ///
    /// # Panics
    /// If the range reaches past the end of the stream.
    pub fn segments(&self, offset: u64, len: u64) -> Segments<'_> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.len)
            .unwrap_or_else(|| {
                panic!(
                    "range {offset}+{len} out of range for stream of {} bytes",
                    self.len
                )
            });
        Segments {
            store: self,
            pos: offset,
            end,
        }
    }

    /// Whether `self[offset..offset + len]` equals `other[other_offset..other_offset + len]`.
    ///
    /// Ranges that run past either stream compare unequal.
    pub fn range_eq(&self, offset: u64, other: &BlockStore, other_offset: u64, len: u64) -> bool {
        if !self.contains(offset, len) || !other.contains(other_offset, len) {
            return false;
        }
        let mut a = self.segments(offset, len);
        let mut b = other.segments(other_offset, len);
        let mut sa: &[u8] = &[];
        let mut sb: &[u8] = &[];
        loop {
            if sa.is_empty() {
                match a.next() {
                    Some(s) => sa = s,
                    None => return true,
                }
            }
            if sb.is_empty() {
                match b.next() {
                    Some(s) => sb = s,
                    None => return true,
                }
            }
            let n = sa.len().min(sb.len());
            if sa[..n] != sb[..n] {
                return false;
            }
            sa = &sa[n..];
            sb = &sb[n..];
        }
    }

    /// Whether `[offset, offset + len)` lies inside the stream.
    #[inline]
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset.checked_add(len).is_some_and(|end| end <= self.len)
    }

    /// Copy the whole stream into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len as usize);
        for seg in self.segments(0, self.len) {
            out.extend_from_slice(seg);
        }
        out
    }

    #[inline]
    fn locate(&self, offset: u64) -> (usize, usize) {
        let bs = self.block_size as u64;
        ((offset / bs) as usize, (offset % bs) as usize)
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("len", &self.len)
            .field("block_size", &self.block_size)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

/// Iterator over the contiguous pieces of a byte range. See [`BlockStore::segments`].
pub struct Segments<'a> {
    store: &'a BlockStore,
    pos: u64,
    end: u64,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.end {
            return None;
        }
        let (block, within) = self.store.locate(self.pos);
        let avail = self.store.block_size - within;
        let take = avail.min((self.end - self.pos) as usize);
        self.pos += take as u64;
        Some(&self.store.blocks[block][within..within + take])
    }
}

/// Fill `block` from `reader` until it is full or the reader reports EOF.
fn fill_block<R: Read>(reader: &mut R, block: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < block.len() {
        match reader.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
