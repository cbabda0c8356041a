// Thread-local block pool.
//
// Blocks are handed out as `Block` guards. Dropping a guard puts its memory
// back on the calling thread's free list, so every exit path of a reader
// (success, early return, `?` on an I/O error, panic unwind) releases what it
// acquired.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};

/// Maximum number of idle blocks kept per thread.
pub const MAX_POOL_SIZE: usize = 16;

thread_local! {
    static FREE_BLOCKS: RefCell<Vec<Box<[u8]>>> = const { RefCell::new(Vec::new()) };
}

/// A fixed-size byte block borrowed from the thread-local pool.
///
/// The full `size` bytes are always addressable; how many of them hold valid
/// data is tracked by the owner (see `BlockStore`).
pub struct Block {
    data: Box<[u8]>,
}

impl Block {
    /// Take a block of exactly `size` bytes, reusing an idle one if available.
    ///
    /// Reused blocks are not zeroed.
    pub fn take(size: usize) -> Self {
        debug_assert!(size > 0, "block size must be non-zero");
        let reused = FREE_BLOCKS.with(|pool| {
            let mut pool = pool.borrow_mut();
            pool.iter()
                .rposition(|b| b.len() == size)
                .map(|i| pool.swap_remove(i))
        });
        let data = reused.unwrap_or_else(|| vec![0u8; size].into_boxed_slice());
        Self { data }
    }

    /// Block capacity in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Deref for Block {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for Block {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        // `try_with` fails only during thread teardown; the memory is freed then.
        let _ = FREE_BLOCKS.try_with(|pool| {
            if let Ok(mut pool) = pool.try_borrow_mut() {
                if pool.len() < MAX_POOL_SIZE {
                    pool.push(data);
                }
            }
        });
    }
}

/// Number of idle blocks on this thread's free list.
pub fn idle_blocks() -> usize {
    FREE_BLOCKS.with(|pool| pool.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_has_requested_size() {
        let block = Block::take(128);
        assert_eq!(block.size(), 128);
        assert_eq!(block.len(), 128);
    }

    #[test]
    fn dropped_block_is_reused() {
        let size = 77;
        let ptr = {
            let mut block = Block::take(size);
            block[0] = 0xAB;
            block.as_ptr()
        };
        let before = idle_blocks();
        assert!(before >= 1);

        let block = Block::take(size);
        assert_eq!(block.as_ptr(), ptr);
        assert_eq!(idle_blocks(), before - 1);
    }

    #[test]
    fn sizes_are_not_mixed() {
        drop(Block::take(33));
        let block = Block::take(34);
        assert_eq!(block.size(), 34);
    }

    #[test]
    fn pool_is_bounded() {
        let blocks: Vec<Block> = (0..MAX_POOL_SIZE * 2).map(|_| Block::take(19)).collect();
        drop(blocks);
        assert!(idle_blocks() <= MAX_POOL_SIZE);
    }
}
