// Pooled block storage for input streams.
//
// - `pool`: thread-local free list of fixed-size blocks, released on drop
// - `blocks`: BlockStore, a stream read to exhaustion into pooled blocks,
//   addressed by global byte offset

pub mod blocks;
pub mod pool;

pub use blocks::{BlockStore, DEFAULT_BLOCK_SIZE};
pub use pool::Block;
