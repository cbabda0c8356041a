//! Chunkdelta: binary delta encoding over a sorted chunk index.
//!
//! The old stream is cut into fixed-size chunks, each hashed with a
//! polynomial rolling hash and kept in an index sorted by hash. A single
//! pass over the new stream rolls the same hash byte by byte, looks it up,
//! verifies real bytes and grows matches chunk by chunk. The result is an
//! edit script of ADD (literal) and COPY (old-stream range) operations
//! delivered to an [`delta::OpSink`].
//!
//! The crate provides:
//! - Pooled block storage for input streams (`store`)
//! - The rolling hash, options and chunk index (`hash`)
//! - The encoder, operation sinks and patch replay (`delta`)
//! - A compact serialised container for edit scripts (`format`)
//! - In-memory and file-oriented helpers (`engine`, `io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! let old = b"The quick brown fox jumps over the lazy dog";
//! let new = b"The quick brown cat jumps over the lazy dog!";
//!
//! let delta = chunkdelta::engine::encode(old, new).unwrap();
//! let decoded = chunkdelta::engine::decode(old, &delta).unwrap();
//! assert_eq!(decoded, new);
//! ```

pub mod delta;
pub mod engine;
pub mod format;
pub mod hash;
pub mod io;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;
