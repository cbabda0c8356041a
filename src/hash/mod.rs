// Hashing and indexing for chunk matching.
//
// - `rolling`: polynomial rolling hash modulo 2^54 - 33
// - `config`: encoder options and level presets
// - `index`: sorted (hash, chunk) records over the old stream

pub mod config;
pub mod index;
pub mod rolling;

pub use config::{ConfigError, DeltaOptions};
pub use index::{ChunkIndex, ChunkRecord};
pub use rolling::PolyHash;
