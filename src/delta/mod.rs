// Delta encoding and patch replay.
//
// - `sink`: OpSink trait and the in-memory Op representation
// - `encoder`: DeltaEncoder, chunk matching over a BlockStore
// - `patch`: rebuild the new stream from old data plus operations

pub mod encoder;
pub mod patch;
pub mod sink;

pub use encoder::{CancelToken, DeltaEncoder, EncodeError, EncodeStats, Match};
pub use patch::{DecodeError, OldData, Patcher, apply_ops};
pub use sink::{CountingSink, Op, OpRecorder, OpSink};
