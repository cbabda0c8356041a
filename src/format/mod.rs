// Serialised container for edit scripts.
//
//   file    := header record*
//   header  := "CDLT" version:u8 window_size:varint
//   record  := 0x00 len:varint payload[len]         (ADD)
//            | 0x01 len:varint old_offset:varint    (COPY)
//
// - `varint`: base-128 big-endian unsigned integers
// - `writer`: RecordWriter, an OpSink producing the container
// - `reader`: RecordReader, parses records and replays them against old data

pub mod reader;
pub mod varint;
pub mod writer;

pub use reader::{ApplyStats, Header, RecordReader, apply, decode_all};
pub use writer::RecordWriter;

/// File magic.
pub const MAGIC: [u8; 4] = *b"CDLT";

/// Container version written by this crate.
pub const VERSION: u8 = 1;

/// Record tag for literal bytes.
pub const TAG_ADD: u8 = 0;

/// Record tag for an old-stream back-reference.
pub const TAG_COPY: u8 = 1;
