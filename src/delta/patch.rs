// Patch application: replay ADD / COPY against the old stream.

use std::io::{self, Write};

use crate::format::varint::VarIntError;
use crate::store::BlockStore;

use super::sink::{Op, OpSink};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed integer: {0}")]
    Varint(#[from] VarIntError),
    #[error("copy of {len} bytes at offset {offset} exceeds old stream of {old_len} bytes")]
    CopyOutOfRange { offset: u64, len: u64, old_len: u64 },
}

// ---------------------------------------------------------------------------
// Old-stream access
// ---------------------------------------------------------------------------

/// Random access to the old stream for COPY replay.
pub trait OldData {
    /// Total old-stream length.
    fn len(&self) -> u64;
    /// Whether the old stream is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Write `old[offset..offset + len]` to `out`. The range is in bounds.
    fn write_range<W: Write + ?Sized>(&self, offset: u64, len: u64, out: &mut W) -> io::Result<()>;
}

impl OldData for [u8] {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn write_range<W: Write + ?Sized>(&self, offset: u64, len: u64, out: &mut W) -> io::Result<()> {
        out.write_all(&self[offset as usize..(offset + len) as usize])
    }
}

impl OldData for Vec<u8> {
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn write_range<W: Write + ?Sized>(&self, offset: u64, len: u64, out: &mut W) -> io::Result<()> {
        self.as_slice().write_range(offset, len, out)
    }
}

impl OldData for BlockStore {
    fn len(&self) -> u64 {
        BlockStore::len(self)
    }

    fn write_range<W: Write + ?Sized>(&self, offset: u64, len: u64, out: &mut W) -> io::Result<()> {
        for seg in self.segments(offset, len) {
            out.write_all(seg)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Patcher
// ---------------------------------------------------------------------------

/// An `OpSink` that rebuilds the new stream into a writer as operations arrive.
pub struct Patcher<'a, D: OldData + ?Sized, W: Write> {
    old: &'a D,
    out: W,
    written: u64,
}

impl<'a, D: OldData + ?Sized, W: Write> Patcher<'a, D, W> {
    pub fn new(old: &'a D, out: W) -> Self {
        Self {
            old,
            out,
            written: 0,
        }
    }

    /// Append literal bytes.
    pub fn apply_add(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.out.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Append a range of the old stream, rejecting ranges past its end.
    pub fn apply_copy(&mut self, offset: u64, len: u64) -> Result<(), DecodeError> {
        let old_len = self.old.len();
        if offset.checked_add(len).is_none_or(|end| end > old_len) {
            return Err(DecodeError::CopyOutOfRange {
                offset,
                len,
                old_len,
            });
        }
        self.old.write_range(offset, len, &mut self.out)?;
        self.written += len;
        Ok(())
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Op) -> Result<(), DecodeError> {
        match op {
            Op::Add(data) => self.apply_add(data),
            Op::Copy { offset, len } => self.apply_copy(*offset, *len),
        }
    }

    /// Bytes of new stream produced so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<D: OldData + ?Sized, W: Write> OpSink for Patcher<'_, D, W> {
    fn add(&mut self, data: &[u8]) -> io::Result<()> {
        self.apply_add(data).map_err(into_io)
    }

    fn copy(&mut self, old_offset: u64, len: u64) -> io::Result<()> {
        self.apply_copy(old_offset, len).map_err(into_io)
    }
}

fn into_io(e: DecodeError) -> io::Error {
    match e {
        DecodeError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Rebuild the new stream from `old` and an in-memory edit script.
pub fn apply_ops<D: OldData + ?Sized>(old: &D, ops: &[Op]) -> Result<Vec<u8>, DecodeError> {
    let capacity = ops.iter().map(Op::output_len).sum::<u64>() as usize;
    let mut patcher = Patcher::new(old, Vec::with_capacity(capacity));
    for op in ops {
        patcher.apply(op)?;
    }
    Ok(patcher.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_mixed_ops() {
        let old = b"ABCDEFGHIJKLMNOP";
        let ops = vec![
            Op::Add(b"XYZ".to_vec()),
            Op::Copy { offset: 4, len: 12 },
            Op::Add(b"QR".to_vec()),
        ];
        assert_eq!(apply_ops(&old[..], &ops).unwrap(), b"XYZEFGHIJKLMNOPQR");
    }

    #[test]
    fn copy_past_end_rejected() {
        let err = apply_ops(&b"abc"[..], &[Op::Copy { offset: 1, len: 3 }]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::CopyOutOfRange {
                offset: 1,
                len: 3,
                old_len: 3
            }
        ));
    }

    #[test]
    fn copy_offset_overflow_rejected() {
        let err = apply_ops(&b"abc"[..], &[Op::Copy {
            offset: u64::MAX,
            len: 2,
        }])
        .unwrap_err();
        assert!(matches!(err, DecodeError::CopyOutOfRange { .. }));
    }

    #[test]
    fn block_store_as_old_data() {
        let data: Vec<u8> = (0..100u8).collect();
        let store = BlockStore::from_bytes(&data, 7);
        let out = apply_ops(&store, &[Op::Copy { offset: 5, len: 30 }]).unwrap();
        assert_eq!(out, &data[5..35]);
    }

    #[test]
    fn patcher_as_sink_reports_invalid_data() {
        let mut out = Vec::new();
        let mut patcher = Patcher::new(&b"abcd"[..], &mut out);
        patcher.add(b"hi").unwrap();
        patcher.copy(0, 4).unwrap();
        let err = patcher.copy(2, 8).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(patcher.written(), 6);
        drop(patcher);
        assert_eq!(out, b"hiabcd");
    }
}
