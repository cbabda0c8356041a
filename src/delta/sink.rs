// Operation sink: where the encoder sends its ADD / COPY decisions.
//
// The encoder only knows this trait. Serialisation (`format::RecordWriter`),
// in-memory capture (`OpRecorder`) and anything else plug in here.

use std::io;

/// Receiver of the encoder's edit script, in new-stream order.
pub trait OpSink {
    /// Literal bytes to append to the output.
    fn add(&mut self, data: &[u8]) -> io::Result<()>;

    /// Append `len` bytes copied from the old stream at `old_offset`.
    fn copy(&mut self, old_offset: u64, len: u64) -> io::Result<()>;
}

impl<S: OpSink + ?Sized> OpSink for &mut S {
    fn add(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).add(data)
    }

    fn copy(&mut self, old_offset: u64, len: u64) -> io::Result<()> {
        (**self).copy(old_offset, len)
    }
}

/// One edit-script operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Literal bytes.
    Add(Vec<u8>),
    /// Back-reference into the old stream.
    Copy { offset: u64, len: u64 },
}

impl Op {
    /// Number of new-stream bytes this operation produces.
    pub fn output_len(&self) -> u64 {
        match self {
            Op::Add(data) => data.len() as u64,
            Op::Copy { len, .. } => *len,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Add(data) => write!(f, "ADD  len={}", data.len()),
            Op::Copy { offset, len } => write!(f, "COPY len={len} offset={offset}"),
        }
    }
}

/// Sink that keeps every operation in memory.
#[derive(Debug, Default, Clone)]
pub struct OpRecorder {
    ops: Vec<Op>,
}

impl OpRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations recorded so far.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}

impl OpSink for OpRecorder {
    fn add(&mut self, data: &[u8]) -> io::Result<()> {
        self.ops.push(Op::Add(data.to_vec()));
        Ok(())
    }

    fn copy(&mut self, old_offset: u64, len: u64) -> io::Result<()> {
        self.ops.push(Op::Copy {
            offset: old_offset,
            len,
        });
        Ok(())
    }
}

/// Sink that only counts what passes through it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CountingSink {
    pub adds: u64,
    pub copies: u64,
    pub literal_bytes: u64,
    pub copied_bytes: u64,
}

impl OpSink for CountingSink {
    fn add(&mut self, data: &[u8]) -> io::Result<()> {
        self.adds += 1;
        self.literal_bytes += data.len() as u64;
        Ok(())
    }

    fn copy(&mut self, _old_offset: u64, len: u64) -> io::Result<()> {
        self.copies += 1;
        self.copied_bytes += len;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let mut rec = OpRecorder::new();
        rec.add(b"xy").unwrap();
        rec.copy(10, 4).unwrap();
        rec.add(b"z").unwrap();
        assert_eq!(
            rec.into_ops(),
            vec![
                Op::Add(b"xy".to_vec()),
                Op::Copy { offset: 10, len: 4 },
                Op::Add(b"z".to_vec()),
            ]
        );
    }

    #[test]
    fn sink_through_mut_reference() {
        fn feed<S: OpSink>(mut sink: S) {
            sink.copy(0, 8).unwrap();
        }
        let mut counter = CountingSink::default();
        feed(&mut counter);
        feed(&mut counter);
        assert_eq!(counter.copies, 2);
        assert_eq!(counter.copied_bytes, 16);
    }

    #[test]
    fn op_display_and_len() {
        let add = Op::Add(vec![0; 3]);
        let copy = Op::Copy { offset: 7, len: 12 };
        assert_eq!(add.output_len(), 3);
        assert_eq!(copy.output_len(), 12);
        assert_eq!(copy.to_string(), "COPY len=12 offset=7");
    }
}
