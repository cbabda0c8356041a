// Container reader and patch replay.

use std::io::{self, Read, Write};

use super::varint;
use super::{MAGIC, TAG_ADD, TAG_COPY, VERSION};
use crate::delta::patch::{DecodeError, OldData, Patcher};
use crate::delta::sink::Op;

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    /// Window size the delta was produced with (informational).
    pub window_size: u64,
}

impl Header {
    /// Read and validate the header at the start of a container.
    pub fn read<R: Read + ?Sized>(r: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(truncated("header"))?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidInput(format!(
                "bad magic {magic:02X?}, expected {MAGIC:02X?}"
            )));
        }
        let mut version = [0u8; 1];
        r.read_exact(&mut version).map_err(truncated("header"))?;
        if version[0] != VERSION {
            return Err(DecodeError::InvalidInput(format!(
                "unsupported container version {}",
                version[0]
            )));
        }
        let window_size = varint::stream_read_u64(r).map_err(truncated("header"))?;
        Ok(Self {
            version: version[0],
            window_size,
        })
    }
}

/// Outcome of replaying a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub records: u64,
    pub adds: u64,
    pub copies: u64,
    /// Bytes of new stream written.
    pub output_len: u64,
}

/// Streaming parser for the record container.
///
/// Iterating yields each operation with ADD payloads in memory; `apply_to`
/// replays the stream without buffering payloads.
pub struct RecordReader<R: Read> {
    inner: R,
    header: Header,
    records: u64,
    failed: bool,
}

impl<R: Read> RecordReader<R> {
    /// Read the header and position the reader at the first record.
    pub fn new(mut inner: R) -> Result<Self, DecodeError> {
        let header = Header::read(&mut inner)?;
        Ok(Self {
            inner,
            header,
            records: 0,
            failed: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Records read so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Next record, or `None` at a clean end of input.
    pub fn next_record(&mut self) -> Result<Option<Op>, DecodeError> {
        let Some(tag) = self.read_tag()? else {
            return Ok(None);
        };
        let op = match tag {
            TAG_ADD => {
                let len = self.read_len()?;
                let mut data = Vec::new();
                // `take` bounds the allocation by what the input actually holds.
                let got = (&mut self.inner).take(len).read_to_end(&mut data)?;
                if got as u64 != len {
                    return Err(truncated_add(len, got as u64));
                }
                Op::Add(data)
            }
            TAG_COPY => {
                let len = self.read_len()?;
                let offset = varint::stream_read_u64(&mut self.inner).map_err(truncated("COPY"))?;
                Op::Copy { offset, len }
            }
            other => return Err(unknown_tag(other, self.records)),
        };
        self.records += 1;
        Ok(Some(op))
    }

    /// Replay every remaining record against `old`, writing the new stream to `out`.
    pub fn apply_to<D, W>(mut self, old: &D, out: W) -> Result<ApplyStats, DecodeError>
    where
        D: OldData + ?Sized,
        W: Write,
    {
        let mut patcher = Patcher::new(old, out);
        let mut stats = ApplyStats::default();

        while let Some(tag) = self.read_tag()? {
            match tag {
                TAG_ADD => {
                    let len = self.read_len()?;
                    let got = io::copy(&mut (&mut self.inner).take(len), &mut AddWriter {
                        inner: &mut patcher,
                    })?;
                    if got != len {
                        return Err(truncated_add(len, got));
                    }
                    stats.adds += 1;
                }
                TAG_COPY => {
                    let len = self.read_len()?;
                    let offset =
                        varint::stream_read_u64(&mut self.inner).map_err(truncated("COPY"))?;
                    patcher.apply_copy(offset, len)?;
                    stats.copies += 1;
                }
                other => return Err(unknown_tag(other, self.records)),
            }
            self.records += 1;
        }

        stats.records = self.records;
        stats.output_len = patcher.written();
        patcher.finish()?;
        log::debug!(
            "applied {} records ({} adds, {} copies), {} bytes out",
            stats.records,
            stats.adds,
            stats.copies,
            stats.output_len
        );
        Ok(stats)
    }

    /// One tag byte, or `None` at end of input.
    fn read_tag(&mut self) -> Result<Option<u8>, DecodeError> {
        let mut tag = [0u8; 1];
        loop {
            match self.inner.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_len(&mut self) -> Result<u64, DecodeError> {
        varint::stream_read_u64(&mut self.inner).map_err(truncated("record length"))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Op, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// Literal bytes go straight from the container into the patcher.
struct AddWriter<'p, 'a, D: OldData + ?Sized, W: Write> {
    inner: &'p mut Patcher<'a, D, W>,
}

impl<D: OldData + ?Sized, W: Write> Write for AddWriter<'_, '_, D, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.apply_add(buf).map_err(|e| match e {
            DecodeError::Io(e) => e,
            other => io::Error::other(other),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reconstruct the new stream from `old` and a serialised container.
pub fn apply<D, R, W>(old: &D, delta: R, out: W) -> Result<ApplyStats, DecodeError>
where
    D: OldData + ?Sized,
    R: Read,
    W: Write,
{
    RecordReader::new(delta)?.apply_to(old, out)
}

/// Decode an in-memory container against in-memory old data.
pub fn decode_all(old: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    apply(old, delta, &mut out)?;
    Ok(out)
}

/// Map end-of-input inside a structure to `InvalidInput`; other I/O errors pass through.
fn truncated(what: &'static str) -> impl Fn(io::Error) -> DecodeError {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => DecodeError::InvalidInput(format!("truncated {what}")),
        io::ErrorKind::InvalidData => DecodeError::InvalidInput(format!("{what}: {e}")),
        _ => DecodeError::Io(e),
    }
}

fn truncated_add(len: u64, got: u64) -> DecodeError {
    DecodeError::InvalidInput(format!("truncated ADD payload: {got} of {len} bytes"))
}

fn unknown_tag(tag: u8, record: u64) -> DecodeError {
    DecodeError::InvalidInput(format!("unknown record tag {tag:#04x} at record {record}"))
}
