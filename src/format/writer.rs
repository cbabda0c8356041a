// Container writer.

use std::io::{self, Write};

use super::varint;
use super::{MAGIC, TAG_ADD, TAG_COPY, VERSION};
use crate::delta::sink::OpSink;

/// Serialises operations into the tagged-record container as they arrive.
///
/// # Example
/// ```
/// use chunkdelta::delta::OpSink;
/// use chunkdelta::format::RecordWriter;
///
/// let mut w = RecordWriter::new(Vec::new(), 4).unwrap();
/// w.add(b"hi").unwrap();
/// w.copy(16, 8).unwrap();
/// let bytes = w.finish().unwrap();
/// assert_eq!(&bytes[..4], b"CDLT");
/// ```
pub struct RecordWriter<W: Write> {
    inner: W,
    records: u64,
    bytes_written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Write the container header and return a writer ready for records.
    pub fn new(mut inner: W, window_size: usize) -> io::Result<Self> {
        inner.write_all(&MAGIC)?;
        inner.write_all(&[VERSION])?;
        varint::write_u64(&mut inner, window_size as u64)?;
        let header_len = MAGIC.len() + 1 + varint::sizeof_u64(window_size as u64);
        Ok(Self {
            inner,
            records: 0,
            bytes_written: header_len as u64,
        })
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Container bytes written so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> OpSink for RecordWriter<W> {
    fn add(&mut self, data: &[u8]) -> io::Result<()> {
        let len = data.len() as u64;
        self.inner.write_all(&[TAG_ADD])?;
        varint::write_u64(&mut self.inner, len)?;
        self.inner.write_all(data)?;
        self.records += 1;
        self.bytes_written += 1 + varint::sizeof_u64(len) as u64 + len;
        Ok(())
    }

    fn copy(&mut self, old_offset: u64, len: u64) -> io::Result<()> {
        self.inner.write_all(&[TAG_COPY])?;
        varint::write_u64(&mut self.inner, len)?;
        varint::write_u64(&mut self.inner, old_offset)?;
        self.records += 1;
        self.bytes_written += 1 + (varint::sizeof_u64(len) + varint::sizeof_u64(old_offset)) as u64;
        Ok(())
    }
}
