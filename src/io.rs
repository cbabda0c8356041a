// File-level helpers for delta encoding/decoding.
//
// `encode_file()` and `decode_file()` wrap the encoder and the container
// reader with buffered file I/O. With the `file-io` feature, SHA-256 digests
// of the streams are computed as the bytes flow past.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::delta::encoder::{self, DeltaEncoder, EncodeError};
use crate::delta::patch::DecodeError;
use crate::format::{RecordReader, RecordWriter};
use crate::hash::config::{ConfigError, DeltaOptions};
use crate::store::{BlockStore, DEFAULT_BLOCK_SIZE};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    pub old_size: u64,
    pub new_size: u64,
    /// Container size in bytes, header included.
    pub delta_size: u64,
    /// Records written to the container.
    pub records: u64,
    /// Matching statistics from the encoder.
    pub matching: encoder::EncodeStats,
    /// SHA-256 of the old file (if `file-io` feature is enabled).
    pub old_sha256: Option<[u8; 32]>,
    /// SHA-256 of the new file (if `file-io` feature is enabled).
    pub new_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub old_size: u64,
    pub delta_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Records replayed.
    pub records: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file operations.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl From<ConfigError> for IoError {
    fn from(e: ConfigError) -> Self {
        Self::Encode(e.into())
    }
}

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// encode_file
// ---------------------------------------------------------------------------

/// Encode the delta from `old_path` to `new_path`, writing the container to
/// `delta_path`.
///
/// Both inputs are read into pooled blocks; the container is written through
/// a `BufWriter` as operations are produced.
pub fn encode_file(
    old_path: &Path,
    new_path: &Path,
    delta_path: &Path,
    opts: &DeltaOptions,
) -> Result<EncodeStats, IoError> {
    let encoder = DeltaEncoder::new(opts.clone())?;

    let mut old = Hashing::new(BufReader::with_capacity(BUF_SIZE, File::open(old_path)?));
    let mut new = Hashing::new(BufReader::with_capacity(BUF_SIZE, File::open(new_path)?));

    let delta_file = File::create(delta_path)?;
    let mut writer = RecordWriter::new(
        BufWriter::with_capacity(BUF_SIZE, delta_file),
        opts.window_size,
    )?;

    let matching = encoder.encode(&mut old, &mut new, &mut writer)?;
    let records = writer.records();
    let delta_size = writer.bytes_written();
    writer.finish()?;

    log::info!(
        "{} -> {}: {} bytes of delta in {records} records",
        old_path.display(),
        new_path.display(),
        delta_size
    );

    Ok(EncodeStats {
        old_size: matching.old_len,
        new_size: matching.new_len,
        delta_size,
        records,
        matching,
        old_sha256: old.digest(),
        new_sha256: new.digest(),
    })
}

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Rebuild the new file from `old_path` and the container at `delta_path`,
/// writing it to `output_path`.
///
/// The old file is held in pooled blocks for random access; the container is
/// streamed and ADD payloads go straight to the output.
pub fn decode_file(
    old_path: &Path,
    delta_path: &Path,
    output_path: &Path,
) -> Result<DecodeStats, IoError> {
    let old = BlockStore::read(
        BufReader::with_capacity(BUF_SIZE, File::open(old_path)?),
        DEFAULT_BLOCK_SIZE,
    )?;

    let delta_file = File::open(delta_path)?;
    let delta_size = delta_file.metadata()?.len();
    let reader = RecordReader::new(BufReader::with_capacity(BUF_SIZE, delta_file))?;

    let mut output = Hashing::new(BufWriter::with_capacity(
        BUF_SIZE,
        File::create(output_path)?,
    ));
    let applied = reader.apply_to(&old, &mut output)?;
    output.flush()?;

    Ok(DecodeStats {
        old_size: old.len(),
        delta_size,
        output_size: applied.output_len,
        records: applied.records,
        output_sha256: output.digest(),
    })
}

// ---------------------------------------------------------------------------
// Hashing adapter
// ---------------------------------------------------------------------------

/// Passes reads or writes through, feeding every byte to SHA-256 when the
/// `file-io` feature is enabled.
struct Hashing<T> {
    inner: T,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<T> Hashing<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    #[cfg(feature = "file-io")]
    fn digest(self) -> Option<[u8; 32]> {
        Some(self.hasher.finalize().into())
    }

    #[cfg(not(feature = "file-io"))]
    fn digest(self) -> Option<[u8; 32]> {
        None
    }

    #[cfg(feature = "file-io")]
    fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    #[cfg(not(feature = "file-io"))]
    fn update(&mut self, _bytes: &[u8]) {}
}

impl<R: Read> Read for Hashing<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.update(&buf[..n]);
        Ok(n)
    }
}

impl<W: Write> Write for Hashing<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
