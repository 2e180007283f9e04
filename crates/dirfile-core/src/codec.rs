//! Raw sample stream backends.
//!
//! Every RAW field stores its samples in one file beside the schema
//! documents. How those bytes are laid out is the business of a
//! [`SampleCodec`], selected by the owning fragment's [`Encoding`]. The
//! engine only ever sees a [`RawStream`]: a positioned, sample-addressed
//! reader/writer that speaks native byte order.
//!
//! Only the unencoded (plain binary) backend is built in. The other encodings
//! are recognized so that schemas naming them load, but reading or writing
//! such a field needs a backend registered with
//! [`CodecRegistry::register_codec`].

use std::{
    collections::HashMap,
    fmt,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use crate::{
    storage::{StorageError, StorageResult},
    types::{ByteOrder, ElementType},
};

/// Sample encoding of a fragment's raw files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Plain binary samples.
    #[default]
    None,
    /// Whitespace-separated text samples.
    Text,
    /// gzip-compressed binary.
    Gzip,
    /// bzip2-compressed binary.
    Bzip2,
    /// LZMA (xz) compressed binary.
    Lzma,
    /// FLAC-compressed integers.
    Flac,
    /// Sample-index encoding.
    Sie,
    /// Slim-compressed binary.
    Slim,
    /// zip archive member.
    Zzip,
    /// Slim-compressed zip archive member.
    Zzslim,
}

impl Encoding {
    /// Every encoding, in tag order.
    pub const ALL: [Encoding; 10] = [
        Encoding::None,
        Encoding::Text,
        Encoding::Gzip,
        Encoding::Bzip2,
        Encoding::Lzma,
        Encoding::Flac,
        Encoding::Sie,
        Encoding::Slim,
        Encoding::Zzip,
        Encoding::Zzslim,
    ];

    /// Keyword naming the encoding.
    pub const fn name(self) -> &'static str {
        match self {
            Encoding::None => "none",
            Encoding::Text => "text",
            Encoding::Gzip => "gzip",
            Encoding::Bzip2 => "bzip2",
            Encoding::Lzma => "lzma",
            Encoding::Flac => "flac",
            Encoding::Sie => "sie",
            Encoding::Slim => "slim",
            Encoding::Zzip => "zzip",
            Encoding::Zzslim => "zzslim",
        }
    }

    /// Parse an encoding keyword.
    pub fn parse_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name().eq_ignore_ascii_case(name))
    }

    /// Suffix appended to a raw field's file name.
    pub const fn suffix(self) -> &'static str {
        match self {
            Encoding::None => "",
            Encoding::Text => ".txt",
            Encoding::Gzip => ".gz",
            Encoding::Bzip2 => ".bz2",
            Encoding::Lzma => ".xz",
            Encoding::Flac => ".flac",
            Encoding::Sie => ".sie",
            Encoding::Slim => ".slm",
            Encoding::Zzip | Encoding::Zzslim => ".zip",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a registered backend can do with an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSupport {
    /// No backend is registered.
    None,
    /// Samples can be read but not written.
    ReadOnly,
    /// Samples can be read and written.
    ReadWrite,
}

/// Whether a stream is opened for reading only or for reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Reads only; a missing file is an error.
    Read,
    /// Reads and writes; a missing file is created.
    ReadWrite,
}

/// Everything a backend needs to open one raw field's stream.
#[derive(Debug, Clone)]
pub struct StreamSpec<'a> {
    /// Absolute path of the raw file, suffix included.
    pub path: &'a Path,
    /// Byte order of the samples on disk.
    pub byte_order: ByteOrder,
    /// Element type of the samples.
    pub data_type: ElementType,
    /// Access mode.
    pub mode: StreamMode,
}

/// An open raw sample stream.
///
/// Offsets and counts are in samples. Buffers are packed native-order
/// elements of the stream's data type.
pub trait RawStream: fmt::Debug + Send {
    /// Read up to `count` samples starting at sample `first`.
    ///
    /// A read running past the end of the stream returns the samples that
    /// exist; a read starting past the end returns an empty buffer.
    fn read(&mut self, first: u64, count: usize) -> StorageResult<Bytes>;

    /// Write packed samples starting at sample `first`.
    ///
    /// Writing past the current end extends the stream; any gap is filled
    /// with zero samples.
    fn write(&mut self, first: u64, data: &[u8]) -> StorageResult<()>;

    /// Number of complete samples in the stream.
    fn nsamples(&mut self) -> StorageResult<u64>;

    /// Commit buffered state to disk.
    fn sync(&mut self) -> StorageResult<()>;
}

/// A pluggable encoding backend.
pub trait SampleCodec: fmt::Debug + Send + Sync {
    /// The encoding this backend implements.
    fn encoding(&self) -> Encoding;

    /// Whether streams from this backend accept writes.
    fn writable(&self) -> bool {
        true
    }

    /// Open the stream described by `spec`.
    fn open(&self, spec: &StreamSpec<'_>) -> StorageResult<Box<dyn RawStream>>;
}

/// The built-in plain binary backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnencodedCodec;

impl SampleCodec for UnencodedCodec {
    fn encoding(&self) -> Encoding {
        Encoding::None
    }

    fn open(&self, spec: &StreamSpec<'_>) -> StorageResult<Box<dyn RawStream>> {
        let mut options = OpenOptions::new();
        options.read(true);
        if spec.mode == StreamMode::ReadWrite {
            options.write(true).create(true);
        }
        let file = options
            .open(spec.path)
            .map_err(|e| StorageError::from_io(spec.path, e))?;
        tracing::trace!(target: "dirfile", path = %spec.path.display(), mode = ?spec.mode, "opened raw file");
        Ok(Box::new(UnencodedStream {
            file,
            path: spec.path.to_path_buf(),
            width: spec.data_type.size() as u64,
            component: if spec.data_type.is_complex() {
                spec.data_type.size() / 2
            } else {
                spec.data_type.size()
            },
            byte_order: spec.byte_order,
        }))
    }
}

#[derive(Debug)]
struct UnencodedStream {
    file: File,
    path: PathBuf,
    width: u64,
    // complex elements swap each half separately
    component: usize,
    byte_order: ByteOrder,
}

impl UnencodedStream {
    fn io<T>(&self, result: std::io::Result<T>) -> StorageResult<T> {
        result.map_err(|e| StorageError::from_io(&self.path, e))
    }

    fn swap(&self, bytes: &mut [u8]) {
        if !self.byte_order.is_native() {
            ByteOrder::swap_in_place(bytes, self.component);
        }
    }
}

impl RawStream for UnencodedStream {
    fn read(&mut self, first: u64, count: usize) -> StorageResult<Bytes> {
        let total = self.nsamples()?;
        if first >= total || count == 0 {
            return Ok(Bytes::new());
        }
        let n = (total - first).min(count as u64);
        let mut buf = BytesMut::zeroed((n * self.width) as usize);
        let seek = self.file.seek(SeekFrom::Start(first * self.width));
        self.io(seek)?;
        let read = self.file.read_exact(&mut buf);
        self.io(read)?;
        self.swap(&mut buf);
        Ok(buf.freeze())
    }

    fn write(&mut self, first: u64, data: &[u8]) -> StorageResult<()> {
        let mut buf = data.to_vec();
        self.swap(&mut buf);
        let end = self.io(self.file.metadata().map(|m| m.len()))?;
        let start = first * self.width;
        if start > end {
            let grow = self.file.set_len(start);
            self.io(grow)?;
        }
        let seek = self.file.seek(SeekFrom::Start(start));
        self.io(seek)?;
        let write = self.file.write_all(&buf);
        self.io(write)
    }

    fn nsamples(&mut self) -> StorageResult<u64> {
        let len = self.io(self.file.metadata().map(|m| m.len()))?;
        Ok(len / self.width)
    }

    fn sync(&mut self) -> StorageResult<()> {
        let sync = self.file.sync_data();
        self.io(sync)
    }
}

/// Registered encoding backends.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<Encoding, Arc<dyn SampleCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        let mut registry = Self {
            codecs: HashMap::new(),
        };
        registry.register_codec(Arc::new(UnencodedCodec));
        registry
    }
}

impl CodecRegistry {
    /// Install `codec` for its encoding, replacing any previous backend.
    pub fn register_codec(&mut self, codec: Arc<dyn SampleCodec>) {
        tracing::debug!(target: "dirfile", encoding = %codec.encoding(), "registered codec");
        self.codecs.insert(codec.encoding(), codec);
    }

    /// The backend for `encoding`, if one is registered.
    pub fn get(&self, encoding: Encoding) -> Option<&Arc<dyn SampleCodec>> {
        self.codecs.get(&encoding)
    }

    /// Report read/write availability for `encoding`.
    pub fn encoding_support(&self, encoding: Encoding) -> EncodingSupport {
        match self.codecs.get(&encoding) {
            None => EncodingSupport::None,
            Some(codec) if codec.writable() => EncodingSupport::ReadWrite,
            Some(_) => EncodingSupport::ReadOnly,
        }
    }
}

/// File name of a raw field's samples: the field name plus the encoding suffix.
pub fn raw_file_name(field: &str, encoding: Encoding) -> String {
    format!("{field}{}", encoding.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sample, sample::encode_slice};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn open(dir: &TempDir, order: ByteOrder, ty: ElementType, mode: StreamMode) -> StorageResult<Box<dyn RawStream>> {
        let path = dir.path().join("data");
        UnencodedCodec.open(&StreamSpec {
            path: &path,
            byte_order: order,
            data_type: ty,
            mode,
        })
    }

    #[test]
    fn reads_are_short_at_end_of_stream() -> TestResult {
        let dir = TempDir::new()?;
        let mut s = open(&dir, ByteOrder::native(), ElementType::Int16, StreamMode::ReadWrite)?;
        s.write(0, &encode_slice(&[1i16, 2, 3], ByteOrder::native()))?;
        assert_eq!(s.nsamples()?, 3);
        assert_eq!(s.read(1, 10)?.len(), 4);
        assert!(s.read(5, 1)?.is_empty());
        Ok(())
    }

    #[test]
    fn writes_past_end_fill_with_zeros() -> TestResult {
        let dir = TempDir::new()?;
        let mut s = open(&dir, ByteOrder::native(), ElementType::Uint8, StreamMode::ReadWrite)?;
        s.write(4, &[9, 9])?;
        assert_eq!(&s.read(0, 6)?[..], &[0, 0, 0, 0, 9, 9]);
        Ok(())
    }

    #[test]
    fn non_native_order_is_swapped_on_disk() -> TestResult {
        let dir = TempDir::new()?;
        let mut s = open(&dir, ByteOrder::non_native(), ElementType::Uint32, StreamMode::ReadWrite)?;
        s.write(0, &0x0102_0304u32.to_ne_bytes())?;
        s.sync()?;
        let on_disk = std::fs::read(dir.path().join("data"))?;
        assert_eq!(on_disk, 0x0102_0304u32.swap_bytes().to_ne_bytes());
        let back = s.read(0, 1)?;
        assert_eq!(u32::read_bytes(&back, ByteOrder::native()), 0x0102_0304);
        Ok(())
    }

    #[test]
    fn complex_components_swap_separately() -> TestResult {
        let dir = TempDir::new()?;
        let mut s = open(&dir, ByteOrder::non_native(), ElementType::Complex64, StreamMode::ReadWrite)?;
        s.write(0, &encode_slice(&[crate::types::Complex::new(1.5f32, -2.0)], ByteOrder::native()))?;
        let on_disk = std::fs::read(dir.path().join("data"))?;
        assert_eq!(&on_disk[..4], &1.5f32.to_bits().swap_bytes().to_ne_bytes());
        Ok(())
    }

    #[test]
    fn read_mode_requires_the_file() -> TestResult {
        let dir = TempDir::new()?;
        let err = open(&dir, ByteOrder::native(), ElementType::Int8, StreamMode::Read).unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[test]
    fn registry_reports_support() {
        let registry = CodecRegistry::default();
        assert_eq!(registry.encoding_support(Encoding::None), EncodingSupport::ReadWrite);
        assert_eq!(registry.encoding_support(Encoding::Gzip), EncodingSupport::None);
        assert_eq!(Encoding::parse_name("GZIP"), Some(Encoding::Gzip));
        assert_eq!(raw_file_name("data", Encoding::Gzip), "data.gz");
    }
}
