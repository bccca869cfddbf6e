//! Rewindable byte sources
//!
//! Both passes read the same source from the start, so a source is something that
//! can be opened any number of times. Plain sources know their length up front;
//! archive entries report a decompression percentage instead.

pub mod reader;

pub use reader::ChunkedReader;

use crate::error::{IngestError, Result};
use std::fs::File;
use flate2::CrcReader;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use zip::{CompressionMethod, ZipArchive};

/// Extensions of archive entries that hold delimited text
pub const DELIMITED_EXTENSIONS: &[&str] = &[".csv", ".tsv", ".tab", ".psv", ".dsv", ".txt"];

/// Bytes read when sampling a source for delimiter detection
pub const SAMPLE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Length in bytes is known before reading
    Plain { len: u64 },
    /// A compressed archive entry; progress comes from the decompressor
    Archive,
}

/// A source that can be read from the start any number of times
pub trait ByteSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> String;

    fn kind(&self) -> Result<SourceKind>;

    /// Open a fresh stream positioned at the first byte
    fn open(&self) -> Result<SourceStream>;

    /// Up to `max_bytes` of leading text, lossily decoded
    fn sample(&self, max_bytes: usize) -> Result<String> {
        let stream = self.open()?;
        let mut buf = Vec::with_capacity(max_bytes.min(SAMPLE_BYTES));
        stream.reader.take(max_bytes as u64).read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn kind(&self) -> Result<SourceKind> {
        (**self).kind()
    }

    fn open(&self) -> Result<SourceStream> {
        (**self).open()
    }
}

/// An open stream, plus decompression progress for archive entries
pub struct SourceStream {
    pub reader: Box<dyn Read + Send>,
    pub progress: Option<ArchiveProgress>,
}

impl SourceStream {
    pub fn plain(reader: impl Read + Send + 'static) -> Self {
        SourceStream {
            reader: Box::new(reader),
            progress: None,
        }
    }
}

/// Shared view of how much of a compressed entry has been consumed
#[derive(Debug, Clone)]
pub struct ArchiveProgress {
    consumed: Arc<AtomicU64>,
    total: u64,
}

impl ArchiveProgress {
    fn new(total: u64) -> Self {
        ArchiveProgress {
            consumed: Arc::new(AtomicU64::new(0)),
            total,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        let consumed = self.consumed.load(Ordering::Relaxed).min(self.total);
        consumed as f64 * 100.0 / self.total as f64
    }
}

/// Counts bytes as they are pulled through
struct CountingReader<R> {
    inner: R,
    consumed: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Verifies an archive entry's CRC-32 once its data is exhausted
struct ChecksumReader<R> {
    inner: CrcReader<R>,
    expected: u32,
    entry: String,
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.inner.crc().sum() != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("checksum mismatch in archive entry {}", self.entry),
            ));
        }
        Ok(n)
    }
}

/// A delimited-text file on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn kind(&self) -> Result<SourceKind> {
        let len = std::fs::metadata(&self.path)?.len();
        Ok(SourceKind::Plain { len })
    }

    fn open(&self) -> Result<SourceStream> {
        let file = File::open(&self.path)?;
        Ok(SourceStream::plain(BufReader::new(file)))
    }
}

/// Text held in memory, e.g. pasted values
#[derive(Debug, Clone)]
pub struct TextSource {
    name: String,
    bytes: Arc<[u8]>,
}

impl TextSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        TextSource {
            name: name.into(),
            bytes: Arc::from(text.into().into_bytes()),
        }
    }

    /// Pasted text, named the way the upload dialog names it
    pub fn pasted(text: impl Into<String>) -> Self {
        TextSource::new("pasted values", text)
    }
}

impl ByteSource for TextSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn kind(&self) -> Result<SourceKind> {
        Ok(SourceKind::Plain {
            len: self.bytes.len() as u64,
        })
    }

    fn open(&self) -> Result<SourceStream> {
        Ok(SourceStream::plain(Cursor::new(Arc::clone(&self.bytes))))
    }
}

/// One entry of a zip archive on disk
#[derive(Debug, Clone)]
pub struct ZipEntrySource {
    archive: PathBuf,
    entry: String,
}

impl ZipEntrySource {
    pub fn new(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        ZipEntrySource {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    /// Use the first entry of the archive that looks like delimited text
    pub fn first_delimited(archive: impl Into<PathBuf>) -> Result<Self> {
        let archive = archive.into();
        let zip = ZipArchive::new(BufReader::new(File::open(&archive)?))?;

        let entry = zip
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter(|name| is_delimited_name(name))
            .min_by_key(|name| zip.index_for_name(name))
            .map(str::to_string);

        match entry {
            Some(entry) => Ok(ZipEntrySource::new(archive, entry)),
            None => Err(IngestError::NoDelimitedEntry {
                archive: archive.display().to_string(),
            }),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl ByteSource for ZipEntrySource {
    fn name(&self) -> String {
        format!("{}!{}", self.archive.display(), self.entry)
    }

    fn kind(&self) -> Result<SourceKind> {
        Ok(SourceKind::Archive)
    }

    fn open(&self) -> Result<SourceStream> {
        // Locate the entry's compressed bytes through the central directory, then
        // stream them from a separate handle so the reader owns its file.
        let (data_start, compressed_size, method, crc32) = {
            let mut zip = ZipArchive::new(BufReader::new(File::open(&self.archive)?))?;
            let entry = zip.by_name(&self.entry)?;
            (entry.data_start(), entry.compressed_size(), entry.compression(), entry.crc32())
        };

        let mut file = File::open(&self.archive)?;
        file.seek(SeekFrom::Start(data_start))?;

        let progress = ArchiveProgress::new(compressed_size);
        let counted = CountingReader {
            inner: BufReader::new(file).take(compressed_size),
            consumed: Arc::clone(&progress.consumed),
        };

        let inflated: Box<dyn Read + Send> = match method {
            CompressionMethod::Stored => Box::new(counted),
            CompressionMethod::Deflated => Box::new(flate2::read::DeflateDecoder::new(counted)),
            _ => {
                return Err(IngestError::UnsupportedCompression {
                    entry: self.entry.clone(),
                })
            }
        };
        let reader = ChecksumReader {
            inner: CrcReader::new(inflated),
            expected: crc32,
            entry: self.entry.clone(),
        };

        Ok(SourceStream {
            reader: Box::new(reader),
            progress: Some(progress),
        })
    }
}

/// Source for a path on disk. Zip archives are read through `entry`, or their first
/// delimited entry when none is named. Also returns the name of the delimited file
/// itself, for picking a format by extension.
pub fn path_source(path: &Path, entry: Option<&str>) -> Result<(Box<dyn ByteSource>, String)> {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

    if is_zip {
        let source = match entry {
            Some(entry) => ZipEntrySource::new(path, entry),
            None => ZipEntrySource::first_delimited(path)?,
        };
        let name = source.entry().to_string();
        return Ok((Box::new(source), name));
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((Box::new(FileSource::new(path)), name))
}

/// Whether a file name has one of the delimited-text extensions
pub fn is_delimited_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    DELIMITED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
