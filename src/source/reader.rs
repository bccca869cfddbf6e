//! Chunked, pausable tokenizer over a [`ByteSource`]

use super::{ArchiveProgress, ByteSource};
use crate::error::{IngestError, Result};
use crate::format::FormatDescriptor;
use crate::types::RowBatch;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Reading,
    /// Waiting on the consumer; no chunk may be requested
    Paused,
    /// Stopped early by the consumer
    Aborted,
    /// End of stream reached
    Finished,
}

/// Tokenizes a source into row batches of roughly `chunk_size` bytes each.
///
/// The consumer pulls chunks one at a time. While a chunk is being handed to the
/// backend the consumer pauses the reader, so at most one chunk is materialized
/// beyond the one being processed.
pub struct ChunkedReader {
    records: csv::Reader<Box<dyn Read + Send>>,
    record: csv::ByteRecord,
    skip_blank_records: bool,
    chunk_size: u64,
    progress: Option<ArchiveProgress>,
    state: ReaderState,
    chunks_read: usize,
}

impl ChunkedReader {
    /// Open `source` from the start
    pub fn open(source: &dyn ByteSource, format: &FormatDescriptor, chunk_size: usize) -> Result<Self> {
        let stream = source.open()?;
        let records = format.csv_builder()?.from_reader(stream.reader);

        Ok(ChunkedReader {
            records,
            record: csv::ByteRecord::new(),
            skip_blank_records: format.skip_empty_lines,
            chunk_size: chunk_size.max(1) as u64,
            progress: stream.progress,
            state: ReaderState::Reading,
            chunks_read: 0,
        })
    }

    /// Next batch of rows, or `None` once the stream is finished or aborted
    pub fn next_chunk(&mut self) -> Result<Option<RowBatch>> {
        match self.state {
            ReaderState::Paused => return Err(IngestError::ReaderPaused),
            ReaderState::Aborted | ReaderState::Finished => return Ok(None),
            ReaderState::Reading => {}
        }

        let chunk_start = self.records.position().byte();
        let mut rows = RowBatch::new();

        loop {
            if !self.records.read_byte_record(&mut self.record)? {
                self.state = ReaderState::Finished;
                break;
            }
            if self.skip_blank_records && is_blank(&self.record) {
                continue;
            }
            // Bytes that are not UTF-8 become U+FFFD rather than failing the run
            rows.push(
                self.record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            );

            if self.records.position().byte() - chunk_start >= self.chunk_size {
                break;
            }
        }

        if rows.is_empty() {
            return Ok(None);
        }
        self.chunks_read += 1;
        Ok(Some(rows))
    }

    pub fn pause(&mut self) {
        if self.state == ReaderState::Reading {
            self.state = ReaderState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == ReaderState::Paused {
            self.state = ReaderState::Reading;
        }
    }

    /// Stop reading; later requests return `None`
    pub fn abort(&mut self) {
        if self.state != ReaderState::Finished {
            self.state = ReaderState::Aborted;
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Whether the whole source has been read
    pub fn is_finished(&self) -> bool {
        self.state == ReaderState::Finished
    }

    pub fn is_archive(&self) -> bool {
        self.progress.is_some()
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Decompression progress of an archive entry, 0 for plain sources
    pub fn archive_percent(&self) -> f64 {
        match (&self.progress, self.state) {
            (Some(_), ReaderState::Finished) => 100.0,
            (Some(progress), _) => progress.percent(),
            (None, _) => 0.0,
        }
    }
}

fn is_blank(record: &csv::ByteRecord) -> bool {
    record.len() == 1 && record[0].iter().all(u8::is_ascii_whitespace)
}
