//! Progress of a two-pass run.
//!
//! The type scan covers 0-50% and the data ingestion 50-100%. Within a pass,
//! progress is measured in chunks when the source size is known up front, and by
//! the decompressor's own percentage otherwise.

use crate::source::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Scan,
    Ingest,
}

impl Pass {
    fn offset(self) -> f64 {
        match self {
            Pass::Scan => 0.0,
            Pass::Ingest => 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressModel {
    /// Expected chunk count, when the source length is known
    total_chunks: Option<usize>,
}

impl ProgressModel {
    pub fn new(kind: SourceKind, chunk_size: usize) -> Self {
        let total_chunks = match kind {
            SourceKind::Plain { len } => {
                let chunk_size = chunk_size.max(1) as u64;
                Some(len.div_ceil(chunk_size).max(1) as usize)
            }
            SourceKind::Archive => None,
        };
        ProgressModel { total_chunks }
    }

    pub fn total_chunks(&self) -> Option<usize> {
        self.total_chunks
    }

    /// Overall percentage after `chunks_done` chunks of `pass`.
    /// `archive_percent` is only used when the chunk total is unknown.
    pub fn percent(&self, pass: Pass, chunks_done: usize, archive_percent: f64) -> u8 {
        let within = match self.total_chunks {
            Some(total) => (chunks_done as f64 / total as f64) * 50.0,
            None => archive_percent / 2.0,
        };
        (pass.offset() + within.clamp(0.0, 50.0)).round() as u8
    }
}
