use thiserror::Error;

/// Errors that end an ingestion run
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Error parsing CSV: no data in file.")]
    NoData,

    /// A row had fewer cells than the established column count
    #[error("Error parsing CSV: Insufficient columns. Expected {expected} but found {found}\n{row}")]
    InsufficientColumns {
        expected: usize,
        found: usize,
        row: String,
    },

    #[error("Error parsing CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("No csv file found in {archive}")]
    NoDelimitedEntry { archive: String },

    #[error("Unsupported compression in archive entry {entry}")]
    UnsupportedCompression { entry: String },

    #[error("Backend {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Chunk requested while the reader is paused")]
    ReaderPaused,

    #[error("Parser has already been started")]
    AlreadyStarted,
}

impl IngestError {
    pub(crate) fn insufficient_columns(expected: usize, row: &[String]) -> Self {
        IngestError::InsufficientColumns {
            expected,
            found: row.len(),
            row: row.join(","),
        }
    }

    pub(crate) fn backend(operation: &'static str, source: anyhow::Error) -> Self {
        IngestError::Backend { operation, source }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
