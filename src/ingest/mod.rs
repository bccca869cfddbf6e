//! Data ingestion: rows to columns to backend tables

pub mod builder;
pub mod consolidate;
pub mod parser;
pub mod state;
pub mod transpose;

pub use builder::{BuildOutcome, TableBuilder};
pub use consolidate::{ChunkConsolidator, DEFAULT_CONSOLIDATE_THRESHOLD};
pub use parser::{
    CsvParser, IngestListener, IngestOptions, IngestSummary, NoopListener, ParseOutcome, ParserState,
};
pub use state::{CancelToken, RunState};
pub use transpose::transpose;
