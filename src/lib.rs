//! # Kiln - Delimited Text to Typed Tables
//!
//! A two-pass, streaming ingestion engine that turns a CSV-like file (plain, zipped,
//! or pasted) into typed, column-oriented tables in a table backend.
//!
//! ## Modules
//!
//! - **schema**: the column type lattice and the type inference pass
//! - **ingest**: transpose, chunk consolidation, table creation and the orchestrator
//! - **source**: rewindable byte sources and the chunked reader
//! - **format** / **headers**: format catalog, header legalization and generation
//! - **backend**: the backend session contract and an in-process implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use kiln::{CsvParser, FormatKind, LocalTableStore, TextSource};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let store = LocalTableStore::new();
//! let source = TextSource::pasted("id,price\n1,2.5\n2,3.75\n");
//!
//! let mut parser = CsvParser::new(&store, source, FormatKind::DefaultCsv.descriptor(), "prices");
//! let outcome = parser.parse().await?;
//!
//! // One chunk, so the table was bound without a merge
//! assert!(!outcome.is_canceled());
//! assert_eq!(store.variable("prices").unwrap().num_rows(), 2);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod format;
pub mod headers;
pub mod ingest;
pub mod progress;
pub mod schema;
pub mod source;
pub mod types;

// Re-export commonly used types for convenience
pub use backend::{BackendSession, LocalTable, LocalTableStore};
pub use error::{IngestError, Result};
pub use format::{FormatDescriptor, FormatKind};
pub use ingest::{CancelToken, CsvParser, IngestListener, IngestOptions, IngestSummary, ParseOutcome};
pub use schema::determine_type;
pub use source::{ByteSource, FileSource, TextSource, ZipEntrySource};
pub use types::{ColumnBatch, ColumnType, TableSchema};
