//! Ingestion orchestrator
//!
//! A [`CsvParser`] drives one run: sniff the delimiter if needed, scan the source
//! for types, re-read it into backend tables, then merge and bind the result.
//!
//! ```text
//! Idle -> Scanning -> Ingesting -> Completing -> Done
//!            \            \            \
//!             `------------`------------`---> Canceled | Failed
//! ```

use super::builder::{BuildOutcome, TableBuilder};
use super::consolidate::DEFAULT_CONSOLIDATE_THRESHOLD;
use super::state::{CancelToken, RunState};
use crate::backend::BackendSession;
use crate::error::{IngestError, Result};
use crate::format::FormatDescriptor;
use crate::progress::ProgressModel;
use crate::schema::scan_types;
use crate::source::{ByteSource, ChunkedReader, SourceKind, SAMPLE_BYTES};
use crate::types::TableSchema;
use tracing::{debug, info, warn};

/// Bytes per chunk for plain sources
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Bytes per chunk for archive entries, roughly what a decompressor emits at once
pub const DEFAULT_ARCHIVE_CHUNK_SIZE: usize = 16 * 1024;

/// Settings for one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Whether the first row names the columns
    pub read_headers: bool,

    /// Passed through to every table the backend creates
    pub time_zone: String,

    pub chunk_size: usize,

    pub archive_chunk_size: usize,

    /// Archive chunks merged into one upload
    pub consolidate_threshold: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            read_headers: true,
            time_zone: "UTC".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            archive_chunk_size: DEFAULT_ARCHIVE_CHUNK_SIZE,
            consolidate_threshold: DEFAULT_CONSOLIDATE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Idle,
    Scanning,
    Ingesting,
    Completing,
    Done,
    Canceled,
    Failed,
}

/// Callbacks for the caller of a run.
///
/// All methods have no-op defaults.
pub trait IngestListener<T> {
    /// Overall progress, 0-100 and never decreasing. Return `true` to cancel.
    fn on_progress(&mut self, _percent: u8) -> bool {
        false
    }

    /// The run failed; every table it created has been closed
    fn on_error(&mut self, _error: &IngestError) {}

    /// Every chunk has been uploaded. `tables` are the per-chunk handles in file
    /// order, before they are merged and bound.
    fn on_file_completed(&mut self, _tables: &[T]) {}
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl<T> IngestListener<T> for NoopListener {}

/// Result of a successful run
#[derive(Debug)]
pub struct IngestSummary<T> {
    /// The bound table
    pub table: T,
    pub table_name: String,
    pub schema: TableSchema,
    /// Data rows uploaded
    pub rows: usize,
    /// Tables created before merging
    pub chunks: usize,
    /// Whether the per-chunk tables had to be merged
    pub merged: bool,
}

#[derive(Debug)]
pub enum ParseOutcome<T> {
    Completed(IngestSummary<T>),
    /// Stopped on request. Nothing was bound and no table is left open.
    Canceled,
}

impl<T> ParseOutcome<T> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, ParseOutcome::Canceled)
    }

    pub fn completed(self) -> Option<IngestSummary<T>> {
        match self {
            ParseOutcome::Completed(summary) => Some(summary),
            ParseOutcome::Canceled => None,
        }
    }
}

/// Turns one delimited-text source into a table bound under `table_name`
pub struct CsvParser<'a, S: BackendSession, L = NoopListener> {
    session: &'a S,
    source: Box<dyn ByteSource + 'a>,
    format: FormatDescriptor,
    table_name: String,
    options: IngestOptions,
    listener: L,
    cancel: CancelToken,
    state: ParserState,
}

impl<'a, S: BackendSession> CsvParser<'a, S, NoopListener> {
    pub fn new(
        session: &'a S,
        source: impl ByteSource + 'a,
        format: FormatDescriptor,
        table_name: impl Into<String>,
    ) -> Self {
        CsvParser {
            session,
            source: Box::new(source),
            format,
            table_name: table_name.into(),
            options: IngestOptions::default(),
            listener: NoopListener,
            cancel: CancelToken::new(),
            state: ParserState::Idle,
        }
    }
}

impl<'a, S, L> CsvParser<'a, S, L>
where
    S: BackendSession,
    L: IngestListener<S::Table>,
{
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_listener<M: IngestListener<S::Table>>(self, listener: M) -> CsvParser<'a, S, M> {
        CsvParser {
            session: self.session,
            source: self.source,
            format: self.format,
            table_name: self.table_name,
            options: self.options,
            listener,
            cancel: self.cancel,
            state: self.state,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn into_listener(self) -> L {
        self.listener
    }

    /// Request cancellation; honored at the next chunk boundary
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run from elsewhere
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run both passes and bind the result.
    ///
    /// Errors are also reported to the listener's `on_error`. A parser runs once.
    pub async fn parse(&mut self) -> Result<ParseOutcome<S::Table>> {
        if self.state != ParserState::Idle {
            return Err(IngestError::AlreadyStarted);
        }
        info!(source = %self.source.name(), table = %self.table_name, "Starting ingestion");

        let result = self.run().await;
        match &result {
            Ok(ParseOutcome::Completed(summary)) => {
                self.state = ParserState::Done;
                info!(
                    table = %summary.table_name,
                    rows = summary.rows,
                    chunks = summary.chunks,
                    "Ingestion complete"
                );
            }
            Ok(ParseOutcome::Canceled) => {
                self.state = ParserState::Canceled;
                warn!(source = %self.source.name(), "Ingestion canceled");
            }
            Err(err) => {
                self.state = ParserState::Failed;
                warn!(source = %self.source.name(), error = %err, "Ingestion failed");
                self.listener.on_error(err);
            }
        }
        result
    }

    async fn run(&mut self) -> Result<ParseOutcome<S::Table>> {
        let format = if self.format.needs_delimiter_detection() {
            let sample = self.source.sample(SAMPLE_BYTES)?;
            let format = self.format.clone().resolved(&sample);
            debug!(delimiter = ?format.delimiter, "Detected delimiter");
            format
        } else {
            self.format.clone()
        };

        let kind = self.source.kind()?;
        let chunk_size = match kind {
            SourceKind::Plain { .. } => self.options.chunk_size,
            SourceKind::Archive => self.options.archive_chunk_size,
        };
        let model = ProgressModel::new(kind, chunk_size);
        let read_headers = self.options.read_headers;
        let mut run: RunState<S::Table> = RunState::new(self.cancel.clone());

        self.state = ParserState::Scanning;
        let schema = {
            let mut reader = ChunkedReader::open(self.source.as_ref(), &format, chunk_size)?;
            let listener = &mut self.listener;
            let cancel = &self.cancel;
            let schema = scan_types(&mut reader, &format, read_headers, model, &mut |percent| {
                if listener.on_progress(run.advance(percent)) {
                    cancel.cancel();
                }
                cancel.is_canceled()
            })?;
            match schema {
                Some(schema) => schema,
                None => return Ok(ParseOutcome::Canceled),
            }
        };
        debug!(columns = schema.num_columns(), types = ?schema.types, "Scan complete");

        if self.cancel.is_canceled() {
            return Ok(ParseOutcome::Canceled);
        }

        self.state = ParserState::Ingesting;
        let mut reader = ChunkedReader::open(self.source.as_ref(), &format, chunk_size)?;
        let builder = TableBuilder::new(
            self.session,
            &format,
            &schema,
            read_headers,
            &self.options.time_zone,
            model,
            self.options.consolidate_threshold,
        );
        let listener = &mut self.listener;
        let outcome = builder
            .run(&mut reader, &mut run, &mut |percent| listener.on_progress(percent))
            .await?;
        if outcome == BuildOutcome::Canceled {
            return Ok(ParseOutcome::Canceled);
        }

        self.state = ParserState::Completing;
        let rows = run.rows();
        let handles = run.take_handles();
        if self.cancel.is_canceled() {
            close_each(self.session, handles);
            return Ok(ParseOutcome::Canceled);
        }
        self.listener.on_file_completed(&handles);

        let chunks = handles.len();
        let table = self.finalize(handles).await?;
        Ok(ParseOutcome::Completed(IngestSummary {
            table,
            table_name: self.table_name.clone(),
            schema,
            rows,
            chunks,
            merged: chunks > 1,
        }))
    }

    /// Merge the per-chunk tables if there are several, then bind. Every handle
    /// except the bound one is closed, on success and on failure.
    async fn finalize(&self, mut handles: Vec<S::Table>) -> Result<S::Table> {
        let session = self.session;

        let single = if handles.len() == 1 { handles.pop() } else { None };
        let table = match single {
            Some(table) => table,
            None => match session.merge_tables(&handles).await {
                Ok(merged) => {
                    debug!(parts = handles.len(), "Merged tables");
                    merged
                }
                Err(err) => {
                    close_each(session, handles);
                    return Err(IngestError::backend("mergeTables", err));
                }
            },
        };

        if let Err(err) = session.bind_table_to_variable(&table, &self.table_name).await {
            session.close_table(table);
            close_each(session, handles);
            return Err(IngestError::backend("bindTableToVariable", err));
        }

        close_each(session, handles);
        Ok(table)
    }
}

fn close_each<S: BackendSession + ?Sized>(session: &S, tables: Vec<S::Table>) {
    for table in tables {
        session.close_table(table);
    }
}
