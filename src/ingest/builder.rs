//! Data ingestion pass
//!
//! Re-reads the source with the schema from the type scan, turns every chunk into a
//! column batch and uploads it as one backend table. Archive entries go through a
//! [`ChunkConsolidator`] first. The reader is paused while a create call is
//! outstanding.

use super::consolidate::ChunkConsolidator;
use super::state::RunState;
use super::transpose::transpose;
use crate::backend::BackendSession;
use crate::error::{IngestError, Result};
use crate::format::FormatDescriptor;
use crate::progress::{Pass, ProgressModel};
use crate::source::ChunkedReader;
use crate::types::{ColumnBatch, TableSchema};
use tracing::{debug, warn};

/// How the ingestion pass ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Every chunk has a table handle in the run state
    Completed,
    /// Stopped on request; no handles are left open
    Canceled,
}

pub struct TableBuilder<'a, S: BackendSession + ?Sized> {
    session: &'a S,
    format: &'a FormatDescriptor,
    schema: &'a TableSchema,
    read_headers: bool,
    time_zone: &'a str,
    progress: ProgressModel,
    consolidate_threshold: usize,
}

impl<'a, S: BackendSession + ?Sized> TableBuilder<'a, S> {
    pub fn new(
        session: &'a S,
        format: &'a FormatDescriptor,
        schema: &'a TableSchema,
        read_headers: bool,
        time_zone: &'a str,
        progress: ProgressModel,
        consolidate_threshold: usize,
    ) -> Self {
        TableBuilder {
            session,
            format,
            schema,
            read_headers,
            time_zone,
            progress,
            consolidate_threshold,
        }
    }

    /// Stream `reader` into backend tables recorded in `state`.
    ///
    /// `on_progress` gets the overall percentage (50-100 for this pass) and returns
    /// `true` to cancel. On failure or cancellation the reader is aborted and every
    /// handle in `state` is closed before returning.
    pub async fn run(
        &self,
        reader: &mut ChunkedReader,
        state: &mut RunState<S::Table>,
        on_progress: &mut dyn FnMut(u8) -> bool,
    ) -> Result<BuildOutcome> {
        let result = self.ingest(reader, state, on_progress).await;

        if !matches!(result, Ok(BuildOutcome::Completed)) {
            reader.abort();
            let open = state.handles_created();
            state.close_all(self.session);
            match &result {
                Ok(_) => warn!(closed = open, "Ingestion canceled"),
                Err(err) => warn!(closed = open, error = %err, "Ingestion failed"),
            }
        }
        result
    }

    async fn ingest(
        &self,
        reader: &mut ChunkedReader,
        state: &mut RunState<S::Table>,
        on_progress: &mut dyn FnMut(u8) -> bool,
    ) -> Result<BuildOutcome> {
        let num_columns = self.schema.num_columns();
        let mut consolidator = reader
            .is_archive()
            .then(|| ChunkConsolidator::new(self.consolidate_threshold));
        let mut header_pending = self.read_headers;

        loop {
            if state.is_canceled() {
                return Ok(BuildOutcome::Canceled);
            }

            let Some(mut rows) = reader.next_chunk()? else {
                break;
            };
            if header_pending {
                rows.remove(0);
                header_pending = false;
            }

            let batch = transpose(&rows, num_columns, self.format)?;
            let ready = match consolidator.as_mut() {
                Some(consolidator) if !batch.is_empty() => consolidator.push(batch),
                Some(_) => None,
                None => Some(batch),
            };
            if let Some(batch) = ready {
                if self.create(reader, state, batch).await? == BuildOutcome::Canceled {
                    return Ok(BuildOutcome::Canceled);
                }
            }

            let percent = self
                .progress
                .percent(Pass::Ingest, reader.chunks_read(), reader.archive_percent());
            let percent = state.advance(percent);
            debug!(chunk = reader.chunks_read(), rows = rows.len(), percent, "Ingested chunk");
            if on_progress(percent) {
                state.cancel_token().cancel();
            }
        }

        if let Some(rest) = consolidator.as_mut().and_then(ChunkConsolidator::finish) {
            if self.create(reader, state, rest).await? == BuildOutcome::Canceled {
                return Ok(BuildOutcome::Canceled);
            }
        }

        if state.chunks_dispatched() == 0 {
            // Header row only: still produce a table, with no rows
            let empty = ColumnBatch::empty(num_columns);
            if self.upload(reader, state, empty).await? == BuildOutcome::Canceled {
                return Ok(BuildOutcome::Canceled);
            }
        }

        debug_assert!(state.all_resolved());
        on_progress(state.advance(100));
        Ok(BuildOutcome::Completed)
    }

    /// Upload one batch unless it has no rows
    async fn create(
        &self,
        reader: &mut ChunkedReader,
        state: &mut RunState<S::Table>,
        batch: ColumnBatch,
    ) -> Result<BuildOutcome> {
        if batch.is_empty() {
            return Ok(BuildOutcome::Completed);
        }
        self.upload(reader, state, batch).await
    }

    async fn upload(
        &self,
        reader: &mut ChunkedReader,
        state: &mut RunState<S::Table>,
        batch: ColumnBatch,
    ) -> Result<BuildOutcome> {
        if state.is_canceled() {
            return Ok(BuildOutcome::Canceled);
        }

        let rows = batch.num_rows();
        let index = state.dispatch(rows);

        reader.pause();
        let table = self
            .session
            .create_table(&self.schema.headers, &self.schema.types, batch, self.time_zone)
            .await
            .map_err(|err| IngestError::backend("createTable", err))?;

        if state.is_canceled() {
            // Canceled while the call was in flight; the result is discarded
            self.session.close_table(table);
            return Ok(BuildOutcome::Canceled);
        }
        reader.resume();

        debug!(index, rows, "Created table");
        state.record(index, table);
        Ok(BuildOutcome::Completed)
    }
}
