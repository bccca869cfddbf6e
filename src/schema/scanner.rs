//! Type inference pass
//!
//! Streams a source once and accumulates one [`ColumnType`] per column. The column
//! count comes from the first row; when the file has a header row it names the
//! columns and is left out of type analysis.

use super::lattice::determine_type;
use crate::error::{IngestError, Result};
use crate::format::FormatDescriptor;
use crate::headers::resolve_headers;
use crate::progress::{Pass, ProgressModel};
use crate::source::ChunkedReader;
use crate::types::{ColumnType, TableSchema};
use tracing::debug;

/// Accumulates column types across the rows of a file
#[derive(Debug)]
pub struct TypeScanner {
    format: FormatDescriptor,
    read_headers: bool,
    headers: Option<Vec<String>>,
    types: Vec<ColumnType>,
    rows_scanned: usize,
}

impl TypeScanner {
    pub fn new(format: FormatDescriptor, read_headers: bool) -> Self {
        TypeScanner {
            format,
            read_headers,
            headers: None,
            types: Vec::new(),
            rows_scanned: 0,
        }
    }

    /// Feed one chunk of rows, in file order
    pub fn add_chunk(&mut self, rows: &[Vec<String>]) -> Result<()> {
        let mut rows = rows;
        if self.headers.is_none() {
            let Some(first) = rows.first() else {
                return Ok(());
            };
            self.headers = Some(resolve_headers(first, self.read_headers));
            self.types = vec![ColumnType::Unknown; first.len()];
            if self.read_headers {
                rows = &rows[1..];
            }
        }

        for row in rows {
            self.add_row(row)?;
        }
        Ok(())
    }

    fn add_row(&mut self, row: &[String]) -> Result<()> {
        if row.len() < self.types.len() {
            return Err(IngestError::insufficient_columns(self.types.len(), row));
        }

        let null_string = self.format.null_string();
        for (ty, cell) in self.types.iter_mut().zip(row) {
            *ty = determine_type(self.format.clean(cell), *ty, null_string);
        }
        self.rows_scanned += 1;
        Ok(())
    }

    /// Types seen so far, before finalization
    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    pub fn rows_scanned(&self) -> usize {
        self.rows_scanned
    }

    /// Finish the scan. Columns that only ever held nulls become strings.
    pub fn build(self) -> Result<TableSchema> {
        let headers = self.headers.ok_or(IngestError::NoData)?;
        let types = self.types.into_iter().map(ColumnType::finalized).collect();
        Ok(TableSchema::new(headers, types))
    }
}

/// Run the type inference pass over `reader`.
///
/// `on_progress` receives the overall percentage (0-50 for this pass) after each
/// chunk and returns `true` to cancel. A canceled scan aborts the reader and yields
/// `None`.
pub fn scan_types(
    reader: &mut ChunkedReader,
    format: &FormatDescriptor,
    read_headers: bool,
    progress: ProgressModel,
    on_progress: &mut dyn FnMut(u8) -> bool,
) -> Result<Option<TableSchema>> {
    let mut scanner = TypeScanner::new(format.clone(), read_headers);

    while let Some(rows) = reader.next_chunk()? {
        if let Err(err) = scanner.add_chunk(&rows) {
            reader.abort();
            return Err(err);
        }

        let percent = progress.percent(Pass::Scan, reader.chunks_read(), reader.archive_percent());
        debug!(
            chunk = reader.chunks_read(),
            rows = rows.len(),
            percent,
            "Scanned chunk"
        );
        if on_progress(percent) {
            reader.abort();
            return Ok(None);
        }
    }

    scanner.build().map(Some)
}
