use super::BackendSession;
use crate::schema::lattice::numeric_text;
use crate::types::{ColumnBatch, ColumnType};
use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Handle to a table in a [`LocalTableStore`]
#[derive(Debug, PartialEq, Eq)]
pub struct LocalTable {
    id: u64,
}

impl LocalTable {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Typed, column-major table contents
#[derive(Debug, Clone, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub types: Vec<ColumnType>,
    pub columns: Vec<Vec<Value>>,
    pub time_zone: String,
}

impl TableData {
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// One row as a JSON object keyed by header
    pub fn row(&self, index: usize) -> Map<String, Value> {
        self.headers
            .iter()
            .zip(&self.columns)
            .map(|(header, column)| (header.clone(), column[index].clone()))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        (0..self.num_rows()).map(move |i| self.row(i))
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    tables: HashMap<u64, TableData>,
    variables: HashMap<String, TableData>,
    created: usize,
    merged: usize,
}

/// In-process table backend.
///
/// Cells are converted to typed JSON values on creation, so a value that does not
/// fit its column type rejects the whole table. Bound tables are kept by name and,
/// with an output directory, written out as JSON Lines.
#[derive(Debug, Clone, Default)]
pub struct LocalTableStore {
    inner: Arc<Mutex<Inner>>,
    output_dir: Option<PathBuf>,
}

impl LocalTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that writes every bound table to `<output_dir>/<name>.jsonl`
    pub fn with_output_dir<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;
        Ok(LocalTableStore {
            inner: Arc::default(),
            output_dir: Some(output_dir.as_ref().to_path_buf()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tables created or merged and not yet closed
    pub fn open_tables(&self) -> usize {
        self.lock().tables.len()
    }

    /// Number of create calls that succeeded
    pub fn created(&self) -> usize {
        self.lock().created
    }

    /// Number of merge calls that succeeded
    pub fn merged(&self) -> usize {
        self.lock().merged
    }

    pub fn table(&self, table: &LocalTable) -> Option<TableData> {
        self.lock().tables.get(&table.id).cloned()
    }

    /// Contents bound under `name`
    pub fn variable(&self, name: &str) -> Option<TableData> {
        self.lock().variables.get(name).cloned()
    }

    fn insert(&self, data: TableData) -> LocalTable {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.tables.insert(id, data);
        LocalTable { id }
    }

    fn write_jsonl(&self, dir: &Path, name: &str, data: &TableData) -> Result<()> {
        let path = dir.join(format!("{}.jsonl", name));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let mut writer = TableWriter::new(std::io::BufWriter::new(file));
        writer.write_table(data)?;
        writer.flush()?;
        debug!(path = %path.display(), rows = data.num_rows(), "Wrote table");
        Ok(())
    }
}

#[async_trait]
impl BackendSession for LocalTableStore {
    type Table = LocalTable;

    async fn create_table(
        &self,
        headers: &[String],
        types: &[ColumnType],
        columns: ColumnBatch,
        time_zone: &str,
    ) -> Result<LocalTable> {
        ensure!(
            headers.len() == types.len() && headers.len() == columns.num_columns(),
            "Column count mismatch: {} headers, {} types, {} columns",
            headers.len(),
            types.len(),
            columns.num_columns()
        );

        let columns = columns
            .columns
            .into_iter()
            .zip(headers.iter().zip(types))
            .map(|(cells, (header, &ty))| {
                cells
                    .into_iter()
                    .map(|cell| convert_cell(cell, ty))
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Invalid value in column {}", header))
            })
            .collect::<Result<Vec<_>>>()?;

        let table = self.insert(TableData {
            headers: headers.to_vec(),
            types: types.to_vec(),
            columns,
            time_zone: time_zone.to_string(),
        });
        self.lock().created += 1;
        Ok(table)
    }

    async fn merge_tables(&self, tables: &[LocalTable]) -> Result<LocalTable> {
        let merged = {
            let inner = self.lock();
            let mut parts = tables.iter().map(|table| {
                inner
                    .tables
                    .get(&table.id)
                    .ok_or_else(|| anyhow!("Table {} is not open", table.id))
            });

            let mut merged = match parts.next() {
                Some(first) => first?.clone(),
                None => bail!("Nothing to merge"),
            };
            for part in parts {
                let part = part?;
                ensure!(
                    part.headers == merged.headers && part.types == merged.types,
                    "Cannot merge tables with different columns"
                );
                for (column, more) in merged.columns.iter_mut().zip(&part.columns) {
                    column.extend(more.iter().cloned());
                }
            }
            merged
        };

        let table = self.insert(merged);
        self.lock().merged += 1;
        Ok(table)
    }

    async fn bind_table_to_variable(&self, table: &LocalTable, name: &str) -> Result<()> {
        let data = self
            .table(table)
            .ok_or_else(|| anyhow!("Table {} is not open", table.id))?;

        if let Some(dir) = &self.output_dir {
            self.write_jsonl(dir, name, &data)?;
        }
        self.lock().variables.insert(name.to_string(), data);
        Ok(())
    }

    fn close_table(&self, table: LocalTable) {
        if self.lock().tables.remove(&table.id).is_none() {
            warn!(table = table.id, "Closed a table that was not open");
        }
    }
}

/// Convert one cleaned cell to the JSON value its column type calls for
fn convert_cell(cell: String, ty: ColumnType) -> Result<Value> {
    if cell.is_empty() {
        return Ok(Value::Null);
    }

    match ty {
        ColumnType::Integer | ColumnType::Long => {
            let text = numeric_text(&cell).ok_or_else(|| anyhow!("{:?} is not a number", cell))?;
            match text.parse::<i64>() {
                Ok(n) => Ok(Value::from(n)),
                // Wider than i64; keep the magnitude as a double
                Err(_) => to_double(&text, &cell),
            }
        }
        ColumnType::Double => {
            let text = numeric_text(&cell).ok_or_else(|| anyhow!("{:?} is not a number", cell))?;
            to_double(&text, &cell)
        }
        ColumnType::Boolean => {
            if cell.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if cell.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                bail!("{:?} is not a boolean", cell)
            }
        }
        ColumnType::String | ColumnType::DateTime | ColumnType::LocalTime | ColumnType::Unknown => {
            Ok(Value::String(cell))
        }
    }
}

fn to_double(text: &str, cell: &str) -> Result<Value> {
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| anyhow!("{:?} is out of range", cell))
}

/// Writes table rows as JSON Lines, one object per row
pub struct TableWriter<W: Write> {
    writer: W,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W) -> Self {
        TableWriter { writer }
    }

    pub fn write_table(&mut self, data: &TableData) -> Result<()> {
        for row in data.rows() {
            let json = serde_json::to_string(&row).context("Failed to serialize row")?;
            writeln!(self.writer, "{}", json).context("Failed to write row")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn batch(columns: &[&[&str]]) -> ColumnBatch {
        ColumnBatch::new(columns.iter().map(|c| strings(c)).collect())
    }

    #[tokio::test]
    async fn test_create_converts_types() {
        let store = LocalTableStore::new();
        let table = store
            .create_table(
                &strings(&["id", "price", "ok", "name"]),
                &[ColumnType::Integer, ColumnType::Double, ColumnType::Boolean, ColumnType::String],
                batch(&[&["1", "1,000"], &["2.5", ""], &["TRUE", "false"], &["a", "b"]]),
                "UTC",
            )
            .await
            .unwrap();

        let data = store.table(&table).unwrap();
        assert_eq!(data.num_rows(), 2);
        assert_eq!(
            Value::Object(data.row(0)),
            json!({"id": 1, "price": 2.5, "ok": true, "name": "a"})
        );
        assert_eq!(
            Value::Object(data.row(1)),
            json!({"id": 1000, "price": null, "ok": false, "name": "b"})
        );
        assert_eq!(data.time_zone, "UTC");
        assert_eq!(store.created(), 1);
        assert_eq!(store.open_tables(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_value() {
        let store = LocalTableStore::new();
        let result = store
            .create_table(&strings(&["n"]), &[ColumnType::Integer], batch(&[&["x"]]), "UTC")
            .await;

        assert!(result.is_err());
        assert_eq!(store.open_tables(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_shape_mismatch() {
        let store = LocalTableStore::new();
        let result = store
            .create_table(&strings(&["a", "b"]), &[ColumnType::String], batch(&[&["x"]]), "UTC")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_merge_preserves_order() {
        let store = LocalTableStore::new();
        let headers = strings(&["n"]);
        let types = [ColumnType::Long];
        let first = store.create_table(&headers, &types, batch(&[&["1", "2"]]), "UTC").await.unwrap();
        let second = store.create_table(&headers, &types, batch(&[&["3"]]), "UTC").await.unwrap();

        let merged = store.merge_tables(&[first, second]).await.unwrap();
        let data = store.table(&merged).unwrap();
        assert_eq!(data.columns[0], vec![json!(1), json!(2), json!(3)]);
        assert_eq!(store.merged(), 1);
        assert_eq!(store.open_tables(), 3);
    }

    #[tokio::test]
    async fn test_merge_nothing() {
        let store = LocalTableStore::new();
        assert!(store.merge_tables(&[]).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalTableStore::with_output_dir(dir.path()).unwrap();
        let table = store
            .create_table(&strings(&["n"]), &[ColumnType::Integer], batch(&[&["7", ""]]), "UTC")
            .await
            .unwrap();

        store.bind_table_to_variable(&table, "numbers").await.unwrap();
        store.close_table(table);

        let text = std::fs::read_to_string(dir.path().join("numbers.jsonl")).unwrap();
        assert_eq!(text, "{\"n\":7}\n{\"n\":null}\n");
        assert_eq!(store.variable("numbers").unwrap().num_rows(), 2);
        assert_eq!(store.open_tables(), 0);
    }

    #[test]
    fn test_convert_wide_long() {
        let value = convert_cell("99999999999999999999".to_string(), ColumnType::Long).unwrap();
        assert!(value.is_f64());
    }
}
