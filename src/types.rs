use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of one column, as understood by the table backend.
///
/// Types only ever widen while a file is being scanned; see
/// [`crate::schema::determine_type`] for the allowed transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// No non-null value has been seen yet
    #[serde(rename = "unknown")]
    Unknown,
    /// 32-bit signed integer
    #[serde(rename = "int")]
    Integer,
    /// 64-bit signed integer
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "bool")]
    Boolean,
    #[serde(rename = "string")]
    String,
    /// Date and time with an optional zone token, e.g. `2020-01-02 03:04:05 UTC`
    #[serde(rename = "datetime")]
    DateTime,
    /// Time of day, e.g. `03:04:05.123`
    #[serde(rename = "localtime")]
    LocalTime,
}

impl ColumnType {
    /// Every column type, narrowest first
    pub const ALL: [ColumnType; 8] = [
        ColumnType::Unknown,
        ColumnType::Integer,
        ColumnType::Long,
        ColumnType::Double,
        ColumnType::Boolean,
        ColumnType::DateTime,
        ColumnType::LocalTime,
        ColumnType::String,
    ];

    /// The type name sent to the backend when a table is created
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Unknown => "unknown",
            ColumnType::Integer => "int",
            ColumnType::Long => "long",
            ColumnType::Double => "double",
            ColumnType::Boolean => "bool",
            ColumnType::String => "string",
            ColumnType::DateTime => "datetime",
            ColumnType::LocalTime => "localtime",
        }
    }

    /// Resolve a type that never saw a value. An all-null column uploads as strings.
    pub fn finalized(self) -> Self {
        match self {
            ColumnType::Unknown => ColumnType::String,
            other => other,
        }
    }

    /// Whether `self` can be reached from `from` by zero or more widenings
    pub fn is_at_least(self, from: ColumnType) -> bool {
        use ColumnType::*;
        match (from, self) {
            (a, b) if a == b => true,
            (Unknown, _) => true,
            (_, String) => true,
            (Integer, Long) | (Integer, Double) | (Long, Double) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chunk of parsed rows, each row a list of raw cells
pub type RowBatch = Vec<Vec<String>>;

/// A chunk of rows transposed into column-major order.
///
/// Every column holds the same number of cells, and there is exactly one column
/// per header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBatch {
    pub columns: Vec<Vec<String>>,
}

impl ColumnBatch {
    pub fn new(columns: Vec<Vec<String>>) -> Self {
        ColumnBatch { columns }
    }

    /// A batch with `num_columns` empty columns
    pub fn empty(num_columns: usize) -> Self {
        ColumnBatch {
            columns: vec![Vec::new(); num_columns],
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Append another batch's cells column by column
    pub fn append(&mut self, other: ColumnBatch) {
        if self.columns.is_empty() {
            self.columns = other.columns;
            return;
        }
        for (column, more) in self.columns.iter_mut().zip(other.columns) {
            column.extend(more);
        }
    }
}

/// Headers and column types discovered by the type scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub headers: Vec<String>,
    pub types: Vec<ColumnType>,
}

impl TableSchema {
    pub fn new(headers: Vec<String>, types: Vec<ColumnType>) -> Self {
        TableSchema { headers, types }
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }
}
