use crate::error::{IngestError, Result};
use crate::format::FormatDescriptor;
use crate::types::ColumnBatch;

/// Turn rows into `num_columns` columns, cleaning each cell per `format`.
///
/// Cells past `num_columns` are dropped. A row with fewer cells fails the whole
/// batch. Trimming happens before the null check, so a padded `(null)` is still
/// recognized; nulls become empty strings.
pub fn transpose(rows: &[Vec<String>], num_columns: usize, format: &FormatDescriptor) -> Result<ColumnBatch> {
    let mut columns: Vec<Vec<String>> = (0..num_columns)
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();

    let null_string = format.null_string();
    for row in rows {
        if row.len() < num_columns {
            return Err(IngestError::insufficient_columns(num_columns, row));
        }
        for (column, cell) in columns.iter_mut().zip(row) {
            let value = format.clean(cell);
            if Some(value) == null_string {
                column.push(String::new());
            } else {
                column.push(value.to_string());
            }
        }
    }

    Ok(ColumnBatch::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatKind;

    fn rows(lines: &[&[&str]]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_transpose_shape() {
        let format = FormatKind::DefaultCsv.descriptor();
        let batch = transpose(&rows(&[&["1", "a"], &["2", "b"], &["3", "c"]]), 2, &format).unwrap();

        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.columns[0], vec!["1", "2", "3"]);
        assert_eq!(batch.columns[1], vec!["a", "b", "c"]);
    }

    #[test]
    fn test_transpose_drops_extra_cells() {
        let format = FormatKind::DefaultCsv.descriptor();
        let batch = transpose(&rows(&[&["1", "a", "extra"], &["2", "b"]]), 2, &format).unwrap();
        assert_eq!(batch.columns, vec![vec!["1", "2"], vec!["a", "b"]]);
    }

    #[test]
    fn test_transpose_short_row() {
        let format = FormatKind::DefaultCsv.descriptor();
        let err = transpose(&rows(&[&["1", "a", "x"], &["2", "b"]]), 3, &format).unwrap_err();

        assert!(matches!(
            err,
            IngestError::InsufficientColumns { expected: 3, found: 2, .. }
        ));
        let message = err.to_string();
        assert!(message.contains("Expected 3 but found 2"));
        assert!(message.ends_with("2,b"));
    }

    #[test]
    fn test_transpose_trims_and_nulls() {
        let format = FormatKind::DefaultCsv.descriptor();
        let batch = transpose(&rows(&[&[" (null) ", " x "]]), 2, &format).unwrap();
        assert_eq!(batch.columns, vec![vec![""], vec!["x"]]);
    }

    #[test]
    fn test_transpose_verbatim_format() {
        let format = FormatKind::StandardCsv.descriptor();
        let batch = transpose(&rows(&[&["(null)", " x "]]), 2, &format).unwrap();
        assert_eq!(batch.columns, vec![vec!["(null)"], vec![" x "]]);
    }

    #[test]
    fn test_transpose_empty_batch() {
        let format = FormatKind::DefaultCsv.descriptor();
        let batch = transpose(&[], 3, &format).unwrap();
        assert_eq!(batch.num_columns(), 3);
        assert!(batch.is_empty());
    }
}
