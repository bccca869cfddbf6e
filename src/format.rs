//! Delimited-text formats
//!
//! A [`FormatDescriptor`] fixes how one ingestion run tokenizes its source. The
//! catalog in [`FormatKind`] holds the built-in formats; custom descriptors can be
//! loaded from JSON.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Null sentinel used by the default format
pub const DEFAULT_NULL_STRING: &str = "(null)";

/// Delimiters tried when a format asks for detection
const CANDIDATE_DELIMITERS: [char; 4] = [',', '\t', '|', ';'];

/// Lines looked at when detecting a delimiter
const DETECT_SAMPLE_LINES: usize = 10;

/// Line ending convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    /// Any of `\r\n`, `\n` or `\r`
    #[default]
    Auto,
    Lf,
    CrLf,
    Cr,
}

impl Newline {
    pub(crate) fn terminator(self) -> csv::Terminator {
        match self {
            Newline::Auto | Newline::CrLf => csv::Terminator::CRLF,
            Newline::Lf => csv::Terminator::Any(b'\n'),
            Newline::Cr => csv::Terminator::Any(b'\r'),
        }
    }
}

/// Immutable tokenizer configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Display name
    pub name: String,

    /// Field delimiter; `None` means detect it from the first lines of the source
    pub delimiter: Option<char>,

    #[serde(default)]
    pub newline: Newline,

    /// Escape character inside quoted fields; `"` means doubled quotes
    #[serde(default = "default_escape_char")]
    pub escape_char: char,

    /// Literal text that stands for a missing value
    #[serde(default)]
    pub null_string: Option<String>,

    /// Trim whitespace around every value
    #[serde(default)]
    pub should_trim: bool,

    /// Drop lines that hold nothing but whitespace
    #[serde(default = "default_true")]
    pub skip_empty_lines: bool,
}

fn default_escape_char() -> char {
    '"'
}

fn default_true() -> bool {
    true
}

impl FormatDescriptor {
    /// A trimmed, `(null)`-aware format with the given delimiter
    pub fn delimited(name: impl Into<String>, delimiter: char) -> Self {
        FormatDescriptor {
            name: name.into(),
            delimiter: Some(delimiter),
            newline: Newline::Auto,
            escape_char: '"',
            null_string: Some(DEFAULT_NULL_STRING.to_string()),
            should_trim: true,
            skip_empty_lines: true,
        }
    }

    /// Load a descriptor from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read format file: {}", path.display()))?;
        let format: FormatDescriptor = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse format file: {}", path.display()))?;
        format.validate()?;
        Ok(format)
    }

    /// Check that the tokenizer can represent this format
    pub fn validate(&self) -> Result<()> {
        if let Some(delimiter) = self.delimiter {
            ascii_byte("delimiter", delimiter)?;
            if delimiter == '"' {
                return Err(IngestError::InvalidFormat(
                    "delimiter cannot be the quote character".to_string(),
                ));
            }
        }
        ascii_byte("escape character", self.escape_char)?;
        Ok(())
    }

    pub fn needs_delimiter_detection(&self) -> bool {
        self.delimiter.is_none()
    }

    /// Fill in a missing delimiter by looking at a sample of the source
    pub fn resolved(mut self, sample: &str) -> Self {
        if self.delimiter.is_none() {
            self.delimiter = Some(detect_delimiter(sample));
        }
        self
    }

    /// Build a tokenizer for this format
    pub(crate) fn csv_builder(&self) -> Result<csv::ReaderBuilder> {
        self.validate()?;

        let delimiter = ascii_byte("delimiter", self.delimiter.unwrap_or(','))?;
        let escape = ascii_byte("escape character", self.escape_char)?;

        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .quote(b'"')
            .terminator(self.newline.terminator());

        if escape == b'"' {
            builder.double_quote(true).escape(None);
        } else {
            builder.double_quote(false).escape(Some(escape));
        }

        Ok(builder)
    }

    /// Apply trimming to a raw cell
    pub fn clean<'a>(&self, value: &'a str) -> &'a str {
        if self.should_trim {
            value.trim()
        } else {
            value
        }
    }

    pub fn null_string(&self) -> Option<&str> {
        self.null_string.as_deref()
    }
}

fn ascii_byte(what: &str, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(IngestError::InvalidFormat(format!(
            "{} {:?} must be a single ASCII character",
            what, c
        )))
    }
}

/// Built-in formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    /// Comma separated, trimmed, `(null)` as null
    #[default]
    DefaultCsv,
    /// Comma separated, values kept verbatim, no null sentinel
    StandardCsv,
    /// Tab separated
    Tsv,
    /// Pipe separated
    Psv,
    /// Semicolon separated
    Dsv,
    /// Delimiter detected from the data (pasted text)
    Auto,
}

impl FormatKind {
    pub fn descriptor(self) -> FormatDescriptor {
        match self {
            FormatKind::DefaultCsv => FormatDescriptor::delimited("Default csv", ','),
            FormatKind::StandardCsv => FormatDescriptor {
                name: "Standard csv".to_string(),
                null_string: None,
                should_trim: false,
                ..FormatDescriptor::delimited("", ',')
            },
            FormatKind::Tsv => FormatDescriptor::delimited("Tab separated", '\t'),
            FormatKind::Psv => FormatDescriptor::delimited("Pipe separated", '|'),
            FormatKind::Dsv => FormatDescriptor::delimited("Semicolon separated", ';'),
            FormatKind::Auto => FormatDescriptor {
                delimiter: None,
                ..FormatDescriptor::delimited("Auto detect", ',')
            },
        }
    }

    /// Pick a format from a file name
    pub fn from_extension(file_name: &str) -> Self {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".tsv") || lower.ends_with(".tab") {
            FormatKind::Tsv
        } else if lower.ends_with(".psv") {
            FormatKind::Psv
        } else if lower.ends_with(".dsv") {
            FormatKind::Auto
        } else {
            FormatKind::DefaultCsv
        }
    }
}

/// Guess the delimiter of a text sample.
///
/// Each candidate is scored by how many of the first lines split into the same
/// number of fields (more than one). Ties go to the earlier candidate, and a sample
/// no candidate splits falls back to a comma.
pub fn detect_delimiter(sample: &str) -> char {
    // Drop a trailing partial line if the sample was cut mid-record
    let sample = match sample.rfind('\n') {
        Some(end) if end + 1 < sample.len() => &sample[..end],
        _ => sample,
    };

    let mut best = (',', 0usize);
    for candidate in CANDIDATE_DELIMITERS {
        let score = consistent_lines(sample, candidate);
        if score > best.1 {
            best = (candidate, score);
        }
    }
    best.0
}

fn consistent_lines(sample: &str, delimiter: char) -> usize {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(sample.as_bytes());

    let counts: Vec<usize> = reader
        .records()
        .take(DETECT_SAMPLE_LINES)
        .filter_map(|record| record.ok())
        .map(|record| record.len())
        .collect();

    let Some(&first) = counts.first() else {
        return 0;
    };
    if first < 2 {
        return 0;
    }
    counts.iter().filter(|&&n| n == first).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(FormatKind::from_extension("data.csv"), FormatKind::DefaultCsv);
        assert_eq!(FormatKind::from_extension("DATA.TSV"), FormatKind::Tsv);
        assert_eq!(FormatKind::from_extension("data.tab"), FormatKind::Tsv);
        assert_eq!(FormatKind::from_extension("data.psv"), FormatKind::Psv);
        assert_eq!(FormatKind::from_extension("data.dsv"), FormatKind::Auto);
        assert_eq!(FormatKind::from_extension("notes.txt"), FormatKind::DefaultCsv);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3\n"), '\t');
        assert_eq!(detect_delimiter("a|b\n1|2\n3|4"), '|');
        assert_eq!(detect_delimiter("name;note\nx;\"a, b, c\"\n"), ';');
        assert_eq!(detect_delimiter("single column\nvalues\n"), ',');
        assert_eq!(detect_delimiter(""), ',');
    }

    #[test]
    fn test_auto_resolves_delimiter() {
        let format = FormatKind::Auto.descriptor();
        assert!(format.needs_delimiter_detection());

        let resolved = format.resolved("a|b\n1|2\n");
        assert_eq!(resolved.delimiter, Some('|'));
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{"name": "Semi", "delimiter": ";", "null_string": "NA"}"#;
        let format: FormatDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(format.delimiter, Some(';'));
        assert_eq!(format.escape_char, '"');
        assert_eq!(format.newline, Newline::Auto);
        assert!(format.skip_empty_lines);
        assert!(!format.should_trim);
        assert_eq!(format.null_string(), Some("NA"));
    }

    #[test]
    fn test_rejects_non_ascii_delimiter() {
        let mut format = FormatKind::DefaultCsv.descriptor();
        format.delimiter = Some('→');
        assert!(matches!(format.validate(), Err(IngestError::InvalidFormat(_))));
    }

    #[test]
    fn test_clean_respects_trim() {
        let trimmed = FormatKind::DefaultCsv.descriptor();
        let verbatim = FormatKind::StandardCsv.descriptor();
        assert_eq!(trimmed.clean("  x "), "x");
        assert_eq!(verbatim.clean("  x "), "  x ");
    }
}
