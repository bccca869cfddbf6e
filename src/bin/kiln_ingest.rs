//! kiln-ingest: Load a delimited-text file into a typed table
//!
//! Runs the full two-pass pipeline against the in-process table store and writes the
//! bound table as JSON Lines.
//!
//! Usage:
//!   # Ingest a csv file, write ./tables/sales.jsonl
//!   kiln-ingest sales.csv --output-dir ./tables
//!
//!   # First delimited entry of a zip archive, custom table name
//!   kiln-ingest upload.zip --table-name orders -o ./tables
//!
//!   # Pasted values, delimiter detected from the text
//!   kiln-ingest --paste "$(pbpaste)" -o ./tables

// Use MiMalloc allocator for better performance on large uploads
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use kiln::format::{FormatDescriptor, FormatKind};
use kiln::headers::legalize_table_name;
use kiln::ingest::{CsvParser, IngestListener, IngestOptions, ParseOutcome};
use kiln::source::{path_source, ByteSource, TextSource};
use kiln::{IngestError, LocalTable, LocalTableStore};
use serde_json::json;
use std::io::{stdin, Read};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln-ingest")]
#[command(about = "Load a delimited-text file into a typed table", long_about = None)]
struct Args {
    /// Input file, plain or .zip (use stdin if omitted)
    #[arg(value_name = "FILE", conflicts_with = "paste")]
    input: Option<String>,

    /// Ingest this text instead of a file
    #[arg(long)]
    paste: Option<String>,

    /// Format of the input (default: from the file extension; `auto` for pasted text)
    #[arg(long, value_enum, conflicts_with = "format_file")]
    format: Option<FormatKind>,

    /// JSON file holding a custom format descriptor
    #[arg(long)]
    format_file: Option<String>,

    /// Treat the first row as data and name columns A, B, C, ...
    #[arg(long)]
    no_headers: bool,

    /// Variable the table is bound to (default: derived from the file name)
    #[arg(long)]
    table_name: Option<String>,

    /// Time zone for date-time columns
    #[arg(long, default_value = "UTC")]
    time_zone: String,

    /// Directory for the bound table's .jsonl file
    /// If omitted, nothing is written and only the summary is printed
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Entry to read when the input is a zip archive
    #[arg(long)]
    entry: Option<String>,

    /// Bytes per chunk for plain files
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Bytes per chunk for zip entries
    #[arg(long)]
    archive_chunk_size: Option<usize>,

    /// Zip chunks merged into one table upload
    #[arg(long)]
    consolidate_threshold: Option<usize>,
}

/// Logs progress every ten percent
#[derive(Default)]
struct LogListener {
    last_logged: Option<u8>,
}

impl IngestListener<LocalTable> for LogListener {
    fn on_progress(&mut self, percent: u8) -> bool {
        let step = percent / 10;
        if self.last_logged.map_or(true, |last| step > last / 10) {
            info!(percent, "Progress");
            self.last_logged = Some(percent);
        }
        false
    }

    fn on_error(&mut self, error: &IngestError) {
        tracing::error!(%error, "Upload failed");
    }

    fn on_file_completed(&mut self, tables: &[LocalTable]) {
        info!(tables = tables.len(), "All chunks uploaded");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (source, file_name, default_format): (Box<dyn ByteSource>, String, FormatKind) =
        match (&args.paste, &args.input) {
            (Some(text), _) => (Box::new(TextSource::pasted(text.clone())), "pasted".to_string(), FormatKind::Auto),
            (None, Some(path)) => {
                let (source, name) = path_source(Path::new(path), args.entry.as_deref())?;
                let kind = FormatKind::from_extension(&name);
                (source, name, kind)
            }
            (None, None) => {
                let mut text = String::new();
                stdin().read_to_string(&mut text).context("Failed to read stdin")?;
                (Box::new(TextSource::new("stdin", text)), "stdin".to_string(), FormatKind::Auto)
            }
        };

    let format = match (&args.format_file, args.format) {
        (Some(path), _) => FormatDescriptor::from_json_file(path)?,
        (None, Some(kind)) => kind.descriptor(),
        (None, None) => default_format.descriptor(),
    };

    let table_name = match args.table_name {
        Some(name) => name,
        None => {
            let stem = Path::new(&file_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            legalize_table_name(&stem)
        }
    };

    let mut options = IngestOptions {
        read_headers: !args.no_headers,
        time_zone: args.time_zone,
        ..IngestOptions::default()
    };
    if let Some(size) = args.chunk_size {
        options.chunk_size = size;
    }
    if let Some(size) = args.archive_chunk_size {
        options.archive_chunk_size = size;
    }
    if let Some(threshold) = args.consolidate_threshold {
        options.consolidate_threshold = threshold;
    }

    let store = match &args.output_dir {
        Some(dir) => LocalTableStore::with_output_dir(dir)?,
        None => LocalTableStore::new(),
    };

    let mut parser = CsvParser::new(&store, source, format, table_name)
        .with_options(options)
        .with_listener(LogListener::default());

    let summary = match parser.parse().await? {
        ParseOutcome::Completed(summary) => summary,
        ParseOutcome::Canceled => bail!("Upload canceled"),
    };

    let output = json!({
        "table": summary.table_name,
        "rows": summary.rows,
        "chunks": summary.chunks,
        "merged": summary.merged,
        "headers": summary.schema.headers,
        "types": summary.schema.types,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
