//! kiln-infer: Infer column types of a delimited-text file
//!
//! Runs only the type inference pass and prints the resulting headers and types.
//!
//! Usage:
//!   # Read from file, output to stdout
//!   kiln-infer data.csv
//!
//!   # Read from stdin, output to stdout
//!   printf 'a,b\n1,x\n' | kiln-infer
//!
//!   # First csv entry of a zip archive, no header row, compact output
//!   kiln-infer --no-headers --compact upload.zip

use anyhow::{Context, Result};
use clap::Parser;
use kiln::format::{FormatDescriptor, FormatKind};
use kiln::ingest::parser::{DEFAULT_ARCHIVE_CHUNK_SIZE, DEFAULT_CHUNK_SIZE};
use kiln::progress::ProgressModel;
use kiln::schema::scan_types;
use kiln::source::{path_source, ByteSource, ChunkedReader, SourceKind, TextSource, SAMPLE_BYTES};
use std::io::{stdin, Read};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kiln-infer")]
#[command(about = "Infer column types of a delimited-text file", long_about = None)]
struct Args {
    /// Input file, plain or .zip (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Format of the input (default: picked from the file extension)
    #[arg(long, value_enum, conflicts_with = "format_file")]
    format: Option<FormatKind>,

    /// JSON file holding a custom format descriptor
    #[arg(long)]
    format_file: Option<String>,

    /// Treat the first row as data and name columns A, B, C, ...
    #[arg(long)]
    no_headers: bool,

    /// Entry to read when the input is a zip archive
    #[arg(long)]
    entry: Option<String>,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (source, file_name): (Box<dyn ByteSource>, String) = match &args.input {
        Some(path) => path_source(Path::new(path), args.entry.as_deref())?,
        None => {
            let mut text = String::new();
            stdin().read_to_string(&mut text).context("Failed to read stdin")?;
            (Box::new(TextSource::new("stdin", text)), String::new())
        }
    };

    let format = match (&args.format_file, args.format) {
        (Some(path), _) => FormatDescriptor::from_json_file(path)?,
        (None, Some(kind)) => kind.descriptor(),
        (None, None) => FormatKind::from_extension(&file_name).descriptor(),
    };
    let format = if format.needs_delimiter_detection() {
        let sample = source.sample(SAMPLE_BYTES)?;
        format.resolved(&sample)
    } else {
        format
    };

    let kind = source.kind()?;
    let chunk_size = match kind {
        SourceKind::Plain { .. } => DEFAULT_CHUNK_SIZE,
        SourceKind::Archive => DEFAULT_ARCHIVE_CHUNK_SIZE,
    };
    let mut reader = ChunkedReader::open(source.as_ref(), &format, chunk_size)?;
    let progress = ProgressModel::new(kind, chunk_size);

    let schema = scan_types(&mut reader, &format, !args.no_headers, progress, &mut |_| false)?
        .context("Type scan stopped early")?;

    let output = if args.compact {
        serde_json::to_string(&schema)?
    } else {
        serde_json::to_string_pretty(&schema)?
    };

    println!("{}", output);

    Ok(())
}
