//! Reading input lists and writing result tables.
//!
//! Input is either a plain list (one item per line) or a CSV whose first
//! column holds the items. Both are parsed with the `csv` reader so that
//! quoted fields and stray extra columns behave the same way. Values are
//! trimmed; blank values are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{EnrichError, IoResultExt, Result};
use crate::pipeline::OutputRow;
use crate::resolver::literal_ip;

const UTF8_BOM: &str = "\u{feff}";

/// First-column values that mark the first record as a header.
const HEADER_NAMES: &[&str] = &[
    "input",
    "host",
    "hostname",
    "domain",
    "ip",
    "ip address",
    "address",
    "name",
    "target",
];

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputFormat {
    /// Decide from the first record
    #[default]
    Auto,
    /// One item per line, no header
    List,
    /// CSV with a header row; items in the first column
    Csv,
}

/// Read the item list from `path`.
pub fn read_items(path: &Path, format: InputFormat) -> Result<Vec<String>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EnrichError::InputNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(EnrichError::io(path.display().to_string(), "read input", e)),
    };
    let text = String::from_utf8(bytes)
        .map_err(|e| EnrichError::input_parse(path.display().to_string(), e.to_string()))?;

    let items = parse_items(&text, format)
        .map_err(|e| EnrichError::input_parse(path.display().to_string(), e.to_string()))?;
    debug!(path = %path.display(), ?format, items = items.len(), "input loaded");
    Ok(items)
}

/// Parse items out of already-decoded input text.
pub fn parse_items(text: &str, format: InputFormat) -> std::result::Result<Vec<String>, csv::Error> {
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);
    let values = first_column(text)?;

    let skip_header = match format {
        InputFormat::List => false,
        InputFormat::Csv => true,
        InputFormat::Auto => match values.first() {
            Some(first) if looks_like_header(first) => {
                warn!(header = %first, "first input row looks like a column title; skipping it");
                true
            }
            _ => false,
        },
    };

    Ok(values
        .into_iter()
        .skip(usize::from(skip_header))
        .filter(|v| !v.is_empty())
        .collect())
}

/// Trimmed first-column value of every record, blank lines dropped.
fn first_column(text: &str) -> std::result::Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(first) = record.get(0) {
            values.push(first.to_string());
        }
    }
    // Keep leading blank rows out of header detection.
    while values.first().is_some_and(|v| v.is_empty()) {
        values.remove(0);
    }
    Ok(values)
}

/// Decide whether the first value is a column title rather than an item.
///
/// Only a known title, or text no host entry can contain, counts. Anything
/// else (single labels, wildcards, IDNs, scoped IPv6) stays an item.
fn looks_like_header(first: &str) -> bool {
    if literal_ip(first).is_some() {
        return false;
    }
    let lowered = first.to_lowercase();
    HEADER_NAMES.contains(&lowered.as_str()) || !first.chars().all(is_host_char)
}

/// Characters that can appear in a hostname, wildcard, IDN or address entry.
fn is_host_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | '*' | '%' | ':' | '[' | ']')
}

/// `<stem>_output.csv` in the input's directory.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    input.with_file_name(format!("{stem}_output.csv"))
}

/// Serialize a header plus rows as CSV.
pub fn render_rows(headers: &[&str], rows: &[OutputRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EnrichError::internal(format!("flushing CSV buffer: {}", e.error())))
}

/// Write a header plus rows to `path`, replacing any existing file.
pub fn write_rows(path: &Path, headers: &[&str], rows: &[OutputRow]) -> Result<()> {
    let bytes = render_rows(headers, rows)?;
    fs::write(path, bytes).with_path(path.display().to_string(), "write output")
}
