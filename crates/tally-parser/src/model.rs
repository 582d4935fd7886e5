use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// How many leading non-empty rows are searched when detecting the header.
pub const DEFAULT_HEADER_SCAN: usize = 10;

/// Location of the row holding column names, counted among non-empty rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRow {
    Fixed(usize),
    Detect { markers: Vec<String>, max_scan: usize },
}

impl HeaderRow {
    pub fn detect<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        HeaderRow::Detect {
            markers: markers
                .into_iter()
                .map(|marker| marker.as_ref().trim().to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
            max_scan: DEFAULT_HEADER_SCAN,
        }
    }
}

impl Default for HeaderRow {
    fn default() -> Self {
        HeaderRow::Fixed(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub header_row: HeaderRow,
}

impl ParseOptions {
    pub fn with_header_row(header_row: HeaderRow) -> Self {
        Self { header_row }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    Workbook,
    Delimited { delimiter: u8 },
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Workbook => f.write_str("workbook"),
            SourceFormat::Delimited { delimiter: b'\t' } => f.write_str("delimited (tab)"),
            SourceFormat::Delimited { delimiter } => {
                write!(f, "delimited ('{}')", *delimiter as char)
            }
        }
    }
}

/// What the leading bytes of an input say about its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileSignature {
    /// `PK\x03\x04`, an xlsx workbook (or any other zip).
    ZipArchive,
    /// `D0 CF 11 E0`, a legacy xls workbook.
    CompoundDocument,
    Text,
    Binary,
    Empty,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const COMPOUND_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const SNIFF_BYTES: usize = 1024;

impl FileSignature {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            FileSignature::Empty
        } else if bytes.starts_with(ZIP_MAGIC) {
            FileSignature::ZipArchive
        } else if bytes.starts_with(COMPOUND_MAGIC) {
            FileSignature::CompoundDocument
        } else if bytes.iter().take(SNIFF_BYTES).any(|&b| b == 0) {
            FileSignature::Binary
        } else {
            FileSignature::Text
        }
    }

    pub fn is_workbook(&self) -> bool {
        matches!(self, FileSignature::ZipArchive | FileSignature::CompoundDocument)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileSignature::ZipArchive => "zip archive",
            FileSignature::CompoundDocument => "compound document",
            FileSignature::Text => "text",
            FileSignature::Binary => "binary",
            FileSignature::Empty => "empty",
        }
    }
}

impl fmt::Display for FileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One export file decoded into a text table: a `String` column per header,
/// trimmed cell text, empty cells as nulls.
#[derive(Debug, Clone)]
pub struct ParsedExport {
    pub file_hash: String,
    pub source_format: SourceFormat,
    pub header_row: usize,
    pub headers: Vec<String>,
    pub df: DataFrame,
}

impl ParsedExport {
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn text_column(&self, name: &str) -> PolarsResult<&StringChunked> {
        self.df.column(name)?.str()
    }
}
