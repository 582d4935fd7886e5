use std::collections::HashSet;

use tally_parser::{content_hash, parse_export_file, HeaderRow, ParseOptions, ParsedExport, ParserError};
use tracing::{info, warn};

use crate::fields::ExportKind;
use crate::mapping::MapperSet;

#[derive(Debug)]
pub struct ExportInput<'a> {
    pub path: &'a str,
    pub company: &'a str,
    pub kind: ExportKind,
    /// Forces the header row; detected from the kind's column codes otherwise.
    pub header_row: Option<usize>,
    pub contents: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Duplicate,
    Parsed,
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Duplicate => "duplicate",
            FileStatus::Parsed => "parsed",
            FileStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParserAttemptReport {
    pub parser: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: String,
    pub company: String,
    pub kind: ExportKind,
    pub hash: String,
    pub status: FileStatus,
    pub rows: usize,
    pub parser_attempts: Vec<ParserAttemptReport>,
}

#[derive(Debug, Clone)]
pub struct IngestedExport {
    pub path: String,
    pub company: String,
    pub kind: ExportKind,
    pub export: ParsedExport,
}

#[derive(Debug, Default)]
pub struct IngestionBatch {
    pub parsed: Vec<IngestedExport>,
    pub reports: Vec<FileReport>,
}

impl IngestionBatch {
    pub fn count(&self, status: FileStatus) -> usize {
        self.reports
            .iter()
            .filter(|report| report.status == status)
            .count()
    }
}

/// Parses every input once; byte-identical files after the first are
/// reported as duplicates, unreadable files as failures.
pub fn ingest_exports(inputs: &[ExportInput<'_>], mappers: &MapperSet) -> IngestionBatch {
    let mut batch = IngestionBatch::default();
    let mut seen: HashSet<String> = HashSet::new();

    for input in inputs {
        let hash = content_hash(input.contents);
        if !seen.insert(hash.clone()) {
            warn!(path = input.path, company = input.company, %hash, "skipping duplicate export");
            batch.reports.push(FileReport {
                path: input.path.to_string(),
                company: input.company.to_string(),
                kind: input.kind,
                hash,
                status: FileStatus::Duplicate,
                rows: 0,
                parser_attempts: Vec::new(),
            });
            continue;
        }

        let header_row = match input.header_row {
            Some(row) => HeaderRow::Fixed(row),
            None => HeaderRow::detect(mappers.for_kind(input.kind).header_markers()),
        };
        let options = ParseOptions::with_header_row(header_row);

        match parse_export_file(input.contents, &options) {
            Ok(export) => {
                info!(
                    path = input.path,
                    company = input.company,
                    kind = input.kind.as_str(),
                    format = %export.source_format,
                    header_row = export.header_row,
                    rows = export.height(),
                    "parsed export"
                );
                batch.reports.push(FileReport {
                    path: input.path.to_string(),
                    company: input.company.to_string(),
                    kind: input.kind,
                    hash,
                    status: FileStatus::Parsed,
                    rows: export.height(),
                    parser_attempts: Vec::new(),
                });
                batch.parsed.push(IngestedExport {
                    path: input.path.to_string(),
                    company: input.company.to_string(),
                    kind: input.kind,
                    export,
                });
            }
            Err(err) => {
                warn!(path = input.path, company = input.company, error = %err, "failed to parse export");
                batch.reports.push(FileReport {
                    path: input.path.to_string(),
                    company: input.company.to_string(),
                    kind: input.kind,
                    hash,
                    status: FileStatus::Failed,
                    rows: 0,
                    parser_attempts: attempts_from_error(err),
                });
            }
        }
    }

    batch
}

fn attempts_from_error(err: ParserError) -> Vec<ParserAttemptReport> {
    match err {
        ParserError::NoMatchingParser { attempts, .. } => attempts
            .into_iter()
            .map(|attempt| ParserAttemptReport {
                parser: attempt.parser,
                message: attempt.message,
            })
            .collect(),
        other => vec![ParserAttemptReport {
            parser: other.parser_name().unwrap_or("registry"),
            message: other.to_string(),
        }],
    }
}
