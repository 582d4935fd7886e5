use std::collections::HashSet;

use blake3::Hasher;
use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{HeaderRow, ParseOptions, ParsedExport, SourceFormat};

/// BLAKE3 hex digest of raw file bytes.
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    let hash = hasher.finalize();
    hash.to_hex().to_string()
}

/// Picks the header among the non-empty rows.
pub(crate) fn select_header_row(
    parser: &'static str,
    rows: &[Vec<String>],
    header_row: &HeaderRow,
) -> Result<usize, ParserError> {
    if rows.is_empty() {
        return Err(ParserError::EmptyData { parser });
    }

    match header_row {
        HeaderRow::Fixed(index) => {
            if *index >= rows.len() {
                return Err(ParserError::HeaderOutOfRange {
                    parser,
                    row_index: *index,
                    rows: rows.len(),
                });
            }
            Ok(*index)
        }
        HeaderRow::Detect { markers, max_scan } => {
            let mut best_index = 0;
            let mut best_score = 0;
            for (index, row) in rows.iter().take((*max_scan).max(1)).enumerate() {
                let score = row
                    .iter()
                    .filter(|cell| {
                        let key = cell.trim().to_lowercase();
                        markers.iter().any(|marker| *marker == key)
                    })
                    .count();
                if score > best_score {
                    best_score = score;
                    best_index = index;
                }
            }
            Ok(best_index)
        }
    }
}

/// Blank names become `column_<n>`; repeated names get a `_<k>` suffix.
pub(crate) fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());

    for (index, cell) in raw.iter().enumerate() {
        let trimmed = cell.trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", index + 1)
        } else {
            trimmed.to_string()
        };

        let mut candidate = base.clone();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
    }

    headers
}

pub(crate) fn assemble_export(
    parser: &'static str,
    grid: Vec<Vec<String>>,
    options: &ParseOptions,
    source_format: SourceFormat,
    bytes: &[u8],
) -> Result<ParsedExport, ParserError> {
    let rows: Vec<Vec<String>> = grid
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    let header_index = select_header_row(parser, &rows, &options.header_row)?;

    let mut raw_header = rows[header_index].clone();
    while raw_header.last().is_some_and(|cell| cell.is_empty()) {
        raw_header.pop();
    }
    let headers = normalize_headers(&raw_header);
    let width = headers.len();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    for row in rows.iter().skip(header_index + 1) {
        if !row.iter().take(width).any(|cell| !cell.is_empty()) {
            continue;
        }
        for (index, column) in columns.iter_mut().enumerate() {
            let cell = row.get(index).map(String::as_str).unwrap_or_default();
            column.push((!cell.is_empty()).then(|| cell.to_string()));
        }
    }

    if columns.first().map_or(true, Vec::is_empty) {
        return Err(ParserError::EmptyData { parser });
    }

    let df = build_text_frame(parser, &headers, columns)?;

    Ok(ParsedExport {
        file_hash: content_hash(bytes),
        source_format,
        header_row: header_index,
        headers,
        df,
    })
}

fn build_text_frame(
    parser: &'static str,
    headers: &[String],
    columns: Vec<Vec<Option<String>>>,
) -> Result<DataFrame, ParserError> {
    let mut cols: Vec<Column> = Vec::with_capacity(headers.len());
    for (name, values) in headers.iter().zip(columns) {
        let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
        cols.push(Series::new(name.as_str().into(), utf8).into());
    }

    DataFrame::new(cols).map_err(|source| ParserError::Frame { parser, source })
}
