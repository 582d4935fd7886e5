use std::borrow::Cow;
use std::collections::HashMap;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;

use crate::errors::ParserError;
use crate::formats::assemble_export;
use crate::model::{FileSignature, ParseOptions, ParsedExport, SourceFormat};
use crate::registry::ExportParser;

const PARSER_NAME: &str = "delimited_text";
const CANDIDATE_DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];
const SNIFF_LINES: usize = 20;

/// CSV-like exports with a sniffed delimiter.
pub struct DelimitedParser;

impl ExportParser for DelimitedParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedExport, ParserError> {
        let signature = FileSignature::sniff(bytes);
        if signature != FileSignature::Text {
            return Err(ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: format!("{signature} input is not delimited text"),
            });
        }
        let text = decode_text(bytes);

        let delimiter = sniff_delimiter(&text).ok_or_else(|| ParserError::FormatMismatch {
            parser: PARSER_NAME,
            reason: "no delimiter produced more than one column".to_string(),
        })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|source| ParserError::Csv {
                parser: PARSER_NAME,
                source,
            })?;
            grid.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        assemble_export(
            PARSER_NAME,
            grid,
            options,
            SourceFormat::Delimited { delimiter },
            bytes,
        )
    }
}

/// UTF-8 with the BOM stripped; Windows-1252 (the Latin-1 superset Italian
/// Windows installs export in) when the bytes are not valid UTF-8.
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// The delimiter whose most common field count (above one) covers the most
/// of the leading lines.
pub(crate) fn sniff_delimiter(text: &str) -> Option<u8> {
    let sample: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return None;
    }
    let sample = sample.join("\n");

    let mut best: Option<(u8, usize, usize)> = None;
    for delimiter in CANDIDATE_DELIMITERS {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes());

        let mut frequencies: HashMap<usize, usize> = HashMap::new();
        for record in reader.records().flatten() {
            *frequencies.entry(record.len()).or_default() += 1;
        }

        let Some((width, lines)) = frequencies
            .into_iter()
            .filter(|(width, _)| *width > 1)
            .max_by_key(|(width, lines)| (*lines, *width))
        else {
            continue;
        };

        let better = match best {
            None => true,
            Some((_, best_width, best_lines)) => {
                lines > best_lines || (lines == best_lines && width > best_width)
            }
        };
        if better {
            best = Some((delimiter, width, lines));
        }
    }

    best.map(|(delimiter, _, _)| delimiter)
}
