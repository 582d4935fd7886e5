use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{DelimitedParser, WorkbookParser};
use crate::model::{FileSignature, ParseOptions, ParsedExport};

pub trait ExportParser {
    fn name(&self) -> &'static str;
    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedExport, ParserError>;
}

/// Workbooks first, delimited text as the fallback.
pub fn parse_export_file(bytes: &[u8], options: &ParseOptions) -> Result<ParsedExport, ParserError> {
    parse_with_parsers(bytes, options, &[&WorkbookParser, &DelimitedParser])
}

/// Runs `parsers` in order. A parser that declines the bytes is recorded as
/// an attempt; any other failure ends the search.
pub fn parse_with_parsers(
    bytes: &[u8],
    options: &ParseOptions,
    parsers: &[&dyn ExportParser],
) -> Result<ParsedExport, ParserError> {
    let signature = FileSignature::sniff(bytes);
    let mut attempts = Vec::with_capacity(parsers.len());

    for parser in parsers {
        match parser.parse(bytes, options) {
            Err(ParserError::FormatMismatch { reason, .. }) => attempts.push(ParserAttempt {
                parser: parser.name(),
                signature,
                message: reason,
            }),
            result => return result,
        }
    }

    Err(ParserError::NoMatchingParser {
        signature,
        attempts,
    })
}
