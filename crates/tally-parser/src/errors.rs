use std::fmt;

use thiserror::Error;

use crate::model::FileSignature;

/// A parser that declined the input, and why.
#[derive(Debug, Clone)]
pub struct ParserAttempt {
    pub parser: &'static str,
    pub signature: FileSignature,
    pub message: String,
}

impl fmt::Display for ParserAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} input: {}", self.parser, self.signature, self.message)
    }
}

fn list_attempts(attempts: &[ParserAttempt]) -> String {
    attempts
        .iter()
        .map(ParserAttempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ParserError {
    /// The bytes are not this parser's format; the registry moves on.
    #[error("{parser} does not accept this file: {reason}")]
    FormatMismatch {
        parser: &'static str,
        reason: String,
    },

    #[error("{parser}: header row {row_index} requested but the file has {rows} non-empty rows")]
    HeaderOutOfRange {
        parser: &'static str,
        row_index: usize,
        rows: usize,
    },

    #[error("{parser}: malformed delimited text: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser}: {message}")]
    Workbook {
        parser: &'static str,
        message: String,
    },

    #[error("{parser}: could not build the export table: {source}")]
    Frame {
        parser: &'static str,
        #[source]
        source: polars::error::PolarsError,
    },

    #[error("{parser}: no data rows below the header")]
    EmptyData { parser: &'static str },

    #[error("no parser accepts this {signature} input ({})", list_attempts(.attempts))]
    NoMatchingParser {
        signature: FileSignature,
        attempts: Vec<ParserAttempt>,
    },
}

impl ParserError {
    /// Name of the parser that raised the error, if a single parser did.
    pub fn parser_name(&self) -> Option<&'static str> {
        match self {
            ParserError::FormatMismatch { parser, .. }
            | ParserError::HeaderOutOfRange { parser, .. }
            | ParserError::Csv { parser, .. }
            | ParserError::Workbook { parser, .. }
            | ParserError::Frame { parser, .. }
            | ParserError::EmptyData { parser } => Some(*parser),
            ParserError::NoMatchingParser { .. } => None,
        }
    }
}
