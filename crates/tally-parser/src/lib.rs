pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use formats::content_hash;
pub use model::{
    FileSignature, HeaderRow, ParseOptions, ParsedExport, SourceFormat, DEFAULT_HEADER_SCAN,
};
pub use registry::{parse_export_file, parse_with_parsers, ExportParser};

#[cfg(test)]
mod tests;
