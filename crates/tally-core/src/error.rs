// crates/tally-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Export parsing failed: {0}")]
    Parser(#[from] tally_parser::ParserError),

    #[error("Config file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Pivot failed: {message}; available columns: {available:?}")]
    Pivot {
        message: String,
        available: Vec<String>,
    },

    #[error("No sales export could be loaded")]
    NoSalesData,
}

pub type Result<T> = std::result::Result<T, ReportError>;
