pub mod config;
pub mod error;
pub mod fields;
pub mod ingestion;
pub mod mapping;
pub mod normalize;
pub mod output;
pub mod pivot;
pub mod report;
pub mod warehouse;

pub use error::{ReportError, Result};
