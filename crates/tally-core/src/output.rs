use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter};
use polars::prelude::*;

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Parquet,
    Json,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        extension.parse().ok()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Json => "json",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" | "pq" => Ok(OutputFormat::Parquet),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unsupported output format '{other}'")),
        }
    }
}

pub fn write_frame(df: &DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let mut file = File::create(path)?;
    let mut clone = df.clone();
    match format {
        OutputFormat::Csv => {
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut clone)?;
        }
        OutputFormat::Parquet => {
            ParquetWriter::new(&mut file)
                .with_compression(ParquetCompression::Zstd(None))
                .finish(&mut clone)?;
        }
        OutputFormat::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(&mut clone)?;
        }
    }
    Ok(())
}

/// Writes using the format implied by the file extension.
pub fn write_frame_by_extension(df: &DataFrame, path: &Path) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path).ok_or_else(|| {
        ReportError::Config(format!(
            "cannot infer output format from '{}'; use .csv, .parquet or .json",
            path.display()
        ))
    })?;
    write_frame(df, path, format)?;
    Ok(format)
}
