use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tally_core::output::{write_frame, write_frame_by_extension, OutputFormat};
use tally_core::ReportError;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tally-output-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir.join(name)
}

fn sample() -> DataFrame {
    DataFrame::new(vec![
        Series::new("item".into(), vec!["AGLIO", "CIPOLLA"]).into(),
        Series::new("revenue".into(), vec![250.0, 0.0]).into(),
    ])
    .expect("sample frame")
}

#[test]
fn formats_are_inferred_from_extensions() {
    assert_eq!(OutputFormat::from_path(Path::new("pivot.csv")), Some(OutputFormat::Csv));
    assert_eq!(OutputFormat::from_path(Path::new("pivot.PARQUET")), Some(OutputFormat::Parquet));
    assert_eq!(OutputFormat::from_path(Path::new("pivot.json")), Some(OutputFormat::Json));
    assert_eq!(OutputFormat::from_path(Path::new("pivot")), None);
    assert!("xlsx".parse::<OutputFormat>().is_err());
}

#[test]
fn csv_output_has_a_header_line() {
    let path = scratch("pivot.csv");
    let format = write_frame_by_extension(&sample(), &path).expect("write csv");
    assert_eq!(format, OutputFormat::Csv);

    let written = fs::read_to_string(&path).expect("read back");
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("item,revenue"));
    assert_eq!(lines.count(), 2);
}

#[test]
fn parquet_output_reads_back() {
    let path = scratch("pivot.parquet");
    write_frame(&sample(), &path, OutputFormat::Parquet).expect("write parquet");

    let file = fs::File::open(&path).expect("open parquet");
    let df = ParquetReader::new(file).finish().expect("read parquet");
    assert_eq!(df.shape(), (2, 2));
}

#[test]
fn json_output_lists_rows() {
    let path = scratch("pivot.json");
    write_frame(&sample(), &path, OutputFormat::Json).expect("write json");
    let written = fs::read_to_string(&path).expect("read back");
    assert!(written.starts_with('['));
    assert!(written.contains("\"CIPOLLA\""));
}

#[test]
fn unknown_extension_is_a_config_error() {
    let err = write_frame_by_extension(&sample(), &scratch("pivot.txt")).expect_err("unknown");
    assert!(matches!(err, ReportError::Config(_)));
}
