#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tally_core::fields::ExportKind;
use tally_core::mapping::{ColumnMapper, ColumnMapping};
use tally_parser::{parse_export_file, HeaderRow, ParseOptions, ParsedExport};

pub fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../tally-parser/tests/data")
}

pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_dir().join(name)).expect("read fixture")
}

pub fn parse(name: &str, kind: ExportKind) -> (ParsedExport, ColumnMapping) {
    let mapper = ColumnMapper::for_kind(kind);
    let options = ParseOptions::with_header_row(HeaderRow::detect(mapper.header_markers()));
    let export = parse_export_file(&fixture(name), &options).expect("parse fixture");
    let mapping = mapper.resolve(&export.headers);
    (export, mapping)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
