use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};

use crate::errors::ParserError;
use crate::formats::assemble_export;
use crate::model::{FileSignature, ParseOptions, ParsedExport, SourceFormat};
use crate::registry::ExportParser;

const PARSER_NAME: &str = "workbook";
const SECONDS_PER_DAY: f64 = 86_400.0;

/// First worksheet of an xlsx/xls workbook.
pub struct WorkbookParser;

impl ExportParser for WorkbookParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn parse(&self, bytes: &[u8], options: &ParseOptions) -> Result<ParsedExport, ParserError> {
        let signature = FileSignature::sniff(bytes);
        if !signature.is_workbook() {
            return Err(ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: format!("{signature} input is not an xlsx/xls workbook"),
            });
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(
            |err| ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: format!("failed to open workbook: {err}"),
            },
        )?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or(ParserError::EmptyData {
                parser: PARSER_NAME,
            })?
            .map_err(|err| ParserError::Workbook {
                parser: PARSER_NAME,
                message: format!("failed to read first worksheet: {err}"),
            })?;

        let grid = range
            .rows()
            .map(|row| row.iter().map(render_cell).collect())
            .collect();

        assemble_export(PARSER_NAME, grid, options, SourceFormat::Workbook, bytes)
    }
}

pub(crate) fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(value) => value.trim().to_string(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => render_number(*value),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => render_excel_serial(value.as_f64()).unwrap_or_default(),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.trim().to_string(),
    }
}

pub(crate) fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Excel serial dates count days from 1899-12-30.
pub(crate) fn render_excel_serial(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let date = epoch.checked_add_signed(Duration::days(days as i64))?;
    if seconds == 0 {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    let datetime = date.and_hms_opt(0, 0, 0)? + Duration::seconds(seconds);
    Some(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
}
