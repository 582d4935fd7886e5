mod common;
mod delimited;
mod workbook;

pub use common::content_hash;
pub use delimited::DelimitedParser;
pub use workbook::WorkbookParser;

pub(crate) use common::{assemble_export, normalize_headers, select_header_row};
pub(crate) use delimited::{decode_text, sniff_delimiter};
pub(crate) use workbook::{render_excel_serial, render_number};
