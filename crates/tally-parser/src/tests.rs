use std::fs;
use std::path::PathBuf;

use crate::errors::ParserError;
use crate::formats::{
    decode_text, normalize_headers, render_excel_serial, render_number, select_header_row,
    sniff_delimiter, DelimitedParser, WorkbookParser,
};
use crate::model::{FileSignature, HeaderRow, ParseOptions, SourceFormat};
use crate::registry::ExportParser;
use crate::{content_hash, parse_export_file};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn sales_markers() -> HeaderRow {
    HeaderRow::detect(["mmcodcon", "andescri", "ardesart", "qtano", "vacaoval", "mmdatdoc"])
}

fn cells(export: &crate::ParsedExport, column: &str) -> Vec<Option<String>> {
    export
        .text_column(column)
        .expect("text column missing")
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect()
}

#[test]
fn detects_header_below_description_row() {
    let content = fixture("vendite_estratto.csv");
    let options = ParseOptions::with_header_row(sales_markers());
    let parsed = parse_export_file(&content, &options).expect("extract parse failed");

    assert_eq!(parsed.source_format, SourceFormat::Delimited { delimiter: b';' });
    assert_eq!(parsed.header_row, 1);
    assert_eq!(parsed.headers.len(), 10);
    assert_eq!(parsed.headers[0], "mmcodcon");
    assert_eq!(parsed.height(), 5);
    assert_eq!(
        cells(&parsed, "qtano"),
        vec![
            Some("100".to_string()),
            Some("50,5".to_string()),
            Some("200".to_string()),
            Some("30".to_string()),
            Some("n.d.".to_string()),
        ]
    );
    assert_eq!(cells(&parsed, "vacaoval")[4], None);
}

#[test]
fn fixed_header_row_is_honoured() {
    let content = fixture("vendite_estratto.csv");
    let options = ParseOptions::with_header_row(HeaderRow::Fixed(1));
    let parsed = parse_export_file(&content, &options).expect("extract parse failed");
    assert_eq!(parsed.headers[1], "andescri");
    assert_eq!(parsed.height(), 5);
}

#[test]
fn header_row_past_end_is_rejected() {
    let content = fixture("vendite_tecnico.csv");
    let options = ParseOptions::with_header_row(HeaderRow::Fixed(12));
    let err = parse_export_file(&content, &options).expect_err("header row should be invalid");
    assert!(matches!(
        err,
        ParserError::HeaderOutOfRange {
            row_index: 12,
            rows: 4,
            ..
        }
    ));
}

#[test]
fn parses_comma_separated_export() {
    let content = fixture("vendite_tecnico.csv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("technical parse failed");

    assert_eq!(parsed.source_format, SourceFormat::Delimited { delimiter: b',' });
    assert_eq!(parsed.header_row, 0);
    assert_eq!(parsed.height(), 3);
    assert_eq!(
        cells(&parsed, "mmprezzo"),
        vec![
            Some("2.5".to_string()),
            Some("1.25".to_string()),
            Some("abc".to_string()),
        ]
    );
}

#[test]
fn parses_tab_separated_export() {
    let content = fixture("vendite_varianti.tsv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("variant parse failed");

    assert_eq!(parsed.source_format, SourceFormat::Delimited { delimiter: b'\t' });
    assert_eq!(parsed.headers.len(), 8);
    assert_eq!(parsed.headers[5], "Quantita KG");
    assert_eq!(
        cells(&parsed, "Note"),
        vec![None, Some("Reso".to_string())]
    );
}

#[test]
fn latin1_exports_are_decoded() {
    let content = fixture("vendite_latin1.csv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("latin-1 parse failed");
    assert_eq!(cells(&parsed, "andescri"), vec![Some("CITTà SRL".to_string())]);
}

#[test]
fn windows_1252_euro_sign_is_decoded() {
    let content = fixture("vendite_cp1252.csv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("cp1252 parse failed");
    assert_eq!(cells(&parsed, "andescri"), vec![Some("CITTà SRL".to_string())]);
    assert_eq!(cells(&parsed, "vacaoval"), vec![Some("€ 12,00".to_string())]);
}

#[test]
fn workbook_export_is_read_from_the_first_sheet() {
    let content = fixture("vendite_estratto.xlsx");
    let options = ParseOptions::with_header_row(sales_markers());
    let parsed = parse_export_file(&content, &options).expect("workbook parse failed");

    assert_eq!(parsed.source_format, SourceFormat::Workbook);
    assert_eq!(parsed.header_row, 1);
    assert_eq!(
        parsed.headers,
        vec!["mmcodcon", "andescri", "ardesart", "mmdatdoc", "qtano", "vacaoval"]
    );
    assert_eq!(parsed.height(), 2);
    assert_eq!(
        cells(&parsed, "mmdatdoc"),
        vec![
            Some("2025-12-01".to_string()),
            Some("2025-12-05 12:00:00".to_string()),
        ]
    );
    assert_eq!(
        cells(&parsed, "qtano"),
        vec![Some("100".to_string()), Some("12.25".to_string())]
    );
    assert_eq!(
        cells(&parsed, "vacaoval"),
        vec![Some("250.5".to_string()), Some("30".to_string())]
    );
}

#[test]
fn workbook_parser_accepts_workbook_bytes_directly() {
    let content = fixture("vendite_estratto.xlsx");
    let parsed = WorkbookParser
        .parse(&content, &ParseOptions::with_header_row(HeaderRow::Fixed(1)))
        .expect("workbook parse failed");
    assert_eq!(cells(&parsed, "andescri")[1], Some("BIANCHI".to_string()));
}

#[test]
fn signatures_classify_leading_bytes() {
    assert_eq!(FileSignature::sniff(b""), FileSignature::Empty);
    assert_eq!(FileSignature::sniff(b"PK\x03\x04rest"), FileSignature::ZipArchive);
    assert_eq!(
        FileSignature::sniff(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]),
        FileSignature::CompoundDocument
    );
    assert_eq!(FileSignature::sniff(b"kg\0\0"), FileSignature::Binary);
    assert_eq!(FileSignature::sniff(b"kg;valore\n"), FileSignature::Text);
    assert!(FileSignature::ZipArchive.is_workbook());
    assert!(!FileSignature::Text.is_workbook());
}

#[test]
fn blank_and_repeated_headers_are_renamed() {
    let content = fixture("duplicati.csv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("duplicate parse failed");

    assert_eq!(
        parsed.headers,
        vec!["articolo", "column_2", "articolo_2", "kg"]
    );
    assert_eq!(parsed.height(), 2);
    assert_eq!(
        cells(&parsed, "articolo_2"),
        vec![Some("BIANCO".to_string()), Some("ROSSA".to_string())]
    );
}

#[test]
fn header_without_rows_is_empty_data() {
    let content = fixture("solo_intestazione.csv");
    let err = parse_export_file(&content, &ParseOptions::default())
        .expect_err("header-only file should fail");
    assert!(matches!(err, ParserError::EmptyData { parser: "delimited_text" }));
}

#[test]
fn single_column_text_matches_no_parser() {
    let content = fixture("senza_colonne.txt");
    let err = parse_export_file(&content, &ParseOptions::default())
        .expect_err("single column text should not parse");

    match err {
        ParserError::NoMatchingParser {
            signature,
            attempts,
        } => {
            assert_eq!(signature, FileSignature::Text);
            let names: Vec<&str> = attempts.iter().map(|attempt| attempt.parser).collect();
            assert_eq!(names, vec!["workbook", "delimited_text"]);
            assert!(attempts[0].to_string().starts_with("workbook on text input"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn workbook_parser_rejects_plain_text() {
    let content = fixture("vendite_tecnico.csv");
    let err = WorkbookParser
        .parse(&content, &ParseOptions::default())
        .expect_err("text is not a workbook");
    assert!(matches!(err, ParserError::FormatMismatch { parser: "workbook", .. }));
}

#[test]
fn corrupt_zip_falls_back_to_next_parser() {
    let mut content = b"PK\x03\x04".to_vec();
    content.extend_from_slice(&[0u8; 32]);
    let err = parse_export_file(&content, &ParseOptions::default())
        .expect_err("corrupt archive should not parse");

    match err {
        ParserError::NoMatchingParser {
            signature,
            attempts,
        } => {
            assert_eq!(signature, FileSignature::ZipArchive);
            assert_eq!(attempts.len(), 2);
            assert!(attempts[0].message.contains("failed to open workbook"));
            assert!(attempts[1].message.contains("not delimited text"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn delimited_parser_reports_its_name_in_errors() {
    let err = DelimitedParser
        .parse(b"\n\n", &ParseOptions::default())
        .expect_err("empty input should not parse");
    assert_eq!(err.parser_name(), Some("delimited_text"));
}

#[test]
fn sniffing_prefers_the_most_consistent_delimiter() {
    assert_eq!(sniff_delimiter("a;b;c\n1;2,5;3\n4;5,5;6\n"), Some(b';'));
    assert_eq!(sniff_delimiter("a,b\n1,2\n"), Some(b','));
    assert_eq!(sniff_delimiter("a|b|c\n1|2|3\n"), Some(b'|'));
    assert_eq!(sniff_delimiter("solo\nuna\ncolonna\n"), None);
}

#[test]
fn decoding_strips_utf8_bom() {
    assert_eq!(decode_text(b"\xEF\xBB\xBFkg;valore"), "kg;valore");
    assert_eq!(decode_text(b"caf\xe9"), "café");
    assert_eq!(decode_text(b"\x80 12,00"), "€ 12,00");
}

#[test]
fn header_detection_prefers_most_markers() {
    let rows = vec![
        vec!["Vendite dicembre".to_string()],
        vec!["andescri".to_string(), "note".to_string()],
        vec!["andescri".to_string(), "QTANO".to_string(), "ardesart".to_string()],
    ];
    let index = select_header_row("test", &rows, &sales_markers()).expect("detect header");
    assert_eq!(index, 2);

    let none = vec![vec!["x".to_string()], vec!["y".to_string()]];
    let index = select_header_row("test", &none, &sales_markers()).expect("detect header");
    assert_eq!(index, 0);
}

#[test]
fn header_names_are_made_unique() {
    let raw = vec![
        "kg".to_string(),
        " ".to_string(),
        "kg".to_string(),
        "kg_2".to_string(),
    ];
    assert_eq!(normalize_headers(&raw), vec!["kg", "column_2", "kg_2", "kg_2_2"]);
}

#[test]
fn workbook_cells_render_as_text() {
    assert_eq!(render_number(100.0), "100");
    assert_eq!(render_number(50.5), "50.5");
    assert_eq!(render_excel_serial(45992.0).as_deref(), Some("2025-12-01"));
    assert_eq!(
        render_excel_serial(45992.5).as_deref(),
        Some("2025-12-01 12:00:00")
    );
}

#[test]
fn content_hash_is_stable() {
    let content = fixture("magazzino.csv");
    let parsed =
        parse_export_file(&content, &ParseOptions::default()).expect("warehouse parse failed");
    assert_eq!(parsed.file_hash, content_hash(&content));
    assert_eq!(parsed.file_hash.len(), 64);
    assert_ne!(parsed.file_hash, content_hash(b"other"));
}
