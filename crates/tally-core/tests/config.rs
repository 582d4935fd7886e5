mod common;

use tally_core::config::{Period, ReportConfig};
use tally_core::fields::{ExportKind, Field};
use tally_core::pivot::Dimension;
use tally_core::ReportError;

use common::{date, fixture_dir};

const CONFIG: &str = r#"
[period]
start = "2025-12-01"
end = "2025-12-31"

[pivot]
dimensions = ["company", "origin"]

[[companies]]
name = "TA.TA Srl"
sales = ["vendite_*.csv", "archivio_*.xlsx"]
warehouse = ["magazzino.csv"]
header_row = 1

[[companies]]
name = "Giardino"
sales = ["vendite_varianti.tsv"]

[mappings.sales]
"Totale KG" = "quantity_kg"
"#;

#[test]
fn config_parses_all_sections() {
    let config = ReportConfig::from_toml_str(CONFIG).expect("parse config");

    assert_eq!(
        config.period,
        Some(Period {
            start: date(2025, 12, 1),
            end: date(2025, 12, 31)
        })
    );
    assert_eq!(config.pivot.dimensions, vec![Dimension::Company, Dimension::Origin]);
    assert_eq!(config.companies.len(), 2);
    assert_eq!(config.companies[0].header_row, Some(1));
    assert_eq!(config.companies[1].header_row, None);
    assert_eq!(
        config.mappings.sales.get("Totale KG"),
        Some(&Field::QuantityKg)
    );
    config.validate().expect("valid config");
}

#[test]
fn defaults_apply_to_a_minimal_config() {
    let config = ReportConfig::from_toml_str("[[companies]]\nname = \"A\"\n").expect("parse");
    assert!(config.period.is_none());
    assert_eq!(config.pivot_spec().dimensions, vec![Dimension::Company, Dimension::Item]);
    config.validate().expect("valid config");
}

#[test]
fn validation_rejects_bad_configs() {
    let empty = ReportConfig::from_toml_str("").expect("parse");
    assert!(matches!(empty.validate(), Err(ReportError::Config(_))));

    let duplicated = ReportConfig::from_toml_str(
        "[[companies]]\nname = \"Rossi\"\n[[companies]]\nname = \"ROSSI \"\n",
    )
    .expect("parse");
    assert!(matches!(duplicated.validate(), Err(ReportError::Config(_))));

    let reversed = ReportConfig::from_toml_str(
        "[period]\nstart = \"2025-12-31\"\nend = \"2025-12-01\"\n[[companies]]\nname = \"A\"\n",
    )
    .expect("parse");
    assert!(matches!(reversed.validate(), Err(ReportError::Config(_))));

    let wrong_kind = ReportConfig::from_toml_str(
        "[[companies]]\nname = \"A\"\n[mappings.sales]\n\"KG ACQ\" = \"purchased_kg\"\n",
    )
    .expect("parse");
    assert!(matches!(wrong_kind.validate(), Err(ReportError::Config(_))));
}

#[test]
fn unknown_fields_fail_to_parse() {
    let err = ReportConfig::from_toml_str(
        "[[companies]]\nname = \"A\"\n[mappings.sales]\n\"x\" = \"weight\"\n",
    )
    .expect_err("unknown field");
    assert!(matches!(err, ReportError::Toml(_)));
}

#[test]
fn inputs_resolve_relative_to_the_config() {
    let mut config = ReportConfig::from_toml_str(CONFIG).expect("parse config");
    config.base_dir = fixture_dir();

    let inputs = config.resolve_inputs().expect("resolve inputs");
    let names: Vec<(String, ExportKind, Option<usize>)> = inputs
        .iter()
        .map(|input| {
            (
                format!(
                    "{}:{}",
                    input.company,
                    input
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
                input.kind,
                input.header_row,
            )
        })
        .collect();

    assert_eq!(
        names,
        vec![
            ("TA.TA Srl:vendite_estratto.csv".to_string(), ExportKind::Sales, Some(1)),
            ("TA.TA Srl:vendite_latin1.csv".to_string(), ExportKind::Sales, Some(1)),
            ("TA.TA Srl:vendite_tecnico.csv".to_string(), ExportKind::Sales, Some(1)),
            ("TA.TA Srl:magazzino.csv".to_string(), ExportKind::Warehouse, None),
            ("Giardino:vendite_varianti.tsv".to_string(), ExportKind::Sales, None),
        ]
    );
}

#[test]
fn period_bounds_are_inclusive() {
    let period = Period::new(date(2025, 12, 1), date(2025, 12, 31)).expect("period");
    assert!(period.contains(date(2025, 12, 1)));
    assert!(period.contains(date(2025, 12, 31)));
    assert!(!period.contains(date(2026, 1, 1)));
    assert!(Period::new(date(2025, 12, 2), date(2025, 12, 1)).is_err());
}
