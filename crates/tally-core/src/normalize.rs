use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use polars::prelude::*;
use tally_parser::ParsedExport;
use tracing::{debug, info};

use crate::config::Period;
use crate::error::{ReportError, Result};
use crate::fields::{
    ExportKind, Field, ValueClass, AVG_COST_COLUMN, COMPANY_COLUMN, COST_COLUMN, MARGIN_COLUMN,
    MARGIN_PCT_COLUMN, MONTH_COLUMN, ROWS_COLUMN, SALES_FIELDS, UNIT_COST_COLUMN,
    WAREHOUSE_FIELDS,
};
use crate::mapping::ColumnMapping;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y%m%d", "%d/%m/%y", "%d-%m-%y", "%d.%m.%y",
];
/// `%Y` also takes one or two digits; shorter years belong to the `%y` layouts.
const MIN_FULL_YEAR: i32 = 1000;
const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '\''];

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Stamped on every row of an export without a date column.
    pub today: NaiveDate,
    pub period: Option<Period>,
}

impl NormalizeOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            period: None,
        }
    }

    pub fn with_period(mut self, period: Option<Period>) -> Self {
        self.period = period;
        self
    }
}

/// Lenient number parsing for accounting exports: either decimal separator,
/// thousands grouping, currency symbols, trailing minus, `(x)` negatives.
pub fn parse_amount(text: &str) -> Option<f64> {
    let mut value: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    if value.is_empty() {
        return None;
    }

    let mut negative = false;
    if value.len() > 2 && value.starts_with('(') && value.ends_with(')') {
        negative = true;
        value = value[1..value.len() - 1].to_string();
    }
    if let Some(stripped) = value.strip_suffix('-') {
        negative = !negative;
        value = stripped.to_string();
    }

    let normalized = match (value.rfind(','), value.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => value.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => value.replace(',', ""),
        (Some(_), None) if value.matches(',').count() > 1 => value.replace(',', ""),
        (Some(_), None) => value.replace(',', "."),
        (None, Some(_)) if value.matches('.').count() > 1 => value.replace('.', ""),
        _ => value,
    };

    let parsed: f64 = normalized.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(if negative { -parsed } else { parsed })
}

/// Date part of a cell, ignoring any trailing time.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let date_part = text.trim().split([' ', 'T']).next()?;
    if date_part.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(date_part, fmt)
            .ok()
            .filter(|date| !fmt.contains("%Y") || date.year() >= MIN_FULL_YEAR)
    })
}

/// Days since 1970-01-01, the physical value of a polars `Date`.
pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - DateTime::<Utc>::UNIX_EPOCH.date_naive()).num_days() as i32
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    DateTime::<Utc>::UNIX_EPOCH
        .date_naive()
        .checked_add_signed(Duration::days(days as i64))
}

pub(crate) fn date_series(name: &str, dates: &[Option<NaiveDate>]) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = dates.iter().map(|d| d.map(date_to_days)).collect();
    Series::new(name.into(), days).cast(&DataType::Date)
}

/// Names produced by normalization, pivoting or costing; raw columns that
/// collide with them are prefixed with `raw_`.
pub(crate) fn is_reserved_column(name: &str) -> bool {
    [
        COMPANY_COLUMN,
        AVG_COST_COLUMN,
        UNIT_COST_COLUMN,
        COST_COLUMN,
        MARGIN_COLUMN,
        MARGIN_PCT_COLUMN,
        ROWS_COLUMN,
        MONTH_COLUMN,
    ]
    .contains(&name)
        || SALES_FIELDS
            .iter()
            .chain(WAREHOUSE_FIELDS.iter())
            .any(|field| field.canonical_name() == name)
}

pub(crate) fn text_column(
    export: &ParsedExport,
    mapping: &ColumnMapping,
    field: Field,
) -> Result<Column> {
    let name = field.canonical_name();
    match mapping.source_for(field) {
        Some(source) => {
            let mut series = export.text_column(source)?.clone().into_series();
            series.rename(name.into());
            Ok(series.into())
        }
        None => Ok(Series::full_null(name.into(), export.height(), &DataType::String).into()),
    }
}

/// Parsed numbers with unparseable cells as zero; `None` when the field is unmapped.
pub(crate) fn number_values(
    export: &ParsedExport,
    mapping: &ColumnMapping,
    field: Field,
) -> Result<Option<Vec<f64>>> {
    let Some(source) = mapping.source_for(field) else {
        return Ok(None);
    };
    let values = export.text_column(source)?;
    Ok(Some(
        values
            .into_iter()
            .map(|value| value.and_then(parse_amount).unwrap_or(0.0))
            .collect(),
    ))
}

pub(crate) fn raw_columns(export: &ParsedExport, mapping: &ColumnMapping) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(mapping.unmapped().len());
    for name in mapping.unmapped() {
        let mut series = export.df.column(name)?.as_materialized_series().clone();
        if is_reserved_column(name) {
            series.rename(format!("raw_{name}").into());
        }
        columns.push(series.into());
    }
    Ok(columns)
}

/// One column per field of the mapping's kind, in field order, typed by the
/// field's value class. Numbers come from `derived` when present, otherwise
/// from the mapped source column (zero when unmapped).
pub(crate) fn field_columns(
    export: &ParsedExport,
    mapping: &ColumnMapping,
    dates: &[Option<NaiveDate>],
    mut derived: HashMap<Field, Vec<f64>>,
) -> Result<Vec<Column>> {
    let height = export.height();
    let mut columns = Vec::with_capacity(mapping.kind().fields().len());
    for field in mapping.kind().fields() {
        let name = field.canonical_name();
        let column = match field.value_class() {
            ValueClass::Text => text_column(export, mapping, *field)?,
            ValueClass::Date => date_series(name, dates)?.into(),
            ValueClass::Number => {
                let values = match derived.remove(field) {
                    Some(values) => values,
                    None => number_values(export, mapping, *field)?
                        .unwrap_or_else(|| vec![0.0; height]),
                };
                Series::new(name.into(), values).into()
            }
        };
        columns.push(column);
    }
    Ok(columns)
}

/// Builds the canonical sales frame for one company export: `company`, every
/// sales field, then the unmapped source columns as text.
pub fn normalize_sales(
    export: &ParsedExport,
    company: &str,
    mapping: &ColumnMapping,
    options: &NormalizeOptions,
) -> Result<DataFrame> {
    if mapping.kind() != ExportKind::Sales {
        return Err(ReportError::Validation(format!(
            "normalize_sales called with a {} mapping",
            mapping.kind()
        )));
    }

    let height = export.height();

    let dates: Vec<Option<NaiveDate>> = match mapping.source_for(Field::Date) {
        Some(source) => export
            .text_column(source)?
            .into_iter()
            .map(|value| value.and_then(parse_date))
            .collect(),
        None => {
            debug!(company, "no date column, stamping rows with today");
            vec![Some(options.today); height]
        }
    };

    let zeros = || vec![0.0; height];
    let movement = number_values(export, mapping, Field::MovementQty)?;
    let quantity = match number_values(export, mapping, Field::QuantityKg)? {
        Some(values) => values,
        None => {
            debug!(company, "quantity_kg unmapped, falling back to movement_qty");
            movement.clone().unwrap_or_else(zeros)
        }
    };
    let unit_price = number_values(export, mapping, Field::UnitPrice)?;
    let revenue = match number_values(export, mapping, Field::Revenue)? {
        Some(values) => values,
        None => match &unit_price {
            Some(prices) => quantity
                .iter()
                .zip(prices)
                .map(|(qty, price)| qty * price)
                .collect(),
            None => zeros(),
        },
    };

    let derived = HashMap::from([
        (Field::QuantityKg, quantity),
        (Field::MovementQty, movement.unwrap_or_else(zeros)),
        (Field::UnitPrice, unit_price.unwrap_or_else(zeros)),
        (Field::Revenue, revenue),
    ]);

    let mut columns: Vec<Column> = Vec::with_capacity(SALES_FIELDS.len() + 1);
    columns.push(Series::new(COMPANY_COLUMN.into(), vec![company; height]).into());
    columns.extend(field_columns(export, mapping, &dates, derived)?);
    columns.extend(raw_columns(export, mapping)?);

    let df = DataFrame::new(columns)?;

    let df = match options.period {
        Some(period) => {
            let keep: Vec<bool> = dates
                .iter()
                .map(|date| date.is_some_and(|date| period.contains(date)))
                .collect();
            let mask = BooleanChunked::from_slice("keep".into(), &keep);
            df.filter(&mask)?
        }
        None => df,
    };

    info!(
        company,
        rows = df.height(),
        dropped = height - df.height(),
        "normalized sales export"
    );

    Ok(df)
}

/// Stacks frames by column name; a column absent from a frame becomes nulls.
pub fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for frame in &frames {
        for name in frame.get_column_names() {
            if !names.iter().any(|existing| existing == name.as_str()) {
                names.push(name.to_string());
            }
        }
    }

    let mut aligned = Vec::with_capacity(frames.len());
    for mut frame in frames {
        let height = frame.height();
        for name in &names {
            if frame.column(name).is_err() {
                frame.with_column(Series::full_null(
                    name.as_str().into(),
                    height,
                    &DataType::String,
                ))?;
            }
        }
        aligned.push(frame.select(names.iter().map(String::as_str))?);
    }

    match aligned.len() {
        0 => Ok(DataFrame::default()),
        1 => Ok(aligned.remove(0)),
        _ => {
            let mut iter = aligned.into_iter();
            let mut combined = iter.next().unwrap_or_default();
            for df in iter {
                combined.vstack_mut(&df)?;
            }
            Ok(combined)
        }
    }
}
