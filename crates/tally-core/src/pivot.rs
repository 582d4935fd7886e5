use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ReportError, Result};
use crate::fields::{
    Field, COMPANY_COLUMN, COST_COLUMN, MARGIN_COLUMN, MARGIN_PCT_COLUMN, MONTH_COLUMN,
    ROWS_COLUMN,
};
use crate::normalize::{days_to_date, is_reserved_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Company,
    Customer,
    Item,
    Family,
    ProductType,
    Origin,
    Month,
}

impl Dimension {
    pub fn column_name(&self) -> &'static str {
        match self {
            Dimension::Company => COMPANY_COLUMN,
            Dimension::Customer => Field::Customer.canonical_name(),
            Dimension::Item => Field::Item.canonical_name(),
            Dimension::Family => Field::Family.canonical_name(),
            Dimension::ProductType => Field::ProductType.canonical_name(),
            Dimension::Origin => Field::Origin.canonical_name(),
            Dimension::Month => MONTH_COLUMN,
        }
    }

    /// Source code of the extract layout, used when the canonical column is empty.
    pub fn legacy_column(&self) -> Option<&'static str> {
        match self {
            Dimension::Customer => Some("andescri"),
            Dimension::Item => Some("ardesart"),
            Dimension::Family => Some("arcodfam"),
            Dimension::ProductType => Some("argrumer"),
            Dimension::Origin => Some("mmtcamag"),
            Dimension::Company | Dimension::Month => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "company" | "azienda" => Ok(Dimension::Company),
            "customer" | "cliente" => Ok(Dimension::Customer),
            "item" | "product" | "articolo" => Ok(Dimension::Item),
            "family" | "famiglia" => Ok(Dimension::Family),
            "product_type" | "type" => Ok(Dimension::ProductType),
            "origin" | "origine" => Ok(Dimension::Origin),
            "month" | "mese" => Ok(Dimension::Month),
            other => Err(format!("unknown pivot dimension '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotSpec {
    pub dimensions: Vec<Dimension>,
}

impl PivotSpec {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }
}

impl Default for PivotSpec {
    fn default() -> Self {
        Self {
            dimensions: vec![Dimension::Company, Dimension::Item],
        }
    }
}

fn available_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn has_values(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|column| column.null_count() < column.len())
        .unwrap_or(false)
}

/// Grouping column for a dimension: the canonical column when it carries
/// data, else the legacy source column, else the first raw column.
fn group_column(df: &DataFrame, dimension: Dimension) -> Result<String> {
    let canonical = dimension.column_name();
    if has_values(df, canonical) || (df.height() == 0 && df.column(canonical).is_ok()) {
        return Ok(canonical.to_string());
    }

    if let Some(legacy) = dimension.legacy_column() {
        if has_values(df, legacy) {
            warn!(dimension = %dimension, column = legacy, "grouping by legacy column");
            return Ok(legacy.to_string());
        }
    }

    let first_raw = df
        .get_column_names()
        .into_iter()
        .find(|name| !is_reserved_column(name.as_str()))
        .map(|name| name.to_string());

    match first_raw {
        Some(raw) => {
            warn!(dimension = %dimension, column = %raw, "grouping by first raw column");
            Ok(raw)
        }
        None if df.column(canonical).is_ok() => Ok(canonical.to_string()),
        None => Err(ReportError::Pivot {
            message: format!("no column available for dimension '{dimension}'"),
            available: available_columns(df),
        }),
    }
}

fn with_month(df: &DataFrame) -> Result<DataFrame> {
    let days = df
        .column(Field::Date.canonical_name())?
        .cast(&DataType::Int32)?;
    let months: Vec<Option<String>> = days
        .i32()?
        .into_iter()
        .map(|value| value.and_then(days_to_date).map(|d| d.format("%Y-%m").to_string()))
        .collect();
    let months: Vec<Option<&str>> = months.iter().map(|v| v.as_deref()).collect();

    let mut output = df.clone();
    output.with_column(Series::new(MONTH_COLUMN.into(), months))?;
    Ok(output)
}

/// Grouped sums of a normalized sales frame, sorted by the group columns.
pub fn build_pivot(sales: &DataFrame, spec: &PivotSpec) -> Result<DataFrame> {
    if spec.dimensions.is_empty() {
        return Err(ReportError::Validation(
            "a pivot needs at least one dimension".to_string(),
        ));
    }

    let frame = if spec.dimensions.contains(&Dimension::Month) {
        with_month(sales)?
    } else {
        sales.clone()
    };

    let mut group_names: Vec<String> = Vec::new();
    for dimension in &spec.dimensions {
        let name = group_column(&frame, *dimension)?;
        if !group_names.contains(&name) {
            group_names.push(name);
        }
    }

    let has_cost = frame.column(COST_COLUMN).is_ok() && frame.column(MARGIN_COLUMN).is_ok();
    let mut aggregations = vec![
        len().alias(ROWS_COLUMN),
        col(Field::QuantityKg.canonical_name()).sum(),
        col(Field::Revenue.canonical_name()).sum(),
    ];
    if has_cost {
        aggregations.push(col(COST_COLUMN).sum());
        aggregations.push(col(MARGIN_COLUMN).sum());
    }

    let keys: Vec<Expr> = group_names.iter().map(|name| col(name.as_str())).collect();
    let pivot = frame
        .lazy()
        .group_by(keys)
        .agg(aggregations)
        .sort(
            group_names.clone(),
            SortMultipleOptions::default().with_nulls_last(true),
        )
        .collect()
        .map_err(|err| ReportError::Pivot {
            message: err.to_string(),
            available: available_columns(sales),
        })?;

    if has_cost {
        with_margin_pct(pivot)
    } else {
        Ok(pivot)
    }
}

fn with_margin_pct(mut pivot: DataFrame) -> Result<DataFrame> {
    let revenue = pivot.column(Field::Revenue.canonical_name())?.f64()?;
    let margin = pivot.column(MARGIN_COLUMN)?.f64()?;
    let pct: Vec<Option<f64>> = revenue
        .into_iter()
        .zip(margin)
        .map(|(revenue, margin)| match (revenue, margin) {
            (Some(revenue), Some(margin)) if revenue != 0.0 => Some(margin / revenue * 100.0),
            _ => None,
        })
        .collect();
    pivot.with_column(Series::new(MARGIN_PCT_COLUMN.into(), pct))?;
    Ok(pivot)
}
