use std::collections::{BTreeMap, HashMap};

use polars::prelude::*;
use tally_parser::ParsedExport;
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::fields::{
    ExportKind, Field, AVG_COST_COLUMN, COST_COLUMN, MARGIN_COLUMN, UNIT_COST_COLUMN,
};
use crate::mapping::ColumnMapping;
use crate::normalize::{field_columns, number_values, raw_columns};

/// Canonical warehouse frame: origin, category, kind, purchased kg, total
/// cost and the per-row average cost.
pub fn normalize_warehouse(export: &ParsedExport, mapping: &ColumnMapping) -> Result<DataFrame> {
    if mapping.kind() != ExportKind::Warehouse {
        return Err(ReportError::Validation(format!(
            "normalize_warehouse called with a {} mapping",
            mapping.kind()
        )));
    }

    let height = export.height();
    let purchased = number_values(export, mapping, Field::PurchasedKg)?;
    let total_cost = number_values(export, mapping, Field::TotalCost)?;

    let (keep, avg_cost): (Vec<bool>, Vec<Option<f64>>) = match (&purchased, &total_cost) {
        (Some(kg), Some(cost)) => kg
            .iter()
            .zip(cost)
            .map(|(kg, cost)| (*kg > 0.0, (*kg > 0.0).then(|| cost / kg)))
            .unzip(),
        _ => {
            warn!("warehouse export lacks purchased kg or total cost; average cost left empty");
            (vec![true; height], vec![None; height])
        }
    };

    let mut derived = HashMap::new();
    if let Some(kg) = purchased {
        derived.insert(Field::PurchasedKg, kg);
    }
    if let Some(cost) = total_cost {
        derived.insert(Field::TotalCost, cost);
    }

    let mut columns = field_columns(export, mapping, &[], derived)?;
    columns.push(Series::new(AVG_COST_COLUMN.into(), avg_cost).into());
    columns.extend(raw_columns(export, mapping)?);

    let df = DataFrame::new(columns)?;
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    let df = df.filter(&mask)?;

    info!(
        rows = df.height(),
        dropped = height - df.height(),
        "normalized warehouse export"
    );
    Ok(df)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OriginCost {
    pub purchased_kg: f64,
    pub total_cost: f64,
}

impl OriginCost {
    pub fn unit_cost(&self) -> Option<f64> {
        (self.purchased_kg > 0.0).then(|| self.total_cost / self.purchased_kg)
    }
}

/// Weighted average purchase cost per origin.
#[derive(Debug, Clone, Default)]
pub struct CostTable {
    by_origin: BTreeMap<String, OriginCost>,
}

fn origin_key(origin: &str) -> String {
    origin.trim().to_uppercase()
}

impl CostTable {
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let mut table = Self::default();
        table.extend_from_frame(df)?;
        Ok(table)
    }

    pub fn extend_from_frame(&mut self, df: &DataFrame) -> Result<()> {
        let origin = df.column(Field::Origin.canonical_name())?.str()?;
        let purchased = df.column(Field::PurchasedKg.canonical_name())?.f64()?;
        let total_cost = df.column(Field::TotalCost.canonical_name())?.f64()?;

        for idx in 0..df.height() {
            let (Some(origin), Some(kg), Some(cost)) =
                (origin.get(idx), purchased.get(idx), total_cost.get(idx))
            else {
                continue;
            };
            let key = origin_key(origin);
            if key.is_empty() || kg <= 0.0 {
                continue;
            }
            let entry = self.by_origin.entry(key).or_default();
            entry.purchased_kg += kg;
            entry.total_cost += cost;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }

    pub fn get(&self, origin: &str) -> Option<&OriginCost> {
        self.by_origin.get(&origin_key(origin))
    }

    pub fn unit_cost(&self, origin: &str) -> Option<f64> {
        self.get(origin).and_then(OriginCost::unit_cost)
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        let origins: Vec<&str> = self.by_origin.keys().map(String::as_str).collect();
        let purchased: Vec<f64> = self.by_origin.values().map(|c| c.purchased_kg).collect();
        let total_cost: Vec<f64> = self.by_origin.values().map(|c| c.total_cost).collect();
        let avg_cost: Vec<Option<f64>> = self.by_origin.values().map(OriginCost::unit_cost).collect();

        Ok(DataFrame::new(vec![
            Series::new(Field::Origin.canonical_name().into(), origins).into(),
            Series::new(Field::PurchasedKg.canonical_name().into(), purchased).into(),
            Series::new(Field::TotalCost.canonical_name().into(), total_cost).into(),
            Series::new(AVG_COST_COLUMN.into(), avg_cost).into(),
        ])?)
    }

    /// Adds `unit_cost`, `cost` and `margin` to a normalized sales frame.
    /// Rows whose origin has no known cost get a null unit cost and zero cost.
    pub fn apply(&self, sales: &DataFrame) -> Result<DataFrame> {
        let origin = sales.column(Field::Origin.canonical_name())?.str()?;
        let quantity = sales.column(Field::QuantityKg.canonical_name())?.f64()?;
        let revenue = sales.column(Field::Revenue.canonical_name())?.f64()?;

        let len = sales.height();
        let mut unit_costs: Vec<Option<f64>> = Vec::with_capacity(len);
        let mut costs: Vec<f64> = Vec::with_capacity(len);
        let mut margins: Vec<f64> = Vec::with_capacity(len);
        let mut unknown = 0usize;

        for idx in 0..len {
            let unit_cost = origin.get(idx).and_then(|origin| self.unit_cost(origin));
            if unit_cost.is_none() {
                unknown += 1;
            }
            let qty = quantity.get(idx).unwrap_or(0.0);
            let cost = unit_cost.map_or(0.0, |unit| qty * unit);
            unit_costs.push(unit_cost);
            costs.push(cost);
            margins.push(revenue.get(idx).unwrap_or(0.0) - cost);
        }

        if unknown > 0 {
            warn!(rows = unknown, "sales rows without a known origin cost");
        }

        let mut output = sales.clone();
        output.hstack_mut(&[
            Series::new(UNIT_COST_COLUMN.into(), unit_costs).into(),
            Series::new(COST_COLUMN.into(), costs).into(),
            Series::new(MARGIN_COLUMN.into(), margins).into(),
        ])?;
        Ok(output)
    }
}
