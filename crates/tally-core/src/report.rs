use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::fields::{ExportKind, Field};
use crate::ingestion::{FileReport, IngestionBatch};
use crate::mapping::{ColumnMapping, MapperSet};
use crate::normalize::{concat_frames, normalize_sales, NormalizeOptions};
use crate::pivot::{build_pivot, PivotSpec};
use crate::warehouse::{normalize_warehouse, CostTable};

/// Sales fields a pivot is meaningless without.
const KEY_SALES_FIELDS: [Field; 3] = [Field::Item, Field::QuantityKg, Field::Revenue];

#[derive(Debug, Clone)]
pub struct MappingReport {
    pub path: String,
    pub company: String,
    pub mapping: ColumnMapping,
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub normalize: NormalizeOptions,
    pub pivot: PivotSpec,
}

#[derive(Debug)]
pub struct Report {
    pub sales: DataFrame,
    pub warehouse: Option<DataFrame>,
    pub costs: CostTable,
    pub pivot: DataFrame,
    pub mappings: Vec<MappingReport>,
    pub files: Vec<FileReport>,
}

/// Maps, normalizes and aggregates an ingested batch. Margin columns are
/// present only when at least one warehouse export yielded a cost.
pub fn build_report(
    batch: IngestionBatch,
    mappers: &MapperSet,
    options: &ReportOptions,
) -> Result<Report> {
    let mut sales_frames = Vec::new();
    let mut warehouse_frames = Vec::new();
    let mut costs = CostTable::default();
    let mut mappings = Vec::with_capacity(batch.parsed.len());

    for ingested in batch.parsed {
        let mapping = mappers
            .for_kind(ingested.kind)
            .resolve(&ingested.export.headers);

        match ingested.kind {
            ExportKind::Sales => {
                for field in KEY_SALES_FIELDS {
                    if !mapping.is_mapped(field) {
                        warn!(
                            path = %ingested.path,
                            company = %ingested.company,
                            field = field.canonical_name(),
                            "sales export has no column for field"
                        );
                    }
                }
                sales_frames.push(normalize_sales(
                    &ingested.export,
                    &ingested.company,
                    &mapping,
                    &options.normalize,
                )?);
            }
            ExportKind::Warehouse => {
                let frame = normalize_warehouse(&ingested.export, &mapping)?;
                costs.extend_from_frame(&frame)?;
                warehouse_frames.push(frame);
            }
        }

        mappings.push(MappingReport {
            path: ingested.path,
            company: ingested.company,
            mapping,
        });
    }

    if sales_frames.is_empty() {
        return Err(ReportError::NoSalesData);
    }

    let mut sales = concat_frames(sales_frames)?;
    if !costs.is_empty() {
        sales = costs.apply(&sales)?;
    }

    let warehouse = if warehouse_frames.is_empty() {
        None
    } else {
        Some(concat_frames(warehouse_frames)?)
    };

    let pivot = build_pivot(&sales, &options.pivot)?;
    info!(
        sales_rows = sales.height(),
        pivot_rows = pivot.height(),
        origins_with_cost = costs.len(),
        "report built"
    );

    Ok(Report {
        sales,
        warehouse,
        costs,
        pivot,
        mappings,
        files: batch.reports,
    })
}
