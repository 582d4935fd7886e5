use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::fields::{ExportKind, Field};

/// Static translation of source-system column codes to canonical fields.
#[derive(Debug)]
pub struct MappingTable {
    pub name: &'static str,
    pub kind: ExportKind,
    pub entries: &'static [(&'static str, Field)],
}

/// Sales "application extract" export.
pub static SALES_EXTRACT: MappingTable = MappingTable {
    name: "sales_extract",
    kind: ExportKind::Sales,
    entries: &[
        ("mmcodcon", Field::CustomerCode),
        ("andescri", Field::Customer),
        ("mvcoddes", Field::ItemCode),
        ("ardesart", Field::Item),
        ("arcodfam", Field::Family),
        ("argrumer", Field::ProductType),
        ("mmtcamag", Field::Origin),
        ("mmdatdoc", Field::Date),
        ("qtano", Field::QuantityKg),
        ("vacaoval", Field::Revenue),
    ],
};

/// Sales "technical" export, priced per movement.
pub static SALES_TECHNICAL: MappingTable = MappingTable {
    name: "sales_technical",
    kind: ExportKind::Sales,
    entries: &[
        ("andescri", Field::Customer),
        ("ardesart", Field::Item),
        ("mmdatdoc", Field::Date),
        ("mmqtamov", Field::MovementQty),
        ("mmprezzo", Field::UnitPrice),
        ("qtano", Field::QuantityKg),
        ("arcodfam", Field::Family),
    ],
};

pub static WAREHOUSE: MappingTable = MappingTable {
    name: "warehouse",
    kind: ExportKind::Warehouse,
    entries: &[
        ("ORIGINE", Field::Origin),
        ("CAT", Field::Category),
        ("TIP", Field::Kind),
        ("KG ACQUISTATI", Field::PurchasedKg),
        ("COSTO TOTALE ACQUISTO", Field::TotalCost),
    ],
};

pub fn tables_for(kind: ExportKind) -> &'static [&'static MappingTable] {
    static SALES: [&MappingTable; 2] = [&SALES_EXTRACT, &SALES_TECHNICAL];
    static STOCK: [&MappingTable; 1] = [&WAREHOUSE];
    match kind {
        ExportKind::Sales => &SALES,
        ExportKind::Warehouse => &STOCK,
    }
}

static SALES_INDEX: Lazy<HashMap<String, Field>> = Lazy::new(|| build_index(ExportKind::Sales));
static WAREHOUSE_INDEX: Lazy<HashMap<String, Field>> =
    Lazy::new(|| build_index(ExportKind::Warehouse));

fn build_index(kind: ExportKind) -> HashMap<String, Field> {
    let mut index = HashMap::new();
    for table in tables_for(kind) {
        for (code, field) in table.entries {
            index.entry(normalize_key(code)).or_insert(*field);
        }
    }
    for field in kind.fields() {
        index
            .entry(field.canonical_name().to_string())
            .or_insert(*field);
    }
    index
}

fn index_for(kind: ExportKind) -> &'static HashMap<String, Field> {
    match kind {
        ExportKind::Sales => &SALES_INDEX,
        ExportKind::Warehouse => &WAREHOUSE_INDEX,
    }
}

pub(crate) fn normalize_key(header: &str) -> String {
    header.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Override,
    Exact,
    Keyword,
    Missing,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Override => "override",
            MatchKind::Exact => "exact",
            MatchKind::Keyword => "keyword",
            MatchKind::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub field: Field,
    pub source: Option<String>,
    pub kind: MatchKind,
}

/// Outcome of resolving one export's headers against the canonical fields.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMapping {
    kind: ExportKind,
    assignments: Vec<Assignment>,
    unmapped: Vec<String>,
}

impl ColumnMapping {
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }

    pub fn source_for(&self, field: Field) -> Option<&str> {
        self.assignments
            .iter()
            .find(|assignment| assignment.field == field)
            .and_then(|assignment| assignment.source.as_deref())
    }

    pub fn match_kind(&self, field: Field) -> MatchKind {
        self.assignments
            .iter()
            .find(|assignment| assignment.field == field)
            .map(|assignment| assignment.kind)
            .unwrap_or(MatchKind::Missing)
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.source_for(field).is_some()
    }

    pub fn missing(&self) -> impl Iterator<Item = Field> + '_ {
        self.assignments
            .iter()
            .filter(|assignment| assignment.kind == MatchKind::Missing)
            .map(|assignment| assignment.field)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMapper {
    kind: ExportKind,
    overrides: HashMap<String, Field>,
}

impl ColumnMapper {
    pub fn for_kind(kind: ExportKind) -> Self {
        Self {
            kind,
            overrides: HashMap::new(),
        }
    }

    /// Adds configured `source code -> field` entries, checked before the static tables.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Field>) -> Result<Self> {
        for (code, field) in overrides {
            if !self.kind.fields().contains(field) {
                return Err(ReportError::Config(format!(
                    "mapping override '{code}' targets {field}, which is not a {} field",
                    self.kind
                )));
            }
            let key = normalize_key(code);
            if key.is_empty() {
                return Err(ReportError::Config(
                    "mapping override with an empty source column".to_string(),
                ));
            }
            self.overrides.insert(key, *field);
        }
        Ok(self)
    }

    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Header cells that identify the column-name row of this kind of export.
    pub fn header_markers(&self) -> Vec<String> {
        let mut markers: Vec<String> = index_for(self.kind)
            .keys()
            .chain(self.overrides.keys())
            .cloned()
            .collect();
        markers.sort();
        markers.dedup();
        markers
    }

    pub fn resolve(&self, headers: &[String]) -> ColumnMapping {
        let keys: Vec<String> = headers.iter().map(|header| normalize_key(header)).collect();
        let mut claimed = vec![false; headers.len()];
        let mut found: HashMap<Field, (usize, MatchKind)> = HashMap::new();
        let index = index_for(self.kind);

        for (lookup, kind) in [
            (&self.overrides, MatchKind::Override),
            (index, MatchKind::Exact),
        ] {
            for (position, key) in keys.iter().enumerate() {
                if claimed[position] {
                    continue;
                }
                if let Some(field) = lookup.get(key) {
                    if !found.contains_key(field) {
                        found.insert(*field, (position, kind));
                        claimed[position] = true;
                    }
                }
            }
        }

        for field in self.kind.fields() {
            if found.contains_key(field) {
                continue;
            }
            let hit = keys.iter().enumerate().find_map(|(position, key)| {
                if claimed[position] {
                    return None;
                }
                field
                    .keywords()
                    .iter()
                    .find(|keyword| key.contains(*keyword))
                    .map(|keyword| (position, *keyword))
            });
            if let Some((position, keyword)) = hit {
                debug!(
                    field = field.canonical_name(),
                    source = %headers[position],
                    keyword,
                    "resolved column by keyword"
                );
                found.insert(*field, (position, MatchKind::Keyword));
                claimed[position] = true;
            }
        }

        let assignments = self
            .kind
            .fields()
            .iter()
            .map(|field| match found.get(field) {
                Some((position, kind)) => Assignment {
                    field: *field,
                    source: Some(headers[*position].clone()),
                    kind: *kind,
                },
                None => Assignment {
                    field: *field,
                    source: None,
                    kind: MatchKind::Missing,
                },
            })
            .collect();

        let unmapped = headers
            .iter()
            .zip(claimed)
            .filter(|(_, claimed)| !claimed)
            .map(|(header, _)| header.clone())
            .collect();

        ColumnMapping {
            kind: self.kind,
            assignments,
            unmapped,
        }
    }
}

/// One mapper per export kind, sharing the configured overrides.
#[derive(Debug, Clone)]
pub struct MapperSet {
    pub sales: ColumnMapper,
    pub warehouse: ColumnMapper,
}

impl MapperSet {
    pub fn new(
        sales_overrides: &BTreeMap<String, Field>,
        warehouse_overrides: &BTreeMap<String, Field>,
    ) -> Result<Self> {
        Ok(Self {
            sales: ColumnMapper::for_kind(ExportKind::Sales).with_overrides(sales_overrides)?,
            warehouse: ColumnMapper::for_kind(ExportKind::Warehouse)
                .with_overrides(warehouse_overrides)?,
        })
    }

    pub fn for_kind(&self, kind: ExportKind) -> &ColumnMapper {
        match kind {
            ExportKind::Sales => &self.sales,
            ExportKind::Warehouse => &self.warehouse,
        }
    }
}

impl Default for MapperSet {
    fn default() -> Self {
        Self {
            sales: ColumnMapper::for_kind(ExportKind::Sales),
            warehouse: ColumnMapper::for_kind(ExportKind::Warehouse),
        }
    }
}
