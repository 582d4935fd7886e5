use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const COMPANY_COLUMN: &str = "company";
pub const AVG_COST_COLUMN: &str = "avg_cost";
pub const UNIT_COST_COLUMN: &str = "unit_cost";
pub const COST_COLUMN: &str = "cost";
pub const MARGIN_COLUMN: &str = "margin";
pub const MARGIN_PCT_COLUMN: &str = "margin_pct";
pub const ROWS_COLUMN: &str = "rows";
pub const MONTH_COLUMN: &str = "month";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Sales,
    Warehouse,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Sales => "sales",
            ExportKind::Warehouse => "warehouse",
        }
    }

    /// Canonical fields of this kind, in output column order.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            ExportKind::Sales => &SALES_FIELDS,
            ExportKind::Warehouse => &WAREHOUSE_FIELDS,
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sales" | "vendite" => Ok(ExportKind::Sales),
            "warehouse" | "magazzino" | "stock" => Ok(ExportKind::Warehouse),
            other => Err(format!("unknown export kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Text,
    Number,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    CustomerCode,
    Customer,
    ItemCode,
    Item,
    Family,
    ProductType,
    Origin,
    Date,
    QuantityKg,
    MovementQty,
    UnitPrice,
    Revenue,
    Category,
    Kind,
    PurchasedKg,
    TotalCost,
}

pub const SALES_FIELDS: [Field; 12] = [
    Field::CustomerCode,
    Field::Customer,
    Field::ItemCode,
    Field::Item,
    Field::Family,
    Field::ProductType,
    Field::Origin,
    Field::Date,
    Field::QuantityKg,
    Field::MovementQty,
    Field::UnitPrice,
    Field::Revenue,
];

pub const WAREHOUSE_FIELDS: [Field; 5] = [
    Field::Origin,
    Field::Category,
    Field::Kind,
    Field::PurchasedKg,
    Field::TotalCost,
];

impl Field {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Field::CustomerCode => "customer_code",
            Field::Customer => "customer",
            Field::ItemCode => "item_code",
            Field::Item => "item",
            Field::Family => "family",
            Field::ProductType => "product_type",
            Field::Origin => "origin",
            Field::Date => "date",
            Field::QuantityKg => "quantity_kg",
            Field::MovementQty => "movement_qty",
            Field::UnitPrice => "unit_price",
            Field::Revenue => "revenue",
            Field::Category => "category",
            Field::Kind => "kind",
            Field::PurchasedKg => "purchased_kg",
            Field::TotalCost => "total_cost",
        }
    }

    pub fn value_class(&self) -> ValueClass {
        match self {
            Field::Date => ValueClass::Date,
            Field::QuantityKg
            | Field::MovementQty
            | Field::UnitPrice
            | Field::Revenue
            | Field::PurchasedKg
            | Field::TotalCost => ValueClass::Number,
            _ => ValueClass::Text,
        }
    }

    /// Lower-case substrings searched for in the unclaimed headers when no
    /// table entry matched; the leftmost header containing any of them wins.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Field::CustomerCode => &[
                "cod. cliente",
                "cod cliente",
                "codice cliente",
                "codcli",
                "cod.cli",
            ],
            Field::Customer => &["ragione sociale", "cliente", "customer"],
            Field::ItemCode => &[
                "cod. articolo",
                "cod articolo",
                "codice articolo",
                "codart",
            ],
            Field::Item => &["descrizione articolo", "des. articolo", "articolo", "item"],
            Field::Family => &["famiglia", "family", "categoria"],
            Field::ProductType => &["tipo prodotto", "biologico", "bio/conv", "gruppo merc"],
            Field::Origin => &["origine", "provenienza", "origin"],
            Field::Date => &["data documento", "data doc", "data", "date"],
            Field::QuantityKg => &["kg", "chili", "peso"],
            Field::MovementQty => &["quantita", "qta", "quantity"],
            Field::UnitPrice => &["prezzo", "price"],
            Field::Revenue => &["fatturato", "importo", "valore", "totale", "revenue"],
            Field::Category => &["categoria", "category"],
            Field::Kind => &["tipologia", "tipo"],
            Field::PurchasedKg => &["kg acquist", "kg", "quantita"],
            Field::TotalCost => &["costo totale", "costo", "cost"],
        }
    }

    pub fn from_canonical(name: &str) -> Option<Field> {
        let name = name.trim().to_ascii_lowercase();
        SALES_FIELDS
            .iter()
            .chain(WAREHOUSE_FIELDS.iter())
            .copied()
            .find(|field| field.canonical_name() == name)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Field::from_canonical(value).ok_or_else(|| format!("unknown field '{value}'"))
    }
}
