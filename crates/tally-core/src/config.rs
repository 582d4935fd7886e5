use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ReportError, Result};
use crate::fields::{ExportKind, Field};
use crate::mapping::MapperSet;
use crate::pivot::{Dimension, PivotSpec};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let period = Self { start, end };
        period.validate()?;
        Ok(period)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(ReportError::Config(format!(
                "period start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotConfig {
    #[serde(default = "default_dimensions")]
    pub dimensions: Vec<Dimension>,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            dimensions: default_dimensions(),
        }
    }
}

fn default_dimensions() -> Vec<Dimension> {
    PivotSpec::default().dimensions
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyConfig {
    pub name: String,
    /// Glob patterns, relative to the config file.
    #[serde(default)]
    pub sales: Vec<String>,
    #[serde(default)]
    pub warehouse: Vec<String>,
    /// Forces the header row of this company's sales exports instead of detecting it.
    #[serde(default)]
    pub header_row: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingOverrides {
    #[serde(default)]
    pub sales: BTreeMap<String, Field>,
    #[serde(default)]
    pub warehouse: BTreeMap<String, Field>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default)]
    pub pivot: PivotConfig,
    #[serde(default)]
    pub companies: Vec<CompanyConfig>,
    #[serde(default)]
    pub mappings: MappingOverrides,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// A concrete file matched by a company's patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub company: String,
    pub kind: ExportKind,
    pub path: PathBuf,
    pub header_row: Option<usize>,
}

impl ReportConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReportConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.companies.is_empty() {
            return Err(ReportError::Config(
                "at least one [[companies]] entry is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for company in &self.companies {
            let name = company.name.trim();
            if name.is_empty() {
                return Err(ReportError::Config("company name cannot be empty".to_string()));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(ReportError::Config(format!(
                    "company '{name}' is listed more than once"
                )));
            }
        }

        if let Some(period) = &self.period {
            period.validate()?;
        }

        if self.pivot.dimensions.is_empty() {
            return Err(ReportError::Config(
                "pivot.dimensions cannot be empty".to_string(),
            ));
        }

        self.mappers()?;
        Ok(())
    }

    pub fn mappers(&self) -> Result<MapperSet> {
        MapperSet::new(&self.mappings.sales, &self.mappings.warehouse)
    }

    pub fn pivot_spec(&self) -> PivotSpec {
        PivotSpec::new(self.pivot.dimensions.clone())
    }

    /// Expands every company's glob patterns; patterns matching nothing are
    /// logged and skipped.
    pub fn resolve_inputs(&self) -> Result<Vec<InputFile>> {
        let mut inputs = Vec::new();
        for company in &self.companies {
            for (kind, patterns) in [
                (ExportKind::Sales, &company.sales),
                (ExportKind::Warehouse, &company.warehouse),
            ] {
                for pattern in patterns {
                    let full = self.base_dir.join(pattern);
                    let mut matched = 0;
                    for entry in glob::glob(&full.to_string_lossy())? {
                        let path = entry.map_err(|err| ReportError::Io(err.into_error()))?;
                        if !path.is_file() {
                            continue;
                        }
                        matched += 1;
                        inputs.push(InputFile {
                            company: company.name.clone(),
                            kind,
                            path,
                            header_row: match kind {
                                ExportKind::Sales => company.header_row,
                                ExportKind::Warehouse => None,
                            },
                        });
                    }
                    if matched == 0 {
                        warn!(
                            company = %company.name,
                            kind = kind.as_str(),
                            pattern = %pattern,
                            "pattern matched no files"
                        );
                    }
                }
            }
        }
        Ok(inputs)
    }
}
