//! Inventory table loading.
//!
//! Provides the `DatasetProvider` trait and its CSV implementation.
//! Everything downstream works on the loaded `Vec<InventoryRecord>` and
//! never touches the storage format.
//!
//! Expected CSV columns (any order, extra columns ignored):
//!   Branch Name, Category, Gender, Size, Brand, Season, Season Month,
//!   Available Stock, Sold Stock, Price, Total Items, Restock Needed, Target
//!
//! `Restock Needed` and `Target` are loaded as two separate flags.

use restock_model::{CategoricalField, InventoryRecord};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from dataset loading.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error at line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: csv::Error,
    },
}

/// Source of the inventory table.
pub trait DatasetProvider {
    /// Load every record, in table order.
    fn load(&self) -> Result<Vec<InventoryRecord>, DatasetError>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;
}

/// Raw CSV row; every cell is optional text until validated.
#[derive(Debug, Clone, Deserialize)]
struct CsvRow {
    #[serde(rename = "Branch Name", default)]
    branch: Option<String>,
    #[serde(rename = "Category", default)]
    category: Option<String>,
    #[serde(rename = "Gender", default)]
    gender: Option<String>,
    #[serde(rename = "Size", default)]
    size: Option<String>,
    #[serde(rename = "Brand", default)]
    brand: Option<String>,
    #[serde(rename = "Season", default)]
    season: Option<String>,
    #[serde(rename = "Season Month", default)]
    season_month: Option<String>,
    #[serde(rename = "Available Stock", default)]
    available_stock: Option<String>,
    #[serde(rename = "Sold Stock", default)]
    sold_stock: Option<String>,
    #[serde(rename = "Price", default)]
    price: Option<String>,
    #[serde(rename = "Total Items", default)]
    total_items: Option<String>,
    #[serde(rename = "Restock Needed", default)]
    restock_needed: Option<String>,
    #[serde(rename = "Target", default)]
    target: Option<String>,
}

fn non_empty(cell: Option<String>) -> Option<String> {
    cell.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Whole, non-negative unit count; accepts `12` and `12.0`.
fn parse_units(cell: Option<&str>) -> Option<u32> {
    let value: f64 = cell?.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX))
        .then_some(value as u32)
}

/// Non-negative decimal, tolerating a currency prefix and thousands separators.
fn parse_price(cell: Option<&str>) -> Option<f64> {
    let cleaned: String = cell?
        .trim()
        .trim_start_matches(['₹', '$'])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Flexible flag parser: "1"/"0", "true"/"false", "yes"/"no".
fn parse_flag(cell: Option<&str>) -> Option<bool> {
    match cell?.trim().to_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" | "y" => Some(true),
        "0" | "0.0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

impl CsvRow {
    /// Non-empty numeric or flag cells that failed to parse, as (column, raw).
    fn unparsed_cells(&self, record: &InventoryRecord) -> Vec<(&'static str, &str)> {
        [
            ("Available Stock", &self.available_stock, record.available_stock.is_some()),
            ("Sold Stock", &self.sold_stock, record.sold_stock.is_some()),
            ("Price", &self.price, record.price.is_some()),
            ("Total Items", &self.total_items, record.total_items.is_some()),
            ("Restock Needed", &self.restock_needed, record.restock_needed.is_some()),
            ("Target", &self.target, record.target.is_some()),
        ]
        .into_iter()
        .filter_map(|(column, raw, parsed)| {
            raw.as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty() && !parsed)
                .map(|r| (column, r))
        })
        .collect()
    }

    fn into_record(self, line: usize) -> InventoryRecord {
        let mut record = InventoryRecord {
            available_stock: parse_units(self.available_stock.as_deref()),
            sold_stock: parse_units(self.sold_stock.as_deref()),
            price: parse_price(self.price.as_deref()),
            total_items: parse_units(self.total_items.as_deref()),
            restock_needed: parse_flag(self.restock_needed.as_deref()),
            target: parse_flag(self.target.as_deref()),
            ..Default::default()
        };

        for (column, value) in self.unparsed_cells(&record) {
            tracing::warn!(line, column, value, "unparseable cell, treating as missing");
        }

        let attributes = [
            (CategoricalField::Branch, self.branch),
            (CategoricalField::Category, self.category),
            (CategoricalField::Gender, self.gender),
            (CategoricalField::Size, self.size),
            (CategoricalField::Brand, self.brand),
            (CategoricalField::Season, self.season),
            (CategoricalField::SeasonMonth, self.season_month),
        ];
        for (field, cell) in attributes {
            if let Some(value) = non_empty(cell) {
                record.attributes.insert(field, value);
            }
        }

        record
    }
}

/// Load inventory records from a CSV reader.
pub fn load_inventory<R: Read>(reader: R) -> Result<Vec<InventoryRecord>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line_num, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let line = line_num + 2;
        let row = result.map_err(|source| DatasetError::Parse { line, source })?;
        records.push(row.into_record(line));
    }

    tracing::debug!(rows = records.len(), "loaded inventory table");
    Ok(records)
}

/// CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvDataset {
    path: PathBuf,
}

impl CsvDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetProvider for CsvDataset {
    fn load(&self) -> Result<Vec<InventoryRecord>, DatasetError> {
        let file = std::fs::File::open(&self.path).map_err(|source| DatasetError::Open {
            path: self.path.clone(),
            source,
        })?;
        load_inventory(file)
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

/// Records already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    records: Vec<InventoryRecord>,
}

impl InMemoryDataset {
    pub fn new(records: Vec<InventoryRecord>) -> Self {
        Self { records }
    }
}

impl DatasetProvider for InMemoryDataset {
    fn load(&self) -> Result<Vec<InventoryRecord>, DatasetError> {
        Ok(self.records.clone())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
