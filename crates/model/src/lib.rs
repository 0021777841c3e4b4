//! Core domain model for restocking decisions.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `InventoryRecord`: One row of the retail inventory table
//! - `CategoricalField` / `NumericField`: The fixed record schema
//! - `RestockStatus` / `Verdict`: The outcome of a restocking decision
//! - `LabelRule`: How a training label is derived from a record

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A required field was absent (or non-numeric) on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record is missing required field '{field}'")]
pub struct MissingFieldError {
    pub field: &'static str,
}

/// A string-valued attribute of an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    Branch,
    Category,
    Gender,
    Size,
    Brand,
    Season,
    SeasonMonth,
}

impl CategoricalField {
    /// Every categorical field, in schema order.
    pub const ALL: [CategoricalField; 7] = [
        Self::Branch,
        Self::Category,
        Self::Gender,
        Self::Size,
        Self::Brand,
        Self::Season,
        Self::SeasonMonth,
    ];

    /// Short machine name (`season_month`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Category => "category",
            Self::Gender => "gender",
            Self::Size => "size",
            Self::Brand => "brand",
            Self::Season => "season",
            Self::SeasonMonth => "season_month",
        }
    }

    /// Column header in the inventory table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Branch => "Branch Name",
            Self::Category => "Category",
            Self::Gender => "Gender",
            Self::Size => "Size",
            Self::Brand => "Brand",
            Self::Season => "Season",
            Self::SeasonMonth => "Season Month",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string names no categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown categorical field '{0}'")]
pub struct UnknownFieldError(pub String);

impl FromStr for CategoricalField {
    type Err = UnknownFieldError;

    /// Accepts the machine name or the column header, ignoring case and
    /// treating spaces, dashes and underscores alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "branch" | "branchname" => Ok(Self::Branch),
            "category" => Ok(Self::Category),
            "gender" => Ok(Self::Gender),
            "size" => Ok(Self::Size),
            "brand" => Ok(Self::Brand),
            "season" => Ok(Self::Season),
            "seasonmonth" => Ok(Self::SeasonMonth),
            _ => Err(UnknownFieldError(s.to_string())),
        }
    }
}

/// A numeric attribute usable as a model feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    AvailableStock,
    SoldStock,
    Price,
    /// Stored total, or `available + sold` when the table omits it.
    TotalItems,
}

impl NumericField {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AvailableStock => "available_stock",
            Self::SoldStock => "sold_stock",
            Self::Price => "price",
            Self::TotalItems => "total_items",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the inventory table, or a user-built hypothetical item.
///
/// Absent categorical attributes and numeric cells are modelled as missing
/// rather than defaulted; consumers that need them fail with
/// [`MissingFieldError`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Categorical attributes keyed by field
    #[serde(default)]
    pub attributes: BTreeMap<CategoricalField, String>,

    /// Units currently on hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<u32>,

    /// Units sold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sold_stock: Option<u32>,

    /// Unit price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Precomputed total items, if the table provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u32>,

    /// Precomputed `Restock Needed` flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restock_needed: Option<bool>,

    /// Precomputed `Target` flag; independent of `restock_needed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<bool>,
}

impl InventoryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, field: CategoricalField, value: impl Into<String>) -> Self {
        self.attributes.insert(field, value.into());
        self
    }

    pub fn with_available(mut self, units: u32) -> Self {
        self.available_stock = Some(units);
        self
    }

    pub fn with_sold(mut self, units: u32) -> Self {
        self.sold_stock = Some(units);
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_total_items(mut self, total: u32) -> Self {
        self.total_items = Some(total);
        self
    }

    pub fn with_restock_needed(mut self, flag: bool) -> Self {
        self.restock_needed = Some(flag);
        self
    }

    pub fn with_target(mut self, flag: bool) -> Self {
        self.target = Some(flag);
        self
    }

    /// Value of a categorical attribute, if present.
    pub fn attribute(&self, field: CategoricalField) -> Option<&str> {
        self.attributes.get(&field).map(String::as_str)
    }

    pub fn require_attribute(&self, field: CategoricalField) -> Result<&str, MissingFieldError> {
        self.attribute(field).ok_or(MissingFieldError {
            field: field.name(),
        })
    }

    pub fn require_available(&self) -> Result<u32, MissingFieldError> {
        self.available_stock.ok_or(MissingFieldError {
            field: NumericField::AvailableStock.name(),
        })
    }

    pub fn require_sold(&self) -> Result<u32, MissingFieldError> {
        self.sold_stock.ok_or(MissingFieldError {
            field: NumericField::SoldStock.name(),
        })
    }

    /// Stored total, falling back to `available + sold`.
    pub fn total_items(&self) -> Option<u32> {
        self.total_items.or_else(|| {
            self.available_stock
                .zip(self.sold_stock)
                .map(|(available, sold)| available.saturating_add(sold))
        })
    }

    /// Numeric value of a field as `f64`, for feature assembly.
    pub fn numeric(&self, field: NumericField) -> Result<f64, MissingFieldError> {
        let value = match field {
            NumericField::AvailableStock => self.available_stock.map(f64::from),
            NumericField::SoldStock => self.sold_stock.map(f64::from),
            NumericField::Price => self.price.filter(|p| p.is_finite()),
            NumericField::TotalItems => self.total_items().map(f64::from),
        };
        value.ok_or(MissingFieldError {
            field: field.name(),
        })
    }

    /// True when both records agree on every categorical attribute and on
    /// both stock quantities.
    pub fn matches_item(&self, other: &InventoryRecord) -> bool {
        self.attributes == other.attributes
            && self.available_stock == other.available_stock
            && self.sold_stock == other.sold_stock
    }
}

/// Whether an item needs restocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockStatus {
    RestockNeeded,
    Sufficient,
}

impl RestockStatus {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RestockNeeded => "Restock Needed",
            Self::Sufficient => "Sufficient Stock",
        }
    }

    pub fn is_restock(&self) -> bool {
        matches!(self, Self::RestockNeeded)
    }
}

impl From<bool> for RestockStatus {
    fn from(needs_restock: bool) -> Self {
        if needs_restock {
            Self::RestockNeeded
        } else {
            Self::Sufficient
        }
    }
}

/// A restocking decision: status plus suggested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Verdict {
    pub status: RestockStatus,
    pub quantity: u32,
}

impl Verdict {
    pub fn restock(quantity: u32) -> Self {
        Self {
            status: RestockStatus::RestockNeeded,
            quantity,
        }
    }

    pub fn sufficient() -> Self {
        Self {
            status: RestockStatus::Sufficient,
            quantity: 0,
        }
    }
}

/// How the binary training label is derived from a record.
///
/// Tables may carry a `Restock Needed` column, a `Target` column, both or
/// neither, and they can disagree. The label source is always named
/// explicitly; one column never stands in for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelRule {
    /// Use the precomputed `Restock Needed` column.
    RestockNeededColumn,
    /// Use the precomputed `Target` column.
    TargetColumn,
    /// Label as restock when `available_stock < sold_stock`.
    #[default]
    AvailableBelowSold,
}

impl LabelRule {
    pub fn label(&self, record: &InventoryRecord) -> Result<bool, MissingFieldError> {
        match self {
            Self::RestockNeededColumn => record.restock_needed.ok_or(MissingFieldError {
                field: "restock_needed",
            }),
            Self::TargetColumn => record.target.ok_or(MissingFieldError { field: "target" }),
            Self::AvailableBelowSold => Ok(record.require_available()? < record.require_sold()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_str() {
        assert_eq!("brand".parse::<CategoricalField>(), Ok(CategoricalField::Brand));
        assert_eq!("Branch Name".parse::<CategoricalField>(), Ok(CategoricalField::Branch));
        assert_eq!("season-month".parse::<CategoricalField>(), Ok(CategoricalField::SeasonMonth));
        assert_eq!("Season Month".parse::<CategoricalField>(), Ok(CategoricalField::SeasonMonth));
        assert!("colour".parse::<CategoricalField>().is_err());
    }

    #[test]
    fn test_total_items_derived() {
        let record = InventoryRecord::new().with_available(10).with_sold(5);
        assert_eq!(record.total_items(), Some(15));

        let stored = record.clone().with_total_items(40);
        assert_eq!(stored.total_items(), Some(40));

        assert_eq!(InventoryRecord::new().with_available(10).total_items(), None);
    }

    #[test]
    fn test_numeric_missing() {
        let record = InventoryRecord::new().with_available(3);
        assert_eq!(record.numeric(NumericField::AvailableStock), Ok(3.0));
        assert_eq!(
            record.numeric(NumericField::Price),
            Err(MissingFieldError { field: "price" })
        );
        let nan_price = InventoryRecord::new().with_price(f64::NAN);
        assert!(nan_price.numeric(NumericField::Price).is_err());
    }

    #[test]
    fn test_label_rules() {
        let record = InventoryRecord::new().with_available(10).with_sold(50);
        assert_eq!(LabelRule::AvailableBelowSold.label(&record), Ok(true));
        assert!(LabelRule::RestockNeededColumn.label(&record).is_err());
        assert!(LabelRule::TargetColumn.label(&record).is_err());

        let flagged = record.with_restock_needed(false);
        assert_eq!(LabelRule::RestockNeededColumn.label(&flagged), Ok(false));
        assert_eq!(
            LabelRule::TargetColumn.label(&flagged),
            Err(MissingFieldError { field: "target" })
        );
    }

    #[test]
    fn test_flag_columns_are_independent() {
        let record = InventoryRecord::new()
            .with_restock_needed(true)
            .with_target(false);
        assert_eq!(LabelRule::RestockNeededColumn.label(&record), Ok(true));
        assert_eq!(LabelRule::TargetColumn.label(&record), Ok(false));
    }

    #[test]
    fn test_label_rule_names() {
        let rule: LabelRule = serde_json::from_str("\"target_column\"").unwrap();
        assert_eq!(rule, LabelRule::TargetColumn);
        assert_eq!(
            serde_json::to_string(&LabelRule::RestockNeededColumn).unwrap(),
            "\"restock_needed_column\""
        );
    }

    #[test]
    fn test_matches_item_ignores_price() {
        let a = InventoryRecord::new()
            .with_attribute(CategoricalField::Brand, "A")
            .with_available(10)
            .with_sold(5)
            .with_price(100.0);
        let b = a.clone().with_price(250.0);
        let c = a.clone().with_sold(6);
        assert!(a.matches_item(&b));
        assert!(!a.matches_item(&c));
    }

    #[test]
    fn test_record_serialization() {
        let record = InventoryRecord::new()
            .with_attribute(CategoricalField::SeasonMonth, "March")
            .with_available(12);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"season_month\":\"March\""));
        let parsed: InventoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(RestockStatus::from(true), RestockStatus::RestockNeeded);
        assert_eq!(RestockStatus::RestockNeeded.label(), "Restock Needed");
        assert_eq!(Verdict::sufficient().quantity, 0);
    }
}
