//! Feature extraction for restocking models.
//!
//! Provides the pieces that turn an `InventoryRecord` into numbers:
//! - Categorical codec (string values to dense integer codes and back)
//! - Feature-order specification shared by training and inference
//! - Standard scaling, fitted once and re-applied unchanged

use restock_model::{CategoricalField, InventoryRecord, MissingFieldError, NumericField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unknown {field} value '{value}'")]
    UnknownCategory {
        field: CategoricalField,
        value: String,
    },

    #[error("code {code} is out of range for {field} ({len} known values)")]
    InvalidCode {
        field: CategoricalField,
        code: u32,
        len: usize,
    },

    #[error("field {0} was not encoded when the codec was built")]
    UnencodedField(CategoricalField),
}

/// Bijection between the distinct values of one field and `[0, k)`.
///
/// Codes follow the sorted order of the values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTable {
    field: CategoricalField,
    values: Vec<String>,
}

impl EncodingTable {
    fn from_values<'a>(field: CategoricalField, values: impl Iterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = values.collect();
        Self {
            field,
            values: distinct.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn field(&self) -> CategoricalField {
        self.field
    }

    /// Known values, in code order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn encode(&self, value: &str) -> Result<u32, CodecError> {
        self.values
            .binary_search_by(|known| known.as_str().cmp(value))
            .map(|idx| idx as u32)
            .map_err(|_| CodecError::UnknownCategory {
                field: self.field,
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: u32) -> Result<&str, CodecError> {
        self.values
            .get(code as usize)
            .map(String::as_str)
            .ok_or(CodecError::InvalidCode {
                field: self.field,
                code,
                len: self.values.len(),
            })
    }
}

/// Encoding tables for a set of categorical fields, built once per dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    tables: BTreeMap<CategoricalField, EncodingTable>,
}

impl Codec {
    /// Scan `records` once and build one table per field.
    ///
    /// Records missing a field simply contribute no value to that table.
    pub fn build(records: &[InventoryRecord], fields: &[CategoricalField]) -> Self {
        let tables: BTreeMap<_, _> = fields
            .iter()
            .map(|&field| {
                let table = EncodingTable::from_values(
                    field,
                    records.iter().filter_map(|r| r.attribute(field)),
                );
                (field, table)
            })
            .collect();

        tracing::debug!(
            fields = tables.len(),
            values = tables.values().map(EncodingTable::len).sum::<usize>(),
            "built categorical codec"
        );

        Self { tables }
    }

    pub fn table(&self, field: CategoricalField) -> Option<&EncodingTable> {
        self.tables.get(&field)
    }

    pub fn tables(&self) -> impl Iterator<Item = &EncodingTable> {
        self.tables.values()
    }

    pub fn encode(&self, field: CategoricalField, value: &str) -> Result<u32, CodecError> {
        self.table(field)
            .ok_or(CodecError::UnencodedField(field))?
            .encode(value)
    }

    pub fn decode(&self, field: CategoricalField, code: u32) -> Result<&str, CodecError> {
        self.table(field)
            .ok_or(CodecError::UnencodedField(field))?
            .decode(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One column of the feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Feature {
    Numeric(NumericField),
    Categorical(CategoricalField),
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Numeric(field) => field.name(),
            Self::Categorical(field) => field.name(),
        }
    }

    /// Numeric columns are standardised; categorical codes are not.
    pub fn is_scaled(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

/// Named, versioned column order for feature vectors.
///
/// A trained model keeps the spec it was trained with and vectorises
/// inference input through that same instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub version: u32,
    pub features: Vec<Feature>,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            name: "inventory-core".to_string(),
            version: 1,
            features: vec![
                Feature::Numeric(NumericField::AvailableStock),
                Feature::Numeric(NumericField::SoldStock),
                Feature::Numeric(NumericField::Price),
                Feature::Numeric(NumericField::TotalItems),
                Feature::Categorical(CategoricalField::Branch),
                Feature::Categorical(CategoricalField::Category),
                Feature::Categorical(CategoricalField::Gender),
                Feature::Categorical(CategoricalField::Size),
                Feature::Categorical(CategoricalField::Brand),
            ],
        }
    }
}

impl FeatureSpec {
    pub fn width(&self) -> usize {
        self.features.len()
    }

    /// Categorical fields referenced by this spec, in column order.
    pub fn categorical_fields(&self) -> Vec<CategoricalField> {
        self.features
            .iter()
            .filter_map(|f| match f {
                Feature::Categorical(field) => Some(*field),
                Feature::Numeric(_) => None,
            })
            .collect()
    }

    /// Assemble the feature vector for `record` in spec order.
    pub fn vectorize(
        &self,
        record: &InventoryRecord,
        codec: &Codec,
    ) -> Result<FeatureVector, FeatureError> {
        let values = self
            .features
            .iter()
            .map(|feature| match feature {
                Feature::Numeric(field) => Ok(record.numeric(*field)?),
                Feature::Categorical(field) => {
                    let value = record.require_attribute(*field)?;
                    Ok(f64::from(codec.encode(*field, value)?))
                }
            })
            .collect::<Result<Vec<_>, FeatureError>>()?;

        Ok(FeatureVector { values })
    }
}

/// Ordered numeric representation of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fits per-column standardisation statistics.
///
/// Fitting produces a [`FittedScaler`]; there is no way to refit one.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler;

impl StandardScaler {
    pub fn fit(spec: &FeatureSpec, rows: &[FeatureVector]) -> FittedScaler {
        let width = spec.width();
        let n = rows.len() as f64;
        let mut means = vec![0.0; width];
        let mut scales = vec![1.0; width];

        if rows.is_empty() {
            return FittedScaler { means, scales };
        }

        for (col, feature) in spec.features.iter().enumerate() {
            if !feature.is_scaled() {
                continue;
            }
            let mean = rows.iter().map(|r| r.values[col]).sum::<f64>() / n;
            let variance = rows
                .iter()
                .map(|r| (r.values[col] - mean).powi(2))
                .sum::<f64>()
                / n;
            let std = variance.sqrt();

            means[col] = mean;
            // Constant columns pass through centred
            scales[col] = if std.is_finite() && std > f64::EPSILON {
                std
            } else {
                1.0
            };
        }

        FittedScaler { means, scales }
    }
}

/// Standardisation statistics captured at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl FittedScaler {
    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        debug_assert_eq!(vector.len(), self.means.len());
        let values = vector
            .values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect();
        FeatureVector { values }
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(branch: &str, brand: &str, available: u32, sold: u32, price: f64) -> InventoryRecord {
        InventoryRecord::new()
            .with_attribute(CategoricalField::Branch, branch)
            .with_attribute(CategoricalField::Category, "Shirts")
            .with_attribute(CategoricalField::Gender, "Men")
            .with_attribute(CategoricalField::Size, "M")
            .with_attribute(CategoricalField::Brand, brand)
            .with_available(available)
            .with_sold(sold)
            .with_price(price)
    }

    fn sample() -> Vec<InventoryRecord> {
        vec![
            item("Velachery", "Denim Co", 10, 50, 499.0),
            item("Anna Nagar", "Basics", 100, 5, 299.0),
            item("Velachery", "Acme", 40, 40, 899.0),
        ]
    }

    #[test]
    fn test_codes_follow_sorted_order() {
        let codec = Codec::build(&sample(), &[CategoricalField::Brand]);
        let table = codec.table(CategoricalField::Brand).unwrap();
        assert_eq!(table.values(), ["Acme", "Basics", "Denim Co"]);
        assert_eq!(codec.encode(CategoricalField::Brand, "Acme"), Ok(0));
        assert_eq!(codec.encode(CategoricalField::Brand, "Denim Co"), Ok(2));
    }

    #[test]
    fn test_round_trip() {
        let records = sample();
        let codec = Codec::build(&records, &CategoricalField::ALL);
        for record in &records {
            for (field, value) in &record.attributes {
                let code = codec.encode(*field, value).unwrap();
                assert_eq!(codec.decode(*field, code).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_unknown_and_invalid() {
        let codec = Codec::build(&sample(), &[CategoricalField::Brand]);
        assert_eq!(
            codec.encode(CategoricalField::Brand, "Zara"),
            Err(CodecError::UnknownCategory {
                field: CategoricalField::Brand,
                value: "Zara".to_string()
            })
        );
        assert!(matches!(
            codec.decode(CategoricalField::Brand, 3),
            Err(CodecError::InvalidCode { code: 3, len: 3, .. })
        ));
        assert_eq!(
            codec.encode(CategoricalField::Size, "M"),
            Err(CodecError::UnencodedField(CategoricalField::Size))
        );
    }

    #[test]
    fn test_absent_field_builds_empty_table() {
        let codec = Codec::build(&sample(), &[CategoricalField::Season]);
        assert!(codec.table(CategoricalField::Season).unwrap().is_empty());
    }

    #[test]
    fn test_vectorize_in_spec_order() {
        let records = sample();
        let codec = Codec::build(&records, &CategoricalField::ALL);
        let spec = FeatureSpec::default();
        let vector = spec.vectorize(&records[0], &codec).unwrap();
        // available, sold, price, total, branch, category, gender, size, brand
        assert_eq!(
            vector.as_slice(),
            [10.0, 50.0, 499.0, 60.0, 1.0, 0.0, 0.0, 0.0, 2.0]
        );
    }

    #[test]
    fn test_vectorize_same_values_same_vector() {
        let records = sample();
        let codec = Codec::build(&records, &CategoricalField::ALL);
        let spec = FeatureSpec::default();
        let query = item("Velachery", "Denim Co", 10, 50, 499.0);
        assert_eq!(
            spec.vectorize(&records[0], &codec).unwrap(),
            spec.vectorize(&query, &codec).unwrap()
        );
    }

    #[test]
    fn test_vectorize_missing_field() {
        let codec = Codec::build(&sample(), &CategoricalField::ALL);
        let spec = FeatureSpec::default();
        let record = item("Velachery", "Acme", 1, 2, 3.0);
        let mut no_price = record.clone();
        no_price.price = None;
        assert_eq!(
            spec.vectorize(&no_price, &codec),
            Err(FeatureError::MissingField(MissingFieldError { field: "price" }))
        );
    }

    #[test]
    fn test_scaler_standardises_numeric_only() {
        let records = sample();
        let codec = Codec::build(&records, &CategoricalField::ALL);
        let spec = FeatureSpec::default();
        let rows: Vec<_> = records
            .iter()
            .map(|r| spec.vectorize(r, &codec).unwrap())
            .collect();
        let scaler = StandardScaler::fit(&spec, &rows);

        let scaled: Vec<_> = rows.iter().map(|r| scaler.transform(r)).collect();
        let mean_available: f64 = scaled.iter().map(|r| r.as_slice()[0]).sum::<f64>() / 3.0;
        assert!(mean_available.abs() < 1e-9);
        // Brand code column untouched
        assert_eq!(scaled[0].as_slice()[8], 2.0);
    }

    #[test]
    fn test_scaler_constant_column() {
        let spec = FeatureSpec {
            name: "t".into(),
            version: 1,
            features: vec![Feature::Numeric(NumericField::Price)],
        };
        let codec = Codec::default();
        let rows = vec![
            spec.vectorize(&InventoryRecord::new().with_price(5.0), &codec).unwrap(),
            spec.vectorize(&InventoryRecord::new().with_price(5.0), &codec).unwrap(),
        ];
        let scaler = StandardScaler::fit(&spec, &rows);
        assert_eq!(scaler.scales(), [1.0]);
        assert_eq!(scaler.transform(&rows[0]).as_slice(), [0.0]);
    }

    #[test]
    fn test_default_spec_columns() {
        let spec = FeatureSpec::default();
        assert_eq!(
            spec.categorical_fields(),
            vec![
                CategoricalField::Branch,
                CategoricalField::Category,
                CategoricalField::Gender,
                CategoricalField::Size,
                CategoricalField::Brand,
            ]
        );
        let names: Vec<_> = spec.features.iter().map(Feature::name).collect();
        assert_eq!(&names[..4], ["available_stock", "sold_stock", "price", "total_items"]);
    }

    #[test]
    fn test_spec_serialization() {
        let json = serde_json::to_string(&FeatureSpec::default()).unwrap();
        assert!(json.contains("\"kind\":\"categorical\",\"field\":\"brand\""));
        let parsed: FeatureSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, FeatureSpec::default());
    }
}
