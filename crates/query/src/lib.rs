//! Record filtering over categorical attributes.
//!
//! Composes independent per-field constraints into one predicate:
//! - AND across fields
//! - OR within a multi-select value set
//! - no constraint on a field when it is absent from the criteria

use restock_model::{CategoricalField, InventoryRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Sentinel meaning "no constraint" in the `field=value` syntax.
pub const ALL_VALUES: &str = "All";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Expected field=value, got '{0}'")]
    MalformedPair(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("Empty value for field {0}")]
    EmptyValue(CategoricalField),
}

/// Constraint on a single categorical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    #[default]
    Any,
    Equals(String),
    /// An empty set matches nothing.
    OneOf(BTreeSet<String>),
}

impl Constraint {
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Equals(expected), Some(v)) => expected == v,
            (Self::OneOf(set), Some(v)) => set.contains(v),
            (_, None) => false,
        }
    }

    /// Intersection of two constraints on the same field.
    pub fn and(self, other: Constraint) -> Constraint {
        match (self, other) {
            (Self::Any, c) | (c, Self::Any) => c,
            (Self::Equals(a), Self::Equals(b)) => {
                if a == b {
                    Self::Equals(a)
                } else {
                    Self::OneOf(BTreeSet::new())
                }
            }
            (Self::Equals(a), Self::OneOf(set)) | (Self::OneOf(set), Self::Equals(a)) => {
                if set.contains(&a) {
                    Self::Equals(a)
                } else {
                    Self::OneOf(BTreeSet::new())
                }
            }
            (Self::OneOf(a), Self::OneOf(b)) => Self::OneOf(a.intersection(&b).cloned().collect()),
        }
    }
}

/// Per-field constraints; a field without an entry is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    constraints: BTreeMap<CategoricalField, Constraint>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: CategoricalField, constraint: Constraint) -> Self {
        self.constraints.insert(field, constraint);
        self
    }

    pub fn equals(self, field: CategoricalField, value: impl Into<String>) -> Self {
        self.with(field, Constraint::Equals(value.into()))
    }

    pub fn one_of<I, S>(self, field: CategoricalField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(
            field,
            Constraint::OneOf(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Constraint for `field` (`Any` when absent).
    pub fn constraint(&self, field: CategoricalField) -> &Constraint {
        const ANY: &Constraint = &Constraint::Any;
        self.constraints.get(&field).unwrap_or(ANY)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.constraints.values().all(|c| *c == Constraint::Any)
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        self.constraints
            .iter()
            .all(|(field, constraint)| constraint.matches(record.attribute(*field)))
    }

    /// Conjunction of two criteria.
    pub fn and(mut self, other: FilterCriteria) -> FilterCriteria {
        for (field, constraint) in other.constraints {
            let merged = match self.constraints.remove(&field) {
                Some(existing) => existing.and(constraint),
                None => constraint,
            };
            self.constraints.insert(field, merged);
        }
        self
    }

    /// Parse `field=value` or `field=v1,v2`; `All` lifts the constraint.
    pub fn parse_pair(pair: &str) -> Result<(CategoricalField, Constraint), QueryError> {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| QueryError::MalformedPair(pair.to_string()))?;

        let field: CategoricalField = name
            .parse()
            .map_err(|_| QueryError::UnknownField(name.trim().to_string()))?;

        let values: Vec<&str> = raw.split(',').map(str::trim).collect();
        if values.iter().any(|v| v.is_empty()) {
            return Err(QueryError::EmptyValue(field));
        }

        let constraint = if values.iter().any(|v| v.eq_ignore_ascii_case(ALL_VALUES)) {
            Constraint::Any
        } else if let [single] = values.as_slice() {
            Constraint::Equals(single.to_string())
        } else {
            Constraint::OneOf(values.iter().map(|v| v.to_string()).collect())
        };

        Ok((field, constraint))
    }

    /// Build criteria from several `field=value` pairs; repeated fields are
    /// intersected.
    pub fn parse<I, S>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        pairs.into_iter().try_fold(Self::new(), |criteria, pair| {
            let (field, constraint) = Self::parse_pair(pair.as_ref())?;
            Ok(criteria.and(Self::new().with(field, constraint)))
        })
    }
}

/// Records satisfying every constraint, in input order.
pub fn apply(records: &[InventoryRecord], criteria: &FilterCriteria) -> Vec<InventoryRecord> {
    if criteria.is_unconstrained() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(branch: &str, brand: &str, size: &str) -> InventoryRecord {
        InventoryRecord::new()
            .with_attribute(CategoricalField::Branch, branch)
            .with_attribute(CategoricalField::Brand, brand)
            .with_attribute(CategoricalField::Size, size)
            .with_available(1)
    }

    fn sample() -> Vec<InventoryRecord> {
        vec![
            item("Velachery", "A", "M"),
            item("Anna Nagar", "B", "L"),
            item("Velachery", "B", "S"),
            item("T Nagar", "C", "M"),
        ]
    }

    #[test]
    fn test_no_constraints_is_identity() {
        let records = sample();
        assert_eq!(apply(&records, &FilterCriteria::new()), records);
    }

    #[test]
    fn test_empty_input() {
        let criteria = FilterCriteria::new().equals(CategoricalField::Brand, "A");
        assert!(apply(&[], &criteria).is_empty());
    }

    #[test]
    fn test_and_across_or_within() {
        let criteria = FilterCriteria::new()
            .equals(CategoricalField::Branch, "Velachery")
            .one_of(CategoricalField::Size, ["M", "S"]);
        let kept = apply(&sample(), &criteria);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].attribute(CategoricalField::Brand), Some("A"));
        assert_eq!(kept[1].attribute(CategoricalField::Brand), Some("B"));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let criteria = FilterCriteria::new().one_of(CategoricalField::Brand, Vec::<String>::new());
        assert!(apply(&sample(), &criteria).is_empty());
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        let records = vec![InventoryRecord::new().with_available(3)];
        let criteria = FilterCriteria::new().equals(CategoricalField::Season, "Summer");
        assert!(apply(&records, &criteria).is_empty());
        assert_eq!(apply(&records, &FilterCriteria::new()).len(), 1);
    }

    #[test]
    fn test_composition_equals_conjunction() {
        let records = sample();
        let cases = [
            (
                FilterCriteria::new().equals(CategoricalField::Branch, "Velachery"),
                FilterCriteria::new().equals(CategoricalField::Brand, "B"),
            ),
            (
                FilterCriteria::new().one_of(CategoricalField::Brand, ["A", "B"]),
                FilterCriteria::new().one_of(CategoricalField::Brand, ["B", "C"]),
            ),
            (
                FilterCriteria::new().equals(CategoricalField::Brand, "A"),
                FilterCriteria::new().equals(CategoricalField::Brand, "C"),
            ),
            (
                FilterCriteria::new().equals(CategoricalField::Size, "M"),
                FilterCriteria::new().one_of(CategoricalField::Size, ["M", "L"]),
            ),
        ];

        for (a, b) in cases {
            let stepwise = apply(&apply(&records, &a), &b);
            let combined = apply(&records, &a.clone().and(b.clone()));
            assert_eq!(stepwise, combined, "criteria {:?} and {:?}", a, b);
        }
    }

    #[test]
    fn test_parse_pairs() {
        assert_eq!(
            FilterCriteria::parse_pair("brand=A").unwrap(),
            (CategoricalField::Brand, Constraint::Equals("A".into()))
        );
        assert_eq!(
            FilterCriteria::parse_pair("Branch Name = Velachery, T Nagar").unwrap().1,
            Constraint::OneOf(["Velachery".to_string(), "T Nagar".to_string()].into())
        );
        assert_eq!(
            FilterCriteria::parse_pair("size=All").unwrap().1,
            Constraint::Any
        );
        assert!(matches!(
            FilterCriteria::parse_pair("brand"),
            Err(QueryError::MalformedPair(_))
        ));
        assert!(matches!(
            FilterCriteria::parse_pair("colour=red"),
            Err(QueryError::UnknownField(_))
        ));
        assert_eq!(
            FilterCriteria::parse_pair("brand=A,"),
            Err(QueryError::EmptyValue(CategoricalField::Brand))
        );
    }

    #[test]
    fn test_parse_repeated_field_intersects() {
        let criteria = FilterCriteria::parse(["brand=A,B", "brand=B,C"]).unwrap();
        assert_eq!(
            criteria.constraint(CategoricalField::Brand),
            &Constraint::OneOf(["B".to_string()].into())
        );
        assert_eq!(criteria.constraint(CategoricalField::Size), &Constraint::Any);
    }
}
