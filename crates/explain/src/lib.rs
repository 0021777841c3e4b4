//! Summaries and explanations for inventory views.
//!
//! Turns record sets and verdicts into figures and text suitable for
//! display: totals for the filtered table, sold stock per brand, and a
//! short rationale for each restocking verdict.

use restock_model::{CategoricalField, InventoryRecord, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headline figures for a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_products: usize,
    pub total_available: u64,
    pub total_sold: u64,

    /// Mean over records that carry a price (0.0 when none do)
    pub average_price: f64,
}

/// Totals over `records`; missing cells are skipped, not counted as zero.
pub fn summarize(records: &[InventoryRecord]) -> InventorySummary {
    let prices: Vec<f64> = records
        .iter()
        .filter_map(|r| r.price.filter(|p| p.is_finite()))
        .collect();

    let average_price = if prices.is_empty() {
        0.0
    } else {
        prices.iter().sum::<f64>() / prices.len() as f64
    };

    InventorySummary {
        total_products: records.len(),
        total_available: records
            .iter()
            .filter_map(|r| r.available_stock)
            .map(u64::from)
            .sum(),
        total_sold: records.iter().filter_map(|r| r.sold_stock).map(u64::from).sum(),
        average_price,
    }
}

/// Sold stock for one brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandSales {
    pub brand: String,
    pub sold: u64,
}

/// Sold stock grouped by brand, ordered by brand name.
pub fn sold_by_brand(records: &[InventoryRecord]) -> Vec<BrandSales> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        if let Some(brand) = record.attribute(CategoricalField::Brand) {
            *totals.entry(brand).or_default() += record.sold_stock.map_or(0, u64::from);
        }
    }
    totals
        .into_iter()
        .map(|(brand, sold)| BrandSales {
            brand: brand.to_string(),
            sold,
        })
        .collect()
}

/// A piece of evidence behind a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub kind: String,
    pub value: String,
}

/// Human-readable rationale for a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation
    pub detail: String,

    pub evidence: Vec<EvidenceItem>,
}

fn describe(record: &InventoryRecord) -> String {
    let parts: Vec<&str> = [
        CategoricalField::Brand,
        CategoricalField::Category,
        CategoricalField::Size,
    ]
    .iter()
    .filter_map(|f| record.attribute(*f))
    .collect();

    if parts.is_empty() {
        "this item".to_string()
    } else {
        parts.join(" / ")
    }
}

fn stock_evidence(record: &InventoryRecord) -> Vec<EvidenceItem> {
    let mut evidence = Vec::new();
    if let Some(available) = record.available_stock {
        evidence.push(EvidenceItem {
            kind: "available_stock".to_string(),
            value: available.to_string(),
        });
    }
    if let Some(sold) = record.sold_stock {
        evidence.push(EvidenceItem {
            kind: "sold_stock".to_string(),
            value: sold.to_string(),
        });
    }
    evidence
}

/// Explain a threshold-rule verdict.
pub fn explain_rule(record: &InventoryRecord, verdict: &Verdict, threshold: u32) -> Explanation {
    let item = describe(record);
    let available = record
        .available_stock
        .map_or_else(|| "unknown".to_string(), |a| a.to_string());

    let detail = if verdict.status.is_restock() {
        format!(
            "{} has {} units available, below the restock floor of {}. \
             Ordering {} units brings it back to the floor.",
            item, available, threshold, verdict.quantity
        )
    } else {
        format!(
            "{} has {} units available, at or above the restock floor of {}.",
            item, available, threshold
        )
    };

    let mut evidence = stock_evidence(record);
    evidence.push(EvidenceItem {
        kind: "threshold".to_string(),
        value: threshold.to_string(),
    });

    Explanation {
        summary: verdict.status.label().to_string(),
        detail,
        evidence,
    }
}

/// Explain a classifier verdict given its restock probability.
pub fn explain_model(record: &InventoryRecord, verdict: &Verdict, probability: f64) -> Explanation {
    let item = describe(record);
    let detail = if verdict.status.is_restock() {
        format!(
            "The classifier rates {} at {:.0}% likely to need restocking. \
             Suggested order of {} units is the sold/available gap, not a model output.",
            item,
            probability * 100.0,
            verdict.quantity
        )
    } else {
        format!(
            "The classifier rates {} at {:.0}% likely to need restocking.",
            item,
            probability * 100.0
        )
    };

    let mut evidence = stock_evidence(record);
    evidence.push(EvidenceItem {
        kind: "probability".to_string(),
        value: format!("{:.2}", probability),
    });

    Explanation {
        summary: verdict.status.label().to_string(),
        detail,
        evidence,
    }
}

/// One-line roll-up of a batch of verdicts.
pub fn summarize_verdicts(verdicts: &[Verdict]) -> String {
    if verdicts.is_empty() {
        return "No items match the selected filters.".to_string();
    }
    let restock: Vec<&Verdict> = verdicts.iter().filter(|v| v.status.is_restock()).collect();
    let units: u64 = restock.iter().map(|v| u64::from(v.quantity)).sum();
    format!(
        "{} of {} items need restocking ({} units in total)",
        restock.len(),
        verdicts.len(),
        units
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(brand: &str, available: u32, sold: u32, price: Option<f64>) -> InventoryRecord {
        let mut record = InventoryRecord::new()
            .with_attribute(CategoricalField::Brand, brand)
            .with_available(available)
            .with_sold(sold);
        record.price = price;
        record
    }

    #[test]
    fn test_summary_totals() {
        let records = vec![
            item("A", 10, 50, Some(100.0)),
            item("B", 100, 5, Some(300.0)),
            item("A", 20, 10, None),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.total_available, 130);
        assert_eq!(summary.total_sold, 65);
        assert_eq!(summary.average_price, 200.0);
    }

    #[test]
    fn test_summary_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.average_price, 0.0);
    }

    #[test]
    fn test_sold_by_brand() {
        let records = vec![
            item("B", 1, 5, None),
            item("A", 1, 50, None),
            item("A", 1, 10, None),
        ];
        assert_eq!(
            sold_by_brand(&records),
            vec![
                BrandSales {
                    brand: "A".into(),
                    sold: 60
                },
                BrandSales {
                    brand: "B".into(),
                    sold: 5
                },
            ]
        );
    }

    #[test]
    fn test_explain_rule_restock() {
        let record = item("A", 10, 50, None);
        let explanation = explain_rule(&record, &Verdict::restock(20), 30);
        assert_eq!(explanation.summary, "Restock Needed");
        assert!(explanation.detail.contains("below the restock floor of 30"));
        assert!(explanation.detail.contains("Ordering 20 units"));
    }

    #[test]
    fn test_explain_model_mentions_heuristic() {
        let record = item("A", 10, 50, None);
        let explanation = explain_model(&record, &Verdict::restock(40), 0.87);
        assert!(explanation.detail.contains("87%"));
        assert!(explanation.detail.contains("not a model output"));
        assert_eq!(explanation.evidence.last().unwrap().value, "0.87");
    }

    #[test]
    fn test_summarize_verdicts() {
        let verdicts = [Verdict::restock(20), Verdict::sufficient(), Verdict::restock(5)];
        assert_eq!(
            summarize_verdicts(&verdicts),
            "2 of 3 items need restocking (25 units in total)"
        );
        assert!(summarize_verdicts(&[]).starts_with("No items"));
    }
}
