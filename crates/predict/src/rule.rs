//! Fixed-threshold restocking rule.

use restock_model::{InventoryRecord, MissingFieldError, Verdict};
use serde::{Deserialize, Serialize};

/// Business restock floor, in units.
pub const DEFAULT_THRESHOLD: u32 = 30;

/// Restock whenever available stock is below `threshold`, topping up to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePredictor {
    pub threshold: u32,
}

impl Default for RulePredictor {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl RulePredictor {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn predict(&self, record: &InventoryRecord) -> Result<Verdict, MissingFieldError> {
        let available = record.require_available()?;
        if available < self.threshold {
            Ok(Verdict::restock(self.threshold - available))
        } else {
            Ok(Verdict::sufficient())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restock_model::RestockStatus;

    fn with_stock(available: u32) -> InventoryRecord {
        InventoryRecord::new().with_available(available)
    }

    #[test]
    fn test_threshold_boundary() {
        let rule = RulePredictor::default();
        assert_eq!(rule.predict(&with_stock(29)), Ok(Verdict::restock(1)));
        assert_eq!(rule.predict(&with_stock(30)), Ok(Verdict::sufficient()));
        assert_eq!(rule.predict(&with_stock(31)), Ok(Verdict::sufficient()));
    }

    #[test]
    fn test_quantity_tops_up_to_threshold() {
        let rule = RulePredictor::new(50);
        let verdict = rule.predict(&with_stock(0)).unwrap();
        assert_eq!(verdict.status, RestockStatus::RestockNeeded);
        assert_eq!(verdict.quantity, 50);
    }

    #[test]
    fn test_zero_threshold_never_restocks() {
        let rule = RulePredictor::new(0);
        assert_eq!(rule.predict(&with_stock(0)), Ok(Verdict::sufficient()));
    }

    #[test]
    fn test_missing_available_stock() {
        let rule = RulePredictor::default();
        let record = InventoryRecord::new().with_sold(10);
        assert_eq!(
            rule.predict(&record),
            Err(MissingFieldError {
                field: "available_stock"
            })
        );
    }
}
