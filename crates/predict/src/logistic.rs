//! L2-regularised logistic regression fitted by full-batch gradient descent.

use crate::BinaryClassifier;
use restock_features::FeatureVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    /// Fit from zero-initialised weights; the result depends only on the input.
    pub fn fit(rows: &[FeatureVector], labels: &[bool], params: &LogisticParams) -> Self {
        debug_assert_eq!(rows.len(), labels.len());
        let width = rows.first().map_or(0, FeatureVector::len);
        let n = rows.len().max(1) as f64;
        let mut model = Self {
            weights: vec![0.0; width],
            bias: 0.0,
        };

        let mut grad_w = vec![0.0; width];
        for _ in 0..params.epochs {
            grad_w.iter_mut().for_each(|g| *g = 0.0);
            let mut grad_b = 0.0;

            for (row, &label) in rows.iter().zip(labels) {
                let x = row.as_slice();
                let error = model.probability(x) - if label { 1.0 } else { 0.0 };
                for (g, xi) in grad_w.iter_mut().zip(x) {
                    *g += error * xi;
                }
                grad_b += error;
            }

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            model.bias -= params.learning_rate * grad_b / n;
        }

        model
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl BinaryClassifier for LogisticRegression {
    fn probability(&self, features: &[f64]) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        sigmoid(z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restock_features::{Codec, Feature, FeatureSpec};
    use restock_model::{InventoryRecord, NumericField};

    fn one_feature(values: &[f64]) -> Vec<FeatureVector> {
        let spec = FeatureSpec {
            name: "price-only".into(),
            version: 1,
            features: vec![Feature::Numeric(NumericField::Price)],
        };
        let codec = Codec::default();
        values
            .iter()
            .map(|&v| {
                spec.vectorize(&InventoryRecord::new().with_price(v), &codec)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_separable_data() {
        let rows = one_feature(&[-2.0, -1.5, -1.0, 1.0, 1.5, 2.0]);
        let labels = [false, false, false, true, true, true];
        let model = LogisticRegression::fit(&rows, &labels, &LogisticParams::default());

        assert!(model.weights()[0] > 0.0);
        assert!(model.predict(&[1.8]));
        assert!(!model.predict(&[-1.8]));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let rows = one_feature(&[-1.0, 0.5, 2.0, -0.3]);
        let labels = [false, true, true, false];
        let params = LogisticParams::default();
        assert_eq!(
            LogisticRegression::fit(&rows, &labels, &params),
            LogisticRegression::fit(&rows, &labels, &params)
        );
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) > 0.999);
    }
}
