//! Restocking predictors.
//!
//! Two interchangeable ways to reach a `Verdict` for an inventory record:
//! - [`RulePredictor`]: fixed available-stock threshold
//! - [`TrainedModel`]: binary classifier (logistic regression or random
//!   forest) fitted on the loaded table

mod error;
mod forest;
mod logistic;
mod model;
mod rule;

pub use error::{ConfigError, InsufficientData, PredictError};
pub use forest::{ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression};
pub use model::{evaluate, train, Algorithm, EvaluationReport, TrainedModel, TrainingConfig};
pub use rule::{RulePredictor, DEFAULT_THRESHOLD};

/// A fitted two-class model over scaled feature vectors.
pub trait BinaryClassifier {
    /// Probability of the restock class.
    fn probability(&self, features: &[f64]) -> f64;

    fn predict(&self, features: &[f64]) -> bool {
        self.probability(features) >= 0.5
    }
}
