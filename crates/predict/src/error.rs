use restock_features::{CodecError, FeatureError};
use restock_model::MissingFieldError;
use thiserror::Error;

/// Training data cannot support a binary classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient training data: {rows} usable rows across {classes} class(es)")]
pub struct InsufficientData {
    pub rows: usize,
    pub classes: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("test fraction must be in (0, 1), got {0}")]
    TestFraction(f64),
    #[error("learning rate must be positive, got {0}")]
    LearningRate(f64),
    #[error("L2 penalty must be non-negative, got {0}")]
    L2Penalty(f64),
    #[error("logistic regression needs at least one epoch")]
    NoEpochs,
    #[error("random forest needs at least one tree")]
    NoTrees,
    #[error("tree depth must be at least 1")]
    ZeroDepth,
    #[error("feature spec '{0}' has no features")]
    EmptyFeatureSpec(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),

    #[error("invalid training configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<FeatureError> for PredictError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::MissingField(e) => Self::MissingField(e),
            FeatureError::Codec(e) => Self::Codec(e),
        }
    }
}
