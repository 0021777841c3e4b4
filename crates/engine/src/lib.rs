//! Restocking decision engine.
//!
//! Orchestrates the codec and one predictor strategy to go from a record
//! (or a hypothetical item) to a `Verdict`:
//! - [`Snapshot`]: immutable per-load state (records, codec, trained model)
//! - [`Strategy`]: which predictor backs a decision
//! - [`DecisionEngine`]: stateless single and batch decisions

use restock_features::{Codec, CodecError};
use restock_model::{CategoricalField, InventoryRecord, MissingFieldError, Verdict};
use restock_predict::{
    train, ConfigError, InsufficientData, PredictError, RulePredictor, TrainedModel,
    TrainingConfig, DEFAULT_THRESHOLD,
};
use restock_query::FilterCriteria;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("model strategy unavailable: {0}")]
    InsufficientData(#[from] InsufficientData),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<PredictError> for EngineError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::MissingField(e) => Self::MissingField(e),
            PredictError::Codec(e) => Self::Codec(e),
            PredictError::InsufficientData(e) => Self::InsufficientData(e),
            PredictError::Config(e) => Self::Config(e),
        }
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default restock floor for the rule strategy
    pub threshold: u32,
    pub training: TrainingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            training: TrainingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.training.validate()
    }
}

/// Everything derived from one dataset load.
///
/// Never mutated after construction; a reload builds a new snapshot with
/// the next version number, so readers holding the old `Arc` keep a
/// consistent codec and model.
#[derive(Debug)]
pub struct Snapshot {
    version: u64,
    records: Vec<InventoryRecord>,
    codec: Codec,
    model: Result<TrainedModel, InsufficientData>,
}

impl Snapshot {
    /// Encode `records` and train the configured classifier.
    ///
    /// Too little training data leaves the model strategy unavailable rather
    /// than failing the whole snapshot.
    pub fn build(records: Vec<InventoryRecord>, config: &EngineConfig) -> Result<Arc<Self>, EngineError> {
        Self::build_version(1, records, config)
    }

    /// Build the successor snapshot for a reloaded table.
    pub fn rebuild(
        &self,
        records: Vec<InventoryRecord>,
        config: &EngineConfig,
    ) -> Result<Arc<Self>, EngineError> {
        Self::build_version(self.version + 1, records, config)
    }

    fn build_version(
        version: u64,
        records: Vec<InventoryRecord>,
        config: &EngineConfig,
    ) -> Result<Arc<Self>, EngineError> {
        config.validate()?;
        let codec = Codec::build(&records, &CategoricalField::ALL);

        let model = match train(&records, &codec, &config.training) {
            Ok(model) => Ok(model),
            Err(PredictError::InsufficientData(reason)) => {
                tracing::warn!(%reason, version, "model strategy unavailable for snapshot");
                Err(reason)
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(
            version,
            records = records.len(),
            model = model.is_ok(),
            "built inventory snapshot"
        );

        Ok(Arc::new(Self {
            version,
            records,
            codec,
            model,
        }))
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// The trained model, or why it could not be trained.
    pub fn model(&self) -> Result<&TrainedModel, EngineError> {
        self.model.as_ref().map_err(|reason| EngineError::InsufficientData(*reason))
    }
}

/// Which predictor backs a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// Fixed threshold; `None` uses the engine default.
    RuleBased { threshold: Option<u32> },
    TrainedClassifier,
}

impl Strategy {
    pub fn rule() -> Self {
        Self::RuleBased { threshold: None }
    }

    pub fn rule_with_threshold(threshold: u32) -> Self {
        Self::RuleBased {
            threshold: Some(threshold),
        }
    }
}

/// Outcome of a single decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub verdict: Verdict,

    /// Classifier restock probability (model strategy only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    /// Historical records with the same categorical attributes and stock
    /// quantities; display only (model strategy only)
    pub matches: Vec<InventoryRecord>,
}

/// Verdict for one record of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordVerdict {
    /// Position in the input batch
    pub index: usize,
    pub record: InventoryRecord,
    pub verdict: Verdict,
}

/// A batch record excluded for lacking a required field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub field: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub verdicts: Vec<RecordVerdict>,
    pub skipped: Vec<SkippedRecord>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty() && self.skipped.is_empty()
    }
}

/// Stateless decision orchestration over a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEngine {
    default_threshold: u32,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DecisionEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_threshold: config.threshold,
        }
    }

    fn rule(&self, threshold: Option<u32>) -> RulePredictor {
        RulePredictor::new(threshold.unwrap_or(self.default_threshold))
    }

    fn verdict(
        &self,
        snapshot: &Snapshot,
        strategy: &Strategy,
        record: &InventoryRecord,
    ) -> Result<Verdict, EngineError> {
        match strategy {
            Strategy::RuleBased { threshold } => Ok(self.rule(*threshold).predict(record)?),
            Strategy::TrainedClassifier => Ok(snapshot.model()?.predict(record, snapshot.codec())?),
        }
    }

    /// Decide for one record or hypothetical item.
    pub fn decide(
        &self,
        snapshot: &Snapshot,
        strategy: &Strategy,
        record: &InventoryRecord,
    ) -> Result<Decision, EngineError> {
        match strategy {
            Strategy::RuleBased { threshold } => Ok(Decision {
                verdict: self.rule(*threshold).predict(record)?,
                probability: None,
                matches: Vec::new(),
            }),
            Strategy::TrainedClassifier => {
                let model = snapshot.model()?;
                let probability = model.probability(record, snapshot.codec())?;
                let verdict = model.predict(record, snapshot.codec())?;
                let matches = snapshot
                    .records()
                    .iter()
                    .filter(|r| r.matches_item(record))
                    .cloned()
                    .collect();
                Ok(Decision {
                    verdict,
                    probability: Some(probability),
                    matches,
                })
            }
        }
    }

    /// Decide independently for every record.
    ///
    /// Records missing a required field are reported in `skipped`; any other
    /// error aborts the batch.
    pub fn decide_batch(
        &self,
        snapshot: &Snapshot,
        strategy: &Strategy,
        records: &[InventoryRecord],
    ) -> Result<BatchOutcome, EngineError> {
        let mut outcome = BatchOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }
        if let Strategy::TrainedClassifier = strategy {
            snapshot.model()?;
        }

        for (index, record) in records.iter().enumerate() {
            match self.verdict(snapshot, strategy, record) {
                Ok(verdict) => outcome.verdicts.push(RecordVerdict {
                    index,
                    record: record.clone(),
                    verdict,
                }),
                Err(EngineError::MissingField(err)) => {
                    tracing::warn!(index, %err, "skipping record");
                    outcome.skipped.push(SkippedRecord {
                        index,
                        field: err.field,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        tracing::debug!(
            decided = outcome.verdicts.len(),
            skipped = outcome.skipped.len(),
            "batch decision complete"
        );
        Ok(outcome)
    }

    /// Narrow the snapshot's records by `criteria`, then decide for each.
    pub fn filter_and_decide(
        &self,
        snapshot: &Snapshot,
        strategy: &Strategy,
        criteria: &FilterCriteria,
    ) -> Result<BatchOutcome, EngineError> {
        let subset = restock_query::apply(snapshot.records(), criteria);
        self.decide_batch(snapshot, strategy, &subset)
    }
}
