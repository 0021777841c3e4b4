//! Training, inference and hold-out evaluation for the classifier strategy.

use crate::error::{ConfigError, InsufficientData, PredictError};
use crate::forest::{ForestParams, RandomForest};
use crate::logistic::{LogisticParams, LogisticRegression};
use crate::BinaryClassifier;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use restock_features::{
    Codec, CodecError, FeatureError, FeatureSpec, FeatureVector, FittedScaler, StandardScaler,
};
use restock_model::{InventoryRecord, LabelRule, Verdict};
use serde::{Deserialize, Serialize};

/// Classifier family used by the model strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    LogisticRegression,
    RandomForest,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "logistic_regression",
            Self::RandomForest => "random_forest",
        }
    }
}

/// Knobs for training the classifier strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub algorithm: Algorithm,

    /// Source of the binary label
    pub label_rule: LabelRule,

    /// Seed for every random draw (bootstraps, feature sampling, splits)
    pub seed: u64,

    /// Held-out share for [`evaluate`]; unused on the prediction path
    pub test_fraction: f64,

    pub feature_spec: FeatureSpec,
    pub logistic: LogisticParams,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            label_rule: LabelRule::default(),
            seed: 42,
            test_fraction: 0.2,
            feature_spec: FeatureSpec::default(),
            logistic: LogisticParams::default(),
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::TestFraction(self.test_fraction));
        }
        if self.feature_spec.features.is_empty() {
            return Err(ConfigError::EmptyFeatureSpec(self.feature_spec.name.clone()));
        }
        match self.algorithm {
            Algorithm::LogisticRegression => {
                let p = &self.logistic;
                if !(p.learning_rate > 0.0) {
                    return Err(ConfigError::LearningRate(p.learning_rate));
                }
                if !(p.l2 >= 0.0) {
                    return Err(ConfigError::L2Penalty(p.l2));
                }
                if p.epochs == 0 {
                    return Err(ConfigError::NoEpochs);
                }
            }
            Algorithm::RandomForest => {
                if self.forest.n_trees == 0 {
                    return Err(ConfigError::NoTrees);
                }
                if self.forest.max_depth == 0 {
                    return Err(ConfigError::ZeroDepth);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
enum Classifier {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl BinaryClassifier for Classifier {
    fn probability(&self, features: &[f64]) -> f64 {
        match self {
            Self::LogisticRegression(model) => model.probability(features),
            Self::RandomForest(model) => model.probability(features),
        }
    }
}

/// A fitted classifier together with the feature spec and scaler it was
/// trained with. Inference always goes through these same instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    spec: FeatureSpec,
    scaler: FittedScaler,
    classifier: Classifier,
    label_rule: LabelRule,
    seed: u64,
    training_rows: usize,
}

struct Prepared {
    rows: Vec<FeatureVector>,
    labels: Vec<bool>,
    excluded: usize,
}

/// Vectorise and label records, dropping rows that lack a required field.
fn prepare<'a>(
    records: impl IntoIterator<Item = &'a InventoryRecord>,
    codec: &Codec,
    spec: &FeatureSpec,
    label_rule: LabelRule,
) -> Result<Prepared, PredictError> {
    let mut prepared = Prepared {
        rows: Vec::new(),
        labels: Vec::new(),
        excluded: 0,
    };

    for record in records {
        let label = match label_rule.label(record) {
            Ok(label) => label,
            Err(err) => {
                tracing::warn!(%err, "excluding record from training");
                prepared.excluded += 1;
                continue;
            }
        };
        match spec.vectorize(record, codec) {
            Ok(vector) => {
                prepared.rows.push(vector);
                prepared.labels.push(label);
            }
            Err(FeatureError::MissingField(err)) => {
                tracing::warn!(%err, "excluding record from training");
                prepared.excluded += 1;
            }
            Err(FeatureError::Codec(err)) => return Err(err.into()),
        }
    }

    Ok(prepared)
}

/// Every categorical column of `spec` must have a codec table.
fn check_encoded(codec: &Codec, spec: &FeatureSpec) -> Result<(), CodecError> {
    match spec
        .categorical_fields()
        .into_iter()
        .find(|&field| codec.table(field).is_none())
    {
        Some(field) => Err(CodecError::UnencodedField(field)),
        None => Ok(()),
    }
}

fn check_classes(labels: &[bool]) -> Result<(), InsufficientData> {
    let positives = labels.iter().filter(|&&l| l).count();
    let classes = usize::from(positives > 0) + usize::from(positives < labels.len());
    if labels.is_empty() || classes < 2 {
        return Err(InsufficientData {
            rows: labels.len(),
            classes,
        });
    }
    Ok(())
}

/// Fit the configured classifier on `records`.
pub fn train(
    records: &[InventoryRecord],
    codec: &Codec,
    config: &TrainingConfig,
) -> Result<TrainedModel, PredictError> {
    config.validate()?;
    check_encoded(codec, &config.feature_spec)?;
    let prepared = prepare(records, codec, &config.feature_spec, config.label_rule)?;
    fit(prepared, config)
}

fn fit(prepared: Prepared, config: &TrainingConfig) -> Result<TrainedModel, PredictError> {
    check_classes(&prepared.labels)?;

    let spec = config.feature_spec.clone();
    let scaler = StandardScaler::fit(&spec, &prepared.rows);
    let scaled: Vec<FeatureVector> = prepared.rows.iter().map(|r| scaler.transform(r)).collect();

    let classifier = match config.algorithm {
        Algorithm::LogisticRegression => Classifier::LogisticRegression(LogisticRegression::fit(
            &scaled,
            &prepared.labels,
            &config.logistic,
        )),
        Algorithm::RandomForest => {
            let mut rng = StdRng::seed_from_u64(config.seed);
            Classifier::RandomForest(RandomForest::fit(
                &scaled,
                &prepared.labels,
                &config.forest,
                &mut rng,
            ))
        }
    };

    tracing::debug!(
        algorithm = config.algorithm.as_str(),
        rows = scaled.len(),
        excluded = prepared.excluded,
        spec = %spec.name,
        version = spec.version,
        "trained restock classifier"
    );

    Ok(TrainedModel {
        spec,
        scaler,
        classifier,
        label_rule: config.label_rule,
        seed: config.seed,
        training_rows: scaled.len(),
    })
}

impl TrainedModel {
    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    pub fn algorithm(&self) -> Algorithm {
        match self.classifier {
            Classifier::LogisticRegression(_) => Algorithm::LogisticRegression,
            Classifier::RandomForest(_) => Algorithm::RandomForest,
        }
    }

    pub fn label_rule(&self) -> LabelRule {
        self.label_rule
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Scaled feature vector for `record`, exactly as the classifier sees it.
    pub fn features(
        &self,
        record: &InventoryRecord,
        codec: &Codec,
    ) -> Result<FeatureVector, PredictError> {
        let raw = self.spec.vectorize(record, codec)?;
        Ok(self.scaler.transform(&raw))
    }

    /// Probability that `record` needs restocking.
    pub fn probability(&self, record: &InventoryRecord, codec: &Codec) -> Result<f64, PredictError> {
        let features = self.features(record, codec)?;
        Ok(self.classifier.probability(features.as_slice()))
    }

    /// Classify `record`.
    ///
    /// The suggested quantity is a heuristic, `max(sold - available, 1)` for
    /// restock verdicts; the classifier only decides the status.
    pub fn predict(&self, record: &InventoryRecord, codec: &Codec) -> Result<Verdict, PredictError> {
        let features = self.features(record, codec)?;
        if !self.classifier.predict(features.as_slice()) {
            return Ok(Verdict::sufficient());
        }
        let available = record.require_available()?;
        let sold = record.require_sold()?;
        Ok(Verdict::restock(sold.saturating_sub(available).max(1)))
    }
}

/// Hold-out quality figures for a classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub algorithm: Algorithm,
    pub train_rows: usize,
    pub test_rows: usize,
    pub excluded_rows: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Seeded shuffle, split by `test_fraction`, train on one part and score the
/// other. For reporting only.
pub fn evaluate(
    records: &[InventoryRecord],
    codec: &Codec,
    config: &TrainingConfig,
) -> Result<EvaluationReport, PredictError> {
    config.validate()?;
    check_encoded(codec, &config.feature_spec)?;
    let prepared = prepare(records, codec, &config.feature_spec, config.label_rule)?;
    let excluded_rows = prepared.excluded;

    let n = prepared.rows.len();
    if n < 2 {
        return Err(InsufficientData {
            rows: n,
            classes: prepared.labels.iter().collect::<std::collections::BTreeSet<_>>().len(),
        }
        .into());
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));
    let test_rows = ((n as f64 * config.test_fraction).round() as usize).clamp(1, n - 1);
    let (test_idx, train_idx) = order.split_at(test_rows);

    let pick = |idx: &[usize]| Prepared {
        rows: idx.iter().map(|&i| prepared.rows[i].clone()).collect(),
        labels: idx.iter().map(|&i| prepared.labels[i]).collect(),
        excluded: 0,
    };
    let model = fit(pick(train_idx), config)?;

    let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
    for &i in test_idx {
        let scaled = model.scaler.transform(&prepared.rows[i]);
        let predicted = model.classifier.predict(scaled.as_slice());
        let actual = prepared.labels[i];
        match (predicted, actual) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
        if predicted == actual {
            correct += 1;
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

    Ok(EvaluationReport {
        algorithm: config.algorithm,
        train_rows: train_idx.len(),
        test_rows,
        excluded_rows,
        accuracy: ratio(correct, test_rows),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
    })
}
