//! Bagged CART trees with Gini splits.

use crate::BinaryClassifier;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use restock_features::FeatureVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; `None` uses `sqrt(width)`.
    pub max_features: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 8,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
enum Node {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn probability(&self, features: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    rows: &'a [FeatureVector],
    labels: &'a [bool],
    params: &'a ForestParams,
    max_features: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl TreeBuilder<'_> {
    fn build(&self, sample: &[usize], depth: usize, rng: &mut StdRng) -> Node {
        let positives = sample.iter().filter(|&&i| self.labels[i]).count();
        let probability = positives as f64 / sample.len().max(1) as f64;

        let pure = positives == 0 || positives == sample.len();
        if pure || depth >= self.params.max_depth || sample.len() < self.params.min_samples_split
        {
            return Node::Leaf { probability };
        }

        let width = self.rows[sample[0]].len();
        let features = index::sample(&mut *rng, width, self.max_features.min(width));
        let best = features
            .into_iter()
            .filter_map(|feature| self.best_split(sample, feature))
            .fold(None::<Candidate>, |best, c| match best {
                Some(b) if b.impurity <= c.impurity => Some(b),
                _ => Some(c),
            });

        let parent = gini(positives, sample.len());
        let Some(split) = best.filter(|c| c.impurity < parent) else {
            return Node::Leaf { probability };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .partition(|&&i| self.rows[i].as_slice()[split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(&left, depth + 1, rng)),
            right: Box::new(self.build(&right, depth + 1, rng)),
        }
    }

    /// Lowest weighted Gini over midpoints between distinct sorted values.
    fn best_split(&self, sample: &[usize], feature: usize) -> Option<Candidate> {
        let mut points: Vec<(f64, bool)> = sample
            .iter()
            .map(|&i| (self.rows[i].as_slice()[feature], self.labels[i]))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = points.len();
        let total_pos = points.iter().filter(|p| p.1).count();
        let mut left_pos = 0;
        let mut best: Option<Candidate> = None;

        for i in 1..total {
            if points[i - 1].1 {
                left_pos += 1;
            }
            if points[i - 1].0 == points[i].0 {
                continue;
            }
            let impurity = (i as f64 * gini(left_pos, i)
                + (total - i) as f64 * gini(total_pos - left_pos, total - i))
                / total as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(Candidate {
                    feature,
                    threshold: (points[i - 1].0 + points[i].0) / 2.0,
                    impurity,
                });
            }
        }

        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Node>,
}

impl RandomForest {
    /// Fit `n_trees` trees on bootstrap samples drawn from `rng`.
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[bool],
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        debug_assert_eq!(rows.len(), labels.len());
        let width = rows.first().map_or(0, FeatureVector::len);
        let max_features = params
            .max_features
            .unwrap_or_else(|| (width as f64).sqrt().ceil() as usize)
            .max(1);

        let builder = TreeBuilder {
            rows,
            labels,
            params,
            max_features,
        };

        let n = rows.len();
        if n == 0 {
            return Self { trees: Vec::new() };
        }
        let trees = (0..params.n_trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                builder.build(&bootstrap, 0, rng)
            })
            .collect();

        Self { trees }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl BinaryClassifier for RandomForest {
    /// Mean of the leaf probabilities across trees.
    fn probability(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees
            .iter()
            .map(|tree| tree.probability(features))
            .sum::<f64>()
            / self.trees.len() as f64
    }
}
