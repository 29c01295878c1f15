//! Bagged CART trees with Gini splits.
//!
//! Each tree sees a bootstrap sample and considers `sqrt(n_features)` random features
//! per node. Leaves keep class fractions so the forest can report a probability per
//! class as well as a single best class.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::Classifier;
use crate::error::{PredictorError, Result};
use crate::features::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_distribution(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a, const N: usize> {
    x: &'a [[f64; N]],
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    cfg: ForestConfig,
    rng: StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl<const N: usize> TreeBuilder<'_, N> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&samples);
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: normalize(&counts),
        });

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.cfg.max_depth.is_some_and(|max| depth >= max);
        if pure || depth_reached || samples.len() < self.cfg.min_samples_split.max(2) {
            return idx;
        }

        let Some(split) = self.find_split(&samples) else {
            return idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&s| self.x[s][split.feature] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return idx;
        }

        let left_idx = self.build(left, depth + 1);
        let right_idx = self.build(right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_idx,
            right: right_idx,
        };
        idx
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    // Random candidates first; fall through to the rest only if none of them can split.
    fn find_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let mut order: Vec<usize> = (0..N).collect();
        order.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(samples, feature) {
                if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    fn best_split_on(&self, samples: &[usize], feature: usize) -> Option<BestSplit> {
        let mut values: Vec<(f64, usize)> = samples
            .iter()
            .map(|&s| (self.x[s][feature], self.y[s]))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = values.len();
        let mut right = vec![0usize; self.n_classes];
        for &(_, class) in &values {
            right[class] += 1;
        }
        let mut left = vec![0usize; self.n_classes];

        let mut best: Option<BestSplit> = None;
        for i in 0..n - 1 {
            let class = values[i].1;
            left[class] += 1;
            right[class] -= 1;

            let (lo, hi) = (values[i].0, values[i + 1].0);
            if lo >= hi {
                continue;
            }
            let n_left = i + 1;
            let impurity =
                n_left as f64 * gini(&left, n_left) + (n - n_left) as f64 * gini(&right, n - n_left);
            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn normalize(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<i32>,
    n_features: usize,
    config: ForestConfig,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit<const N: usize>(x: &[[f64; N]], y: &[i32], config: ForestConfig) -> Result<Self> {
        if x.is_empty() || y.is_empty() || N == 0 {
            return Err(PredictorError::EmptyDataset);
        }
        if x.len() != y.len() {
            return Err(PredictorError::ModelFormat(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let y_idx: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or(0))
            .collect();

        let max_features = ((N as f64).sqrt() as usize).max(1);
        let n_trees = config.n_trees.max(1);
        let n = x.len();

        let trees: Vec<DecisionTree> = (0..n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut builder = TreeBuilder {
                    x,
                    y: &y_idx,
                    n_classes: classes.len(),
                    max_features,
                    cfg: config,
                    rng,
                    nodes: Vec::new(),
                };
                builder.build(sample, 0);
                DecisionTree {
                    nodes: builder.nodes,
                }
            })
            .collect();

        debug!(
            trees = trees.len(),
            classes = classes.len(),
            samples = n,
            "random forest fitted"
        );

        Ok(Self {
            classes,
            n_features: N,
            config,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_proba_row(&self, features: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.classes.len()];
        if self.trees.is_empty() {
            return acc;
        }
        for tree in &self.trees {
            for (slot, p) in acc.iter_mut().zip(tree.leaf_distribution(features)) {
                *slot += p;
            }
        }
        let n = self.trees.len() as f64;
        acc.iter_mut().for_each(|p| *p /= n);
        acc
    }

    pub fn predict_row(&self, features: &[f64]) -> i32 {
        let proba = self.predict_proba_row(features);
        let mut best = 0;
        for (idx, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = idx;
            }
        }
        self.classes.get(best).copied().unwrap_or_default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.classes.is_empty() || self.trees.is_empty() {
            return Err(PredictorError::ModelFormat("forest has no classes or trees".to_string()));
        }
        for tree in &self.trees {
            if tree.nodes.is_empty() {
                return Err(PredictorError::ModelFormat("tree has no nodes".to_string()));
            }
            for (idx, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Leaf { distribution } if distribution.len() != self.classes.len() => {
                        return Err(PredictorError::ModelFormat(
                            "leaf distribution width does not match classes".to_string(),
                        ));
                    }
                    Node::Split {
                        feature,
                        left,
                        right,
                        ..
                    } if *feature >= self.n_features
                        || !(idx + 1..tree.nodes.len()).contains(left)
                        || !(idx + 1..tree.nodes.len()).contains(right) =>
                    {
                        return Err(PredictorError::ModelFormat("split node child out of order".to_string()));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn classes(&self) -> &[i32] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> i32 {
        self.predict_row(&features.as_array())
    }

    fn predict_proba(&self, features: &FeatureVector) -> Option<Vec<f64>> {
        Some(self.predict_proba_row(&features.as_array()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<[f64; 2]>, Vec<i32>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = i as f64 / 10.0;
            x.push([v, (i % 3) as f64]);
            y.push(if v < 2.0 { 0 } else { 1 });
        }
        (x, y)
    }

    #[test]
    fn gini_of_pure_node_is_zero() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn learns_a_threshold() {
        let (x, y) = separable();
        let cfg = ForestConfig {
            n_trees: 25,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, cfg).unwrap();
        assert_eq!(forest.classes, vec![0, 1]);
        assert_eq!(forest.predict_row(&[0.3, 1.0]), 0);
        assert_eq!(forest.predict_row(&[3.5, 2.0]), 1);
    }

    #[test]
    fn same_seed_same_forest() {
        let (x, y) = separable();
        let cfg = ForestConfig {
            n_trees: 10,
            ..ForestConfig::default()
        };
        let a = RandomForest::fit(&x, &y, cfg).unwrap();
        let b = RandomForest::fit(&x, &y, cfg).unwrap();
        let point = [1.95, 1.0];
        assert_eq!(a.predict_proba_row(&point), b.predict_proba_row(&point));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let (x, y) = separable();
        let cfg = ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, cfg).unwrap();
        for point in [[0.0, 0.0], [1.99, 2.0], [2.01, 1.0], [9.0, 0.0]] {
            let total: f64 = forest.predict_proba_row(&point).iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn depth_limit_is_respected() {
        let (x, y) = separable();
        let cfg = ForestConfig {
            n_trees: 5,
            max_depth: Some(1),
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&x, &y, cfg).unwrap();
        assert!(forest.trees.iter().all(|t| t.depth() <= 1));
    }

    #[test]
    fn empty_input_is_rejected() {
        let x: Vec<[f64; 4]> = Vec::new();
        assert!(matches!(
            RandomForest::fit(&x, &[], ForestConfig::default()),
            Err(PredictorError::EmptyDataset)
        ));
    }
}
