//! Regression tree grown on a bootstrap sample

use crate::features::NUM_FEATURES;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Nodes whose squared error falls below this are treated as pure
const PURITY_EPS: f64 = 1e-10;

/// ChaCha stream for per-node feature draws; bootstrap sampling uses stream 0
const FEATURE_STREAM: u64 = 1;

/// Generator for the per-node feature draws of a tree seeded with `seed`
fn feature_rng(seed: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(FEATURE_STREAM);
    rng
}

/// Decision tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Minimum samples required to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf node
    pub min_samples_leaf: usize,
    /// Non-constant features evaluated per split
    pub max_features: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 15,
            min_samples_split: 3,
            min_samples_leaf: 1,
            max_features: NUM_FEATURES,
            seed: 42,
        }
    }
}

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Mean target of the samples reaching this leaf
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        /// Samples with `x[feature_idx] <= threshold` go left
        threshold: f64,
        n_samples: usize,
        /// Mean squared error at this node
        impurity: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    fn validate(&self, n_features: usize) -> Result<(), String> {
        match self {
            TreeNode::Leaf { value, .. } => {
                if value.is_finite() {
                    Ok(())
                } else {
                    Err(format!("non-finite leaf value {}", value))
                }
            }
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if *feature_idx >= n_features {
                    return Err(format!(
                        "split on feature {} but model has {} features",
                        feature_idx, n_features
                    ));
                }
                if !threshold.is_finite() {
                    return Err(format!("non-finite threshold {}", threshold));
                }
                left.validate(n_features)?;
                right.validate(n_features)
            }
        }
    }
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    /// Reduction in summed squared error
    gain: f64,
}

/// Decision Tree model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    config: TreeConfig,
    root: Option<TreeNode>,
    /// Unnormalized squared-error reduction per feature
    importances: [f64; NUM_FEATURES],
}

impl DecisionTree {
    /// Create a new decision tree with config
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            root: None,
            importances: [0.0; NUM_FEATURES],
        }
    }

    /// Grow the tree on the rows selected by `sample` (indices may repeat)
    pub fn fit(&mut self, rows: &[[f64; NUM_FEATURES]], targets: &[f64], sample: &[usize]) {
        self.importances = [0.0; NUM_FEATURES];
        let mut rng = feature_rng(self.config.seed);

        self.root = Some(self.build_tree(rows, targets, sample.to_vec(), 0, &mut rng));
    }

    /// Build tree recursively
    fn build_tree(
        &mut self,
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n = indices.len();
        let mean = mean(targets, &indices);
        let sse = sse(targets, &indices, mean);

        // Check stopping conditions
        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || sse < PURITY_EPS
        {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        }

        let Some(split) = self.find_best_split(rows, targets, &indices, sse, rng) else {
            return TreeNode::Leaf {
                value: mean,
                n_samples: n,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| rows[i][split.feature_idx] <= split.threshold);

        self.importances[split.feature_idx] += split.gain;

        let left = self.build_tree(rows, targets, left_indices, depth + 1, rng);
        let right = self.build_tree(rows, targets, right_indices, depth + 1, rng);

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            n_samples: n,
            impurity: sse / n as f64,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Best split among a random draw of features.
    ///
    /// Features are visited in shuffled order until `max_features` of them
    /// have been found to vary within the node.
    fn find_best_split(
        &self,
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        indices: &[usize],
        parent_sse: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let mut feature_order: Vec<usize> = (0..NUM_FEATURES).collect();
        feature_order.shuffle(rng);

        let n = indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();

        let mut best: Option<SplitCandidate> = None;
        let mut best_gain = 0.0;
        let mut visited = 0;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for &feature_idx in &feature_order {
            if visited >= self.config.max_features {
                break;
            }

            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (rows[i][feature_idx], targets[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for k in 0..n - 1 {
                let (x, y) = pairs[k];
                left_sum += y;
                left_sq += y * y;

                let next_x = pairs[k + 1].0;
                if x == next_x {
                    continue;
                }

                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let left_sse = left_sq - left_sum * left_sum / n_left as f64;
                let right_sse = right_sq - right_sum * right_sum / n_right as f64;
                let gain = parent_sse - (left_sse + right_sse);

                if gain > best_gain {
                    best_gain = gain;
                    let mut threshold = (x + next_x) / 2.0;
                    // midpoint can round up onto the right-hand value
                    if threshold >= next_x {
                        threshold = x;
                    }
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Predict for a single sample
    pub fn predict_one(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        let mut node = match &self.root {
            Some(node) => node,
            None => return 0.0,
        };

        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Unnormalized squared-error reduction credited to each feature
    pub fn raw_importances(&self) -> &[f64; NUM_FEATURES] {
        &self.importances
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map(|r| r.depth()).unwrap_or(0)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map(|r| r.n_leaves()).unwrap_or(0)
    }

    /// Structural sanity check for deserialized trees
    pub fn validate(&self) -> Result<(), String> {
        let root = self.root.as_ref().ok_or("tree has no root")?;
        root.validate(NUM_FEATURES)?;

        if self.importances.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("invalid feature importances".to_string());
        }
        Ok(())
    }
}

fn mean(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

fn sse(targets: &[f64], indices: &[usize], mean: f64) -> f64 {
    indices.iter().map(|&i| (targets[i] - mean).powi(2)).sum()
}
