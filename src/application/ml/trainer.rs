//! Gradient-boosted decision trees for the binary logistic objective.
//!
//! Each round fits one regression tree to the first and second derivatives of
//! the log loss (exact greedy split search, L2-regularized leaf weights). The
//! fitted ensemble is written in the XGBoost JSON schema so any evaluator of
//! that schema, including `tree_ensemble`, can score it.
//!
//! Splits send `x < threshold` left, matching the evaluator.

use crate::application::ml::tree_ensemble::sigmoid;
use crate::domain::ml::feature_registry::{FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};

pub const NUM_ROUNDS: usize = 100;
pub const MAX_DEPTH: usize = 4;
pub const LEARNING_RATE: f64 = 0.05;
pub const REG_LAMBDA: f64 = 1.0;
pub const MIN_CHILD_HESSIAN: f64 = 1.0;

/// Positive rates are clamped to this band before taking the log-odds
const PRIOR_CLAMP: f64 = 1e-3;
const HESSIAN_FLOOR: f64 = 1e-16;
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Booster hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Shrinkage applied to every leaf weight
    pub learning_rate: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: NUM_ROUNDS,
            max_depth: MAX_DEPTH,
            learning_rate: LEARNING_RATE,
            reg_lambda: REG_LAMBDA,
            min_child_weight: MIN_CHILD_HESSIAN,
        }
    }
}

/// One fitted tree in flat array form. Children of a node are allocated
/// consecutively; leaves carry `-1` children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FittedTree {
    pub left_children: Vec<i64>,
    pub right_children: Vec<i64>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f64>,
    pub base_weights: Vec<f64>,
}

impl FittedTree {
    fn push_node(&mut self) -> usize {
        self.left_children.push(-1);
        self.right_children.push(-1);
        self.split_indices.push(0);
        self.split_conditions.push(0.0);
        self.base_weights.push(0.0);
        self.base_weights.len() - 1
    }

    pub fn num_nodes(&self) -> usize {
        self.base_weights.len()
    }

    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = 0usize;
        while self.left_children[node] != -1 {
            let feature = self.split_indices[node] as usize;
            node = if features[feature] < self.split_conditions[node] {
                self.left_children[node] as usize
            } else {
                self.right_children[node] as usize
            };
        }
        self.base_weights[node]
    }
}

/// A fitted ensemble plus its training diagnostics
#[derive(Debug, Clone)]
pub struct FittedEnsemble {
    /// Prior log-odds, stored as the model's base score
    pub base_margin: f64,
    pub trees: Vec<FittedTree>,
    pub positive_rate: f64,
    /// In-sample accuracy at the 0.5 cut
    pub train_accuracy: f64,
}

impl FittedEnsemble {
    pub fn predict_margin(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, t| acc + t.predict(features))
    }

    pub fn to_document(&self) -> ModelDocument {
        ModelDocument::from_ensemble(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_document())
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeGrower<'a> {
    x: &'a [[f64; FEATURE_COUNT]],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoosterParams,
    tree: FittedTree,
}

impl TreeGrower<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        let w = -g / (h + self.params.reg_lambda);
        if w.is_finite() {
            w * self.params.learning_rate
        } else {
            0.0
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let parent_score = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();

        for feature in 0..FEATURE_COUNT {
            order.sort_by(|a, b| self.x[*a][feature].total_cmp(&self.x[*b][feature]));

            let (mut g_left, mut h_left) = (0.0, 0.0);
            for pair in order.windows(2) {
                let (current, next) = (pair[0], pair[1]);
                g_left += self.grad[current];
                h_left += self.hess[current];

                let lo = self.x[current][feature];
                let hi = self.x[next][feature];
                if lo >= hi {
                    continue;
                }

                let h_right = h_total - h_left;
                if h_left < self.params.min_child_weight || h_right < self.params.min_child_weight
                {
                    continue;
                }

                let gain = self.score(g_left, h_left) + self.score(g_total - g_left, h_right)
                    - parent_score;
                if gain > MIN_SPLIT_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                    let mid = lo + (hi - lo) / 2.0;
                    best = Some(SplitCandidate {
                        feature,
                        threshold: if mid > lo { mid } else { hi },
                        gain,
                    });
                }
            }
        }
        best
    }

    fn grow(&mut self, node: usize, rows: &[usize], depth: usize) {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();
        let weight = self.leaf_weight(g, h);
        self.tree.base_weights[node] = weight;
        // leaves repeat their value in split_conditions, as XGBoost writes them
        self.tree.split_conditions[node] = weight;

        if depth >= self.params.max_depth || rows.len() < 2 {
            return;
        }
        let Some(split) = self.best_split(rows, g, h) else {
            return;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[r][split.feature] < split.threshold);

        let left = self.tree.push_node();
        let right = self.tree.push_node();
        self.tree.left_children[node] = left as i64;
        self.tree.right_children[node] = right as i64;
        self.tree.split_indices[node] = split.feature as i64;
        self.tree.split_conditions[node] = split.threshold;

        self.grow(left, &left_rows, depth + 1);
        self.grow(right, &right_rows, depth + 1);
    }
}

/// Fits a binary classifier. `y` holds 0.0 / 1.0 targets, one per row of `x`.
pub fn fit(x: &[[f64; FEATURE_COUNT]], y: &[f64], params: &BoosterParams) -> FittedEnsemble {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);

    let positive_rate = if n == 0 {
        0.0
    } else {
        y.iter().sum::<f64>() / n as f64
    };
    let prior = positive_rate.clamp(PRIOR_CLAMP, 1.0 - PRIOR_CLAMP);
    let base_margin = (prior / (1.0 - prior)).ln();

    let mut margins = vec![base_margin; n];
    let mut grad = vec![0.0; n];
    let mut hess = vec![0.0; n];
    let all_rows: Vec<usize> = (0..n).collect();
    let mut trees = Vec::with_capacity(params.n_estimators);

    for _ in 0..params.n_estimators {
        for i in 0..n {
            let p = sigmoid(margins[i]);
            grad[i] = p - y[i];
            hess[i] = (p * (1.0 - p)).max(HESSIAN_FLOOR);
        }

        let mut grower = TreeGrower {
            x,
            grad: &grad,
            hess: &hess,
            params,
            tree: FittedTree::default(),
        };
        let root = grower.tree.push_node();
        grower.grow(root, &all_rows, 0);
        let tree = grower.tree;

        for (margin, row) in margins.iter_mut().zip(x) {
            *margin += tree.predict(row);
        }
        trees.push(tree);
    }

    let correct = margins
        .iter()
        .zip(y)
        .filter(|(m, t)| (**m > 0.0) == (**t > 0.5))
        .count();
    let train_accuracy = if n == 0 {
        0.0
    } else {
        correct as f64 / n as f64
    };

    FittedEnsemble {
        base_margin,
        trees,
        positive_rate,
        train_accuracy,
    }
}

// XGBoost JSON schema (the subset this crate writes)

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub learner: LearnerSection,
    pub version: [u32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerSection {
    pub feature_names: Vec<String>,
    pub gradient_booster: GradientBoosterSection,
    pub learner_model_param: LearnerModelParam,
    pub objective: ObjectiveSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    pub base_score: String,
    pub num_class: String,
    pub num_feature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosterSection {
    pub name: String,
    pub model: BoosterModel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterModel {
    pub gbtree_model_param: GbTreeModelParam,
    pub tree_info: Vec<u32>,
    pub trees: Vec<TreeSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbTreeModelParam {
    pub num_parallel_tree: String,
    pub num_trees: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSection {
    pub id: usize,
    pub base_weights: Vec<f64>,
    pub default_left: Vec<u8>,
    pub left_children: Vec<i64>,
    pub right_children: Vec<i64>,
    pub split_conditions: Vec<f64>,
    pub split_indices: Vec<i64>,
    pub tree_param: TreeParam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    pub num_deleted: String,
    pub num_feature: String,
    pub num_nodes: String,
    pub size_leaf_vector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSection {
    pub name: String,
}

impl ModelDocument {
    fn from_ensemble(ensemble: &FittedEnsemble) -> Self {
        let num_feature = FEATURE_COUNT.to_string();
        let trees = ensemble
            .trees
            .iter()
            .enumerate()
            .map(|(id, t)| TreeSection {
                id,
                base_weights: t.base_weights.clone(),
                default_left: vec![0; t.num_nodes()],
                left_children: t.left_children.clone(),
                right_children: t.right_children.clone(),
                split_conditions: t.split_conditions.clone(),
                split_indices: t.split_indices.clone(),
                tree_param: TreeParam {
                    num_deleted: "0".to_string(),
                    num_feature: num_feature.clone(),
                    num_nodes: t.num_nodes().to_string(),
                    size_leaf_vector: "1".to_string(),
                },
            })
            .collect::<Vec<_>>();

        Self {
            learner: LearnerSection {
                feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                gradient_booster: GradientBoosterSection {
                    name: "gbtree".to_string(),
                    model: BoosterModel {
                        gbtree_model_param: GbTreeModelParam {
                            num_parallel_tree: "1".to_string(),
                            num_trees: trees.len().to_string(),
                        },
                        tree_info: vec![0; trees.len()],
                        trees,
                    },
                },
                learner_model_param: LearnerModelParam {
                    base_score: ensemble.base_margin.to_string(),
                    num_class: "0".to_string(),
                    num_feature,
                },
                objective: ObjectiveSection {
                    name: "binary:logistic".to_string(),
                },
            },
            version: [2, 0, 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::tree_ensemble::TreeEnsemble;

    fn separable(n: usize) -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        let x: Vec<[f64; FEATURE_COUNT]> = (0..n)
            .map(|i| {
                let v = i as f64 / n as f64;
                [v, (i % 7) as f64, 0.0, -v, (i % 5) as f64, (i % 24) as f64]
            })
            .collect();
        let y = x.iter().map(|r| if r[0] >= 0.6 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_fit_learns_threshold() {
        let (x, y) = separable(200);
        let model = fit(&x, &y, &BoosterParams::default());

        assert_eq!(model.trees.len(), NUM_ROUNDS);
        assert!((model.positive_rate - 0.4).abs() < 1e-9);
        assert!(model.train_accuracy > 0.95);

        let low = [0.1, 0.0, 0.0, -0.1, 0.0, 0.0];
        let high = [0.9, 0.0, 0.0, -0.9, 0.0, 0.0];
        assert!(sigmoid(model.predict_margin(&high)) > sigmoid(model.predict_margin(&low)));
    }

    #[test]
    fn test_trees_respect_depth_and_layout() {
        let (x, y) = separable(120);
        let model = fit(&x, &y, &BoosterParams::default());

        for tree in &model.trees {
            let n = tree.num_nodes();
            assert!(n <= (1 << (MAX_DEPTH + 1)) - 1);
            for node in 0..n {
                let left = tree.left_children[node];
                if left == -1 {
                    assert_eq!(tree.right_children[node], -1);
                    assert_eq!(tree.split_conditions[node], tree.base_weights[node]);
                } else {
                    assert_eq!(tree.right_children[node], left + 1);
                    assert!((left as usize) < n);
                }
            }
        }
    }

    #[test]
    fn test_serialized_model_scores_like_fitted_model() {
        let (x, y) = separable(150);
        let model = fit(&x, &y, &BoosterParams::default());
        let json = model.to_json().unwrap();
        let parsed = TreeEnsemble::from_json_str(&json).unwrap();

        assert_eq!(parsed.num_trees(), model.trees.len());
        for row in x.iter().step_by(10) {
            let expected = model.predict_margin(row);
            assert!((parsed.predict_raw(row) - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_class_is_constant() {
        let (x, _) = separable(60);
        let y = vec![0.0; 60];
        let model = fit(&x, &y, &BoosterParams::default());
        assert_eq!(model.positive_rate, 0.0);
        assert_eq!(model.train_accuracy, 1.0);
        assert!(sigmoid(model.predict_margin(&x[0])) < 0.01);
    }

    #[test]
    fn test_document_descriptive_fields() {
        let (x, y) = separable(80);
        let params = BoosterParams {
            n_estimators: 3,
            ..BoosterParams::default()
        };
        let doc = fit(&x, &y, &params).to_document();
        assert_eq!(doc.learner.feature_names.len(), FEATURE_COUNT);
        assert_eq!(doc.learner.objective.name, "binary:logistic");
        assert_eq!(doc.learner.gradient_booster.model.trees.len(), 3);
        assert_eq!(doc.learner.gradient_booster.model.gbtree_model_param.num_trees, "3");
    }
}
