//! Portable evaluator for boosted tree ensembles serialized in the XGBoost
//! JSON schema.
//!
//! Only the arrays needed for scoring are read:
//! `learner.learner_model_param.base_score` and, per tree in
//! `learner.gradient_booster.model.trees`, `left_children`, `right_children`,
//! `split_indices`, `split_conditions` and `base_weights`.
//!
//! Serializers have emitted inconsistent value types over time, so every
//! number is coerced: native numbers, numeric strings (optionally wrapped in
//! brackets or quotes) and singleton lists all work, anything else reads as 0.
//! Only missing structure is an error.

use crate::domain::errors::ParseError;
use crate::domain::ml::feature_registry::FeatureVector;
use serde_json::Value;

/// Base score assumed when the model omits one
pub const DEFAULT_BASE_SCORE: f64 = 0.5;

/// Leaf sentinel stored in `left_children`
const LEAF: i64 = -1;

/// Coerces a loosely typed JSON value to a real number, 0.0 when impossible.
pub fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s
            .trim_matches(|c: char| matches!(c, '[' | ']' | '\'' | '"' | ' '))
            .parse::<f64>()
            .unwrap_or(0.0),
        Value::Array(items) => items.first().map(coerce_f64).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn coerce_index(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| coerce_f64(value) as i64),
        _ => coerce_f64(value) as i64,
    }
}

/// Logistic transform
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Probability as a percentage rounded to one decimal
pub fn to_percent(probability: f64) -> f64 {
    (probability * 100.0 * 10.0).round() / 10.0
}

/// One regression tree in flat array form
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    base_weights: Vec<f64>,
}

impl DecisionTree {
    fn from_value(tree: &Value, tree_idx: usize) -> Result<Self, ParseError> {
        let array = |field: &'static str| -> Result<&Vec<Value>, ParseError> {
            tree.get(field)
                .and_then(Value::as_array)
                .ok_or(ParseError::MissingArray {
                    tree: tree_idx,
                    field,
                })
        };

        let left_children: Vec<i64> = array("left_children")?.iter().map(coerce_index).collect();
        let node_count = left_children.len();
        if node_count == 0 {
            return Err(ParseError::EmptyTree { tree: tree_idx });
        }

        let checked = |field: &'static str| -> Result<&Vec<Value>, ParseError> {
            let values = array(field)?;
            if values.len() != node_count {
                return Err(ParseError::LengthMismatch {
                    tree: tree_idx,
                    field,
                    expected: node_count,
                    found: values.len(),
                });
            }
            Ok(values)
        };

        Ok(Self {
            right_children: checked("right_children")?.iter().map(coerce_index).collect(),
            split_indices: checked("split_indices")?.iter().map(coerce_index).collect(),
            split_conditions: checked("split_conditions")?.iter().map(coerce_f64).collect(),
            base_weights: checked("base_weights")?.iter().map(coerce_f64).collect(),
            left_children,
        })
    }

    pub fn node_count(&self) -> usize {
        self.left_children.len()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.left_children[node] == LEAF
    }

    /// Leaf weight reached by `features`.
    ///
    /// Never panics: a split on a feature the input does not have, or a
    /// child pointer outside the tree, ends the walk at the current node and
    /// returns its weight. The walk is bounded by the node count, so cyclic
    /// child pointers terminate too.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let node_count = self.node_count();
        let mut node = 0usize;

        for _ in 0..node_count {
            if self.is_leaf(node) {
                break;
            }

            let Some(value) = usize::try_from(self.split_indices[node])
                .ok()
                .and_then(|idx| features.get(idx))
            else {
                return self.base_weights[node];
            };

            let next = if *value < self.split_conditions[node] {
                self.left_children[node]
            } else {
                self.right_children[node]
            };

            match usize::try_from(next) {
                Ok(child) if child < node_count => node = child,
                _ => break,
            }
        }

        self.base_weights[node]
    }
}

/// Parsed ensemble: an additive base score plus a list of trees
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    base_score: f64,
    trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    pub fn from_json_str(json: &str) -> Result<Self, ParseError> {
        let root: Value =
            serde_json::from_str(json).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Self::from_value(&root)
    }

    /// Reads a model document. The `learner` wrapper is optional.
    pub fn from_value(root: &Value) -> Result<Self, ParseError> {
        let learner = root.get("learner").unwrap_or(root);

        let base_score = learner
            .get("learner_model_param")
            .and_then(|p| p.get("base_score"))
            .map(coerce_f64)
            .unwrap_or(DEFAULT_BASE_SCORE);

        let trees = learner
            .get("gradient_booster")
            .and_then(|b| b.get("model"))
            .and_then(|m| m.get("trees"))
            .and_then(Value::as_array)
            .ok_or(ParseError::MissingSection("gradient_booster.model.trees"))?;

        let trees = trees
            .iter()
            .enumerate()
            .map(|(idx, tree)| DecisionTree::from_value(tree, idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { base_score, trees })
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Base score plus the leaf weight of every tree
    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |total, tree| total + tree.predict(features))
    }

    /// Probability in [0, 1]
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_raw(features))
    }

    /// Probability for an aligned feature row, inputs in `FEATURE_NAMES` order
    pub fn predict_vector(&self, features: &FeatureVector) -> f64 {
        self.predict_proba(&features.to_array())
    }
}
