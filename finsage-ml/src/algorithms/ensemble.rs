//! Tree ensembles: random forests and binary gradient boosting.

use crate::algorithms::tree::DecisionTree;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// How tree outputs are combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnsembleKind {
    /// Leaves hold per-class counts or proportions; each leaf is normalized
    /// to a probability vector and the trees are averaged.
    RandomForest,
    /// Binary log-odds boosting: leaves hold a single raw score, the margin
    /// is `base_score + learning_rate * sum(leaves)`.
    GradientBoosting { learning_rate: f64, base_score: f64 },
}

/// A fitted tree ensemble classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(flatten)]
    pub kind: EnsembleKind,
    pub n_features: usize,
    pub n_classes: usize,
    pub trees: Vec<DecisionTree>,
    /// Column names seen at fit time, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl TreeEnsemble {
    pub fn random_forest(n_features: usize, n_classes: usize, trees: Vec<DecisionTree>) -> Self {
        Self {
            kind: EnsembleKind::RandomForest,
            n_features,
            n_classes,
            trees,
            feature_names: None,
        }
    }

    pub fn gradient_boosting(
        n_features: usize,
        learning_rate: f64,
        base_score: f64,
        trees: Vec<DecisionTree>,
    ) -> Self {
        Self {
            kind: EnsembleKind::GradientBoosting {
                learning_rate,
                base_score,
            },
            n_features,
            n_classes: 2,
            trees,
            feature_names: None,
        }
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// Width of each tree's leaf values.
    pub fn leaf_width(&self) -> usize {
        match self.kind {
            EnsembleKind::RandomForest => self.n_classes,
            EnsembleKind::GradientBoosting { .. } => 1,
        }
    }

    /// Number of outputs the explainer attributes: one per class for a
    /// forest, a single margin for boosting.
    pub fn n_outputs(&self) -> usize {
        self.leaf_width()
    }

    pub fn validate(&self) -> Result<(), MlError> {
        if self.trees.is_empty() {
            return Err(MlError::model("ensemble has no trees"));
        }
        if self.n_features == 0 {
            return Err(MlError::model("ensemble expects zero features"));
        }
        if self.n_classes < 2 {
            return Err(MlError::model(format!(
                "classifier needs at least two classes, got {}",
                self.n_classes
            )));
        }
        if let EnsembleKind::GradientBoosting {
            learning_rate,
            base_score,
        } = self.kind
        {
            if self.n_classes != 2 {
                return Err(MlError::model("gradient boosting supports binary targets only"));
            }
            if !learning_rate.is_finite() || !base_score.is_finite() {
                return Err(MlError::model("gradient boosting parameters must be finite"));
            }
        }
        if let Some(names) = &self.feature_names
            && names.len() != self.n_features
        {
            return Err(MlError::model(format!(
                "{} feature names recorded for {} features",
                names.len(),
                self.n_features
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.leaf_width())
                .map_err(|e| MlError::model(format!("tree {t}: {e}")))?;
        }
        Ok(())
    }

    /// One tree's contribution to the ensemble output for a raw leaf value.
    ///
    /// The ensemble output (class probabilities for a forest, the log-odds
    /// margin for boosting, excluding `base_score`) is the sum of these over
    /// all trees.
    pub fn scaled_leaf(&self, value: &[f64]) -> Vec<f64> {
        match self.kind {
            EnsembleKind::RandomForest => {
                let n = self.trees.len() as f64;
                let total: f64 = value.iter().sum();
                if total > 0.0 {
                    value.iter().map(|v| v / total / n).collect()
                } else {
                    vec![0.0; value.len()]
                }
            }
            EnsembleKind::GradientBoosting { learning_rate, .. } => {
                value.iter().map(|v| v * learning_rate).collect()
            }
        }
    }

    /// Constant added to the summed tree outputs.
    pub fn base_output(&self) -> f64 {
        match self.kind {
            EnsembleKind::RandomForest => 0.0,
            EnsembleKind::GradientBoosting { base_score, .. } => base_score,
        }
    }

    /// Raw ensemble output: averaged probabilities or the boosting margin.
    pub fn raw_output(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        self.check_width(x.len())?;
        let mut out = vec![0.0; self.n_outputs()];
        for tree in &self.trees {
            for (o, v) in out.iter_mut().zip(self.scaled_leaf(tree.predict_leaf(x))) {
                *o += v;
            }
        }
        let base = self.base_output();
        out.iter_mut().for_each(|o| *o += base);
        Ok(out)
    }

    /// Class probabilities for one row.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        let raw = self.raw_output(x)?;
        Ok(match self.kind {
            EnsembleKind::RandomForest => raw,
            EnsembleKind::GradientBoosting { .. } => {
                let p = sigmoid(raw[0]);
                vec![1.0 - p, p]
            }
        })
    }

    pub(crate) fn check_width(&self, width: usize) -> Result<(), MlError> {
        if width != self.n_features {
            return Err(MlError::invalid_input(format!(
                "classifier expects {} features, row has {width}",
                self.n_features
            )));
        }
        Ok(())
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::tree::TreeNode;

    fn stump(feature: usize, threshold: f64, left: Vec<f64>, right: Vec<f64>) -> DecisionTree {
        DecisionTree::new(vec![
            TreeNode::Split {
                feature,
                threshold,
                left: 1,
                right: 2,
                cover: 10.0,
            },
            TreeNode::Leaf {
                value: left,
                cover: 5.0,
            },
            TreeNode::Leaf {
                value: right,
                cover: 5.0,
            },
        ])
    }

    #[test]
    fn test_random_forest_averages_normalized_leaves() {
        let forest = TreeEnsemble::random_forest(
            2,
            2,
            vec![
                stump(0, 0.0, vec![8.0, 2.0], vec![1.0, 3.0]),
                stump(1, 0.0, vec![1.0, 0.0], vec![0.0, 1.0]),
            ],
        );
        forest.validate().unwrap();
        let p = forest.predict_proba(&[-1.0, 1.0]).unwrap();
        assert!((p[0] - 0.4).abs() < 1e-12);
        assert!((p[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_boosting_sigmoid_margin() {
        let gb = TreeEnsemble::gradient_boosting(
            1,
            0.5,
            0.0,
            vec![stump(0, 0.0, vec![-2.0], vec![2.0])],
        );
        gb.validate().unwrap();
        let p = gb.predict_proba(&[1.0]).unwrap();
        assert!((p[1] - sigmoid(1.0)).abs() < 1e-12);
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_mismatches() {
        let forest = TreeEnsemble::random_forest(1, 2, vec![]);
        assert!(forest.validate().is_err());

        let forest =
            TreeEnsemble::random_forest(1, 2, vec![stump(0, 0.0, vec![1.0], vec![1.0])]);
        assert!(forest.validate().is_err());

        let forest = TreeEnsemble::random_forest(
            1,
            2,
            vec![stump(0, 0.0, vec![1.0, 0.0], vec![0.0, 1.0])],
        )
        .with_feature_names(vec!["a".into(), "b".into()]);
        assert!(forest.validate().is_err());
    }

    #[test]
    fn test_width_checked() {
        let forest = TreeEnsemble::random_forest(
            2,
            2,
            vec![stump(0, 0.0, vec![1.0, 0.0], vec![0.0, 1.0])],
        );
        assert!(matches!(
            forest.predict_proba(&[1.0]),
            Err(MlError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_serde_flattened_kind() {
        let json = r#"{
            "kind": "gradient_boosting", "learning_rate": 0.1, "base_score": -0.3,
            "n_features": 1, "n_classes": 2,
            "trees": [{"nodes": [{"node": "leaf", "value": [0.0], "cover": 1}]}]
        }"#;
        let gb: TreeEnsemble = serde_json::from_str(json).unwrap();
        assert_eq!(
            gb.kind,
            EnsembleKind::GradientBoosting {
                learning_rate: 0.1,
                base_score: -0.3
            }
        );
        gb.validate().unwrap();
    }
}
