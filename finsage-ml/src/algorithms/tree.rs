//! Binary decision trees with per-node training cover.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Relative tolerance when checking that a split's cover equals the sum of
/// its children's covers.
const COVER_TOLERANCE: f64 = 1e-6;

/// One node of a [`DecisionTree`].
///
/// `cover` is the (possibly weighted) number of training samples that
/// reached the node; TreeSHAP uses it to weight unseen branches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    /// Samples with `x[feature] <= threshold` go left, all others
    /// (including NaN) go right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf { value: Vec<f64>, cover: f64 },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// A tree stored as a flat node array with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Structural checks: every node reachable from the root exactly once,
    /// children stored after their parent, feature indices in range, covers
    /// positive and consistent, leaf outputs of the expected width.
    pub fn validate(&self, n_features: usize, n_outputs: usize) -> Result<(), MlError> {
        if self.nodes.is_empty() {
            return Err(MlError::model("tree has no nodes"));
        }
        let mut parents = vec![0usize; self.nodes.len()];

        for (i, node) in self.nodes.iter().enumerate() {
            let cover = node.cover();
            if !cover.is_finite() || cover <= 0.0 {
                return Err(MlError::model(format!("node {i}: cover must be positive, got {cover}")));
            }
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    cover,
                } => {
                    if *feature >= n_features {
                        return Err(MlError::model(format!(
                            "node {i}: feature index {feature} out of range for {n_features} features"
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(MlError::model(format!("node {i}: threshold is NaN")));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(MlError::model(format!(
                                "node {i}: child index {child} is out of order"
                            )));
                        }
                        parents[child] += 1;
                    }
                    let children = self.nodes[*left].cover() + self.nodes[*right].cover();
                    if (children - cover).abs() > COVER_TOLERANCE * cover.max(1.0) {
                        return Err(MlError::model(format!(
                            "node {i}: cover {cover} does not match children total {children}"
                        )));
                    }
                }
                TreeNode::Leaf { value, .. } => {
                    if value.len() != n_outputs {
                        return Err(MlError::model(format!(
                            "node {i}: leaf has {} outputs, expected {n_outputs}",
                            value.len()
                        )));
                    }
                    if value.iter().any(|v| !v.is_finite()) {
                        return Err(MlError::model(format!("node {i}: leaf value is not finite")));
                    }
                }
            }
        }

        if let Some(orphan) = (1..self.nodes.len()).find(|&i| parents[i] != 1) {
            return Err(MlError::model(format!(
                "node {orphan} has {} parents, expected exactly one",
                parents[orphan]
            )));
        }
        Ok(())
    }

    /// Index of the leaf `x` falls into.
    pub fn leaf_index(&self, x: &[f64]) -> usize {
        let mut i = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = &self.nodes[i]
        {
            i = if goes_left(x[*feature], *threshold) {
                *left
            } else {
                *right
            };
        }
        i
    }

    /// Raw leaf output for `x`.
    pub fn predict_leaf(&self, x: &[f64]) -> &[f64] {
        match &self.nodes[self.leaf_index(x)] {
            TreeNode::Leaf { value, .. } => value.as_slice(),
            TreeNode::Split { .. } => &[],
        }
    }

    pub fn root_cover(&self) -> f64 {
        self.nodes.first().map(TreeNode::cover).unwrap_or(0.0)
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], i: usize) -> usize {
            match &nodes[i] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }
}

pub(crate) fn goes_left(value: f64, threshold: f64) -> bool {
    value <= threshold
}
