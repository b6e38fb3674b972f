//! Exact path-dependent TreeSHAP for [`TreeEnsemble`] classifiers.
//!
//! Implements the polynomial-time algorithm of Lundberg et al., "Consistent
//! Individualized Feature Attribution for Tree Ensembles" (Algorithm 2). The
//! background distribution is the one implied by node covers, so no
//! reference data set is needed and the attributions satisfy
//! `sum(phi) + expected_value == model output` for every row.

use crate::algorithms::tree::goes_left;
use crate::algorithms::{DecisionTree, EnsembleKind, TreeEnsemble, TreeNode};
use crate::error::AttributionError;
use crate::interpretability::tensor::{AttributionTensor, Matrix};
use crate::pipeline::Classifier;

/// How multi-output attributions are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputLayout {
    /// One rows × features matrix per class.
    #[default]
    ClassMajor,
    /// A rows × features × classes tensor.
    Stacked,
    /// A classes × features matrix for exactly one row.
    ClassRows,
}

/// TreeSHAP explainer bound to one tree ensemble.
#[derive(Debug, Clone)]
pub struct TreeExplainer<'a> {
    ensemble: &'a TreeEnsemble,
    layout: OutputLayout,
}

impl<'a> TreeExplainer<'a> {
    /// Bind an explainer to `classifier`. Only tree ensembles can be
    /// explained, and only if they are structurally sound.
    pub fn new(classifier: &'a Classifier) -> Result<Self, AttributionError> {
        let ensemble = match classifier {
            Classifier::TreeEnsemble(e) => e,
            other => {
                return Err(AttributionError::ExplainerConstructionFailed(format!(
                    "'{}' is not a tree model",
                    other.name()
                )));
            }
        };
        ensemble
            .validate()
            .map_err(|e| AttributionError::ExplainerConstructionFailed(e.to_string()))?;
        Ok(Self {
            ensemble,
            layout: OutputLayout::default(),
        })
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn n_features(&self) -> usize {
        self.ensemble.n_features
    }

    /// Model output averaged over the cover-weighted background, per output.
    pub fn expected_value(&self) -> Vec<f64> {
        let mut out = vec![self.ensemble.base_output(); self.ensemble.n_outputs()];
        for tree in &self.ensemble.trees {
            for (o, v) in out.iter_mut().zip(self.tree_expectation(tree, 0)) {
                *o += v;
            }
        }
        out
    }

    /// SHAP values for each row.
    ///
    /// A forest yields one matrix per class, a stacked tensor or a single
    /// row's class-by-feature matrix, depending on the layout; a boosted model yields a single matrix in log-odds
    /// space.
    pub fn shap_values(&self, rows: &[Vec<f64>]) -> Result<AttributionTensor, AttributionError> {
        if rows.is_empty() {
            return Err(AttributionError::InvalidInput("no rows to explain".into()));
        }
        if self.layout == OutputLayout::ClassRows && rows.len() != 1 {
            return Err(AttributionError::InvalidInput(format!(
                "class-row layout explains one row, got {}",
                rows.len()
            )));
        }
        if let Some(row) = rows.iter().find(|r| r.len() != self.ensemble.n_features) {
            return Err(AttributionError::ShapeMismatch(format!(
                "classifier expects {} features, row has {}",
                self.ensemble.n_features,
                row.len()
            )));
        }

        // per row: [feature][output]
        let phis: Vec<Vec<Vec<f64>>> = rows.iter().map(|x| self.explain_row(x)).collect();

        Ok(match self.ensemble.kind {
            EnsembleKind::GradientBoosting { .. } => AttributionTensor::Matrix(
                phis.into_iter()
                    .map(|row| row.into_iter().map(|cell| cell[0]).collect())
                    .collect(),
            ),
            EnsembleKind::RandomForest => match self.layout {
                OutputLayout::Stacked => AttributionTensor::RowFeatureClass(phis),
                OutputLayout::ClassRows => AttributionTensor::ClassFeature(
                    (0..self.ensemble.n_outputs())
                        .map(|c| phis[0].iter().map(|cell| cell[c]).collect())
                        .collect(),
                ),
                OutputLayout::ClassMajor => {
                    let per_class: Vec<Matrix> = (0..self.ensemble.n_outputs())
                        .map(|c| {
                            phis.iter()
                                .map(|row| row.iter().map(|cell| cell[c]).collect())
                                .collect()
                        })
                        .collect();
                    AttributionTensor::PerClass(per_class)
                }
            },
        })
    }

    fn explain_row(&self, x: &[f64]) -> Vec<Vec<f64>> {
        let mut phi = vec![vec![0.0; self.ensemble.n_outputs()]; self.ensemble.n_features];
        for tree in &self.ensemble.trees {
            let mut walk = TreeWalk {
                ensemble: self.ensemble,
                tree,
                x,
                phi: &mut phi,
            };
            walk.recurse(0, Vec::with_capacity(tree.depth() + 2), 1.0, 1.0, None);
        }
        phi
    }

    fn tree_expectation(&self, tree: &DecisionTree, node: usize) -> Vec<f64> {
        match &tree.nodes[node] {
            TreeNode::Leaf { value, .. } => self.ensemble.scaled_leaf(value),
            TreeNode::Split {
                left, right, cover, ..
            } => {
                let wl = tree.nodes[*left].cover() / cover;
                let wr = tree.nodes[*right].cover() / cover;
                self.tree_expectation(tree, *left)
                    .into_iter()
                    .zip(self.tree_expectation(tree, *right))
                    .map(|(l, r)| wl * l + wr * r)
                    .collect()
            }
        }
    }
}

/// One element of the feature path from the root to the current node.
#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `None` for the placeholder element at the root.
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

struct TreeWalk<'t> {
    ensemble: &'t TreeEnsemble,
    tree: &'t DecisionTree,
    x: &'t [f64],
    phi: &'t mut Vec<Vec<f64>>,
}

impl TreeWalk<'_> {
    fn recurse(
        &mut self,
        node: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        extend_path(&mut path, zero_fraction, one_fraction, feature);
        let tree = self.tree;

        match &tree.nodes[node] {
            TreeNode::Leaf { value, .. } => {
                let leaf = self.ensemble.scaled_leaf(value);
                for i in 1..path.len() {
                    let el = path[i];
                    let Some(f) = el.feature else { continue };
                    let w = unwound_path_sum(&path, i) * (el.one_fraction - el.zero_fraction);
                    for (p, v) in self.phi[f].iter_mut().zip(&leaf) {
                        *p += w * v;
                    }
                }
            }
            TreeNode::Split {
                feature: split,
                threshold,
                left,
                right,
                cover,
            } => {
                let (hot, cold) = if goes_left(self.x[*split], *threshold) {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                let hot_fraction = tree.nodes[hot].cover() / cover;
                let cold_fraction = tree.nodes[cold].cover() / cover;
                self.recurse(
                    hot,
                    path.clone(),
                    incoming_zero * hot_fraction,
                    incoming_one,
                    Some(*split),
                );
                self.recurse(
                    cold,
                    path,
                    incoming_zero * cold_fraction,
                    0.0,
                    Some(*split),
                );
            }
        }
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].pweight += one_fraction * path[i].pweight * (fi + 1.0) / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - fi) / (d + 1.0);
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for j in (0..depth).rev() {
        let fj = j as f64;
        if one_fraction != 0.0 {
            let tmp = path[j].pweight;
            path[j].pweight = next_one_portion * (d + 1.0) / ((fj + 1.0) * one_fraction);
            next_one_portion = tmp - path[j].pweight * zero_fraction * (d - fj) / (d + 1.0);
        } else {
            path[j].pweight = path[j].pweight * (d + 1.0) / (zero_fraction * (d - fj));
        }
    }

    // Shift the remaining elements down; pweights stay where they are.
    for j in index..depth {
        path[j].feature = path[j + 1].feature;
        path[j].zero_fraction = path[j + 1].zero_fraction;
        path[j].one_fraction = path[j + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed,
/// without modifying the path.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for j in (0..depth).rev() {
        let fj = j as f64;
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((fj + 1.0) * one_fraction);
            total += tmp;
            next_one_portion = path[j].pweight - tmp * zero_fraction * ((d - fj) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[j].pweight / zero_fraction) / ((d - fj) / (d + 1.0));
        }
    }
    total
}
