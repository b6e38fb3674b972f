//! Classifier implementations: decision trees, tree ensembles, logistic regression.

pub mod ensemble;
pub mod logistic;
pub mod tree;

pub use ensemble::{EnsembleKind, TreeEnsemble};
pub use logistic::LogisticRegression;
pub use tree::{DecisionTree, TreeNode};
