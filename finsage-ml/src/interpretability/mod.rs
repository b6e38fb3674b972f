//! Interpretability: TreeSHAP attributions, tensor normalization and the
//! ranked feature-importance report.

pub mod extractor;
pub mod features;
pub mod tensor;
pub mod tree_shap;

pub use extractor::{AT_RISK_CLASS, extract, extract_or_empty};
pub use features::FeatureImportance;
pub use tensor::{AttributionTensor, Matrix, normalize_attributions};
pub use tree_shap::{OutputLayout, TreeExplainer};
