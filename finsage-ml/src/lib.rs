//! # FinSage ML
//!
//! Loan-approval models and their explanations:
//!
//! - **Features**: ordered feature rows and fitted column transforms
//! - **Algorithms**: decision trees, random forests, gradient boosting, logistic regression
//! - **Pipeline**: models built from explicitly tagged stages
//! - **Interpretability**: TreeSHAP, attribution-tensor normalization and the
//!   best-effort attribution extractor
//! - **Application**: applicant normalization, credit ratios and advisories
//! - **Advisor**: LLM-generated insights and chat with a fallback chain

pub mod advisor;
pub mod algorithms;
pub mod application;
pub mod artifact;
pub mod error;
pub mod features;
pub mod interpretability;
pub mod pipeline;

pub use advisor::{Advice, AdviceSource, AdvisorSettings, LoanAdvisor};
pub use application::{
    Advisory, ApplicantProfile, Decision, HomeOwnership, LoanApplication, LoanGrade, LoanIntent,
    PreparedApplication, prepare,
};
pub use artifact::{load_model, save_model};
pub use error::{AttributionError, MlError};
pub use features::{FeatureRow, FeatureValue, NumericRow};
pub use interpretability::{
    AT_RISK_CLASS, AttributionTensor, FeatureImportance, TreeExplainer, extract, extract_or_empty,
    normalize_attributions,
};
pub use pipeline::{Classifier, Model, NamedStage, Pipeline, Stage, StageKind};
