//! Error types for the finsage-ml crate.

use thiserror::Error;

/// Error type for model loading, transformation and prediction.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Transform error: {0}")]
    Transform(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Why a feature-attribution extraction produced no ranking.
///
/// Attribution is advisory: callers are expected to log the error, show it
/// to the user if appropriate, and carry on with an empty ranking.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttributionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No classifier found in the pipeline")]
    NoClassifierFound,

    #[error("Explainer construction failed: {0}")]
    ExplainerConstructionFailed(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Unexpected attribution failure: {0}")]
    Unexpected(String),
}

impl AttributionError {
    /// Stable short name for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NoClassifierFound => "no_classifier_found",
            Self::ExplainerConstructionFailed(_) => "explainer_construction_failed",
            Self::ShapeMismatch(_) => "shape_mismatch",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

impl From<MlError> for AttributionError {
    fn from(err: MlError) -> Self {
        match err {
            MlError::InvalidInput(msg) | MlError::Transform(msg) => Self::InvalidInput(msg),
            MlError::Model(msg) => Self::ExplainerConstructionFailed(msg),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ml_error_display() {
        assert_eq!(
            MlError::model("empty ensemble").to_string(),
            "Model error: empty ensemble"
        );
        assert_eq!(
            MlError::transform("unknown category 'X'").to_string(),
            "Transform error: unknown category 'X'"
        );
    }

    #[test]
    fn test_attribution_error_kinds() {
        assert_eq!(AttributionError::NoClassifierFound.kind(), "no_classifier_found");
        assert_eq!(
            AttributionError::ShapeMismatch("3 vs 4".into()).to_string(),
            "Shape mismatch: 3 vs 4"
        );
    }

    #[test]
    fn test_ml_error_converts_to_attribution_error() {
        let err: AttributionError = MlError::transform("missing column 'age'").into();
        assert!(matches!(err, AttributionError::InvalidInput(_)));
        let err: AttributionError = MlError::NotFound("x".into()).into();
        assert!(matches!(err, AttributionError::Unexpected(_)));
    }
}
