//! Prediction pipelines built from explicitly tagged stages.
//!
//! A [`Model`] is either a bare [`Classifier`] or a [`Pipeline`] of named
//! stages. Every stage carries its [`StageKind`], so callers locate the
//! preprocessing and classification steps by tag rather than by probing what
//! a stage happens to be able to do.

use crate::algorithms::{LogisticRegression, TreeEnsemble};
use crate::error::MlError;
use crate::features::{ColumnTransformer, FeatureRow, NumericRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A fitted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Classifier {
    TreeEnsemble(TreeEnsemble),
    Logistic(LogisticRegression),
}

impl Classifier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TreeEnsemble(_) => "tree_ensemble",
            Self::Logistic(_) => "logistic",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::TreeEnsemble(e) => e.n_features,
            Self::Logistic(l) => l.n_features(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Self::TreeEnsemble(e) => e.n_classes,
            Self::Logistic(_) => 2,
        }
    }

    pub fn validate(&self) -> Result<(), MlError> {
        match self {
            Self::TreeEnsemble(e) => e.validate(),
            Self::Logistic(l) => l.validate(),
        }
    }

    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        match self {
            Self::TreeEnsemble(e) => e.predict_proba(x),
            Self::Logistic(l) => l.predict_proba(x),
        }
    }
}

/// The role a stage plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Transform,
    Classifier,
    Other,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform => write!(f, "transform"),
            Self::Classifier => write!(f, "classifier"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    Transform(ColumnTransformer),
    Classifier(Classifier),
    /// A step this crate does not execute (e.g. a fitted sampler that only
    /// matters at training time).
    Other { description: String },
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Transform(_) => StageKind::Transform,
            Self::Classifier(_) => StageKind::Classifier,
            Self::Other { .. } => StageKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStage {
    pub name: String,
    pub step: Stage,
}

impl NamedStage {
    pub fn new(name: impl Into<String>, step: Stage) -> Self {
        Self {
            name: name.into(),
            step,
        }
    }
}

/// An ordered sequence of named stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<NamedStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<NamedStage>) -> Self {
        Self { stages }
    }

    pub fn with_stage(mut self, name: impl Into<String>, step: Stage) -> Self {
        self.stages.push(NamedStage::new(name, step));
        self
    }

    /// The first classifier-tagged stage, in definition order.
    pub fn classifier(&self) -> Option<&Classifier> {
        self.stages.iter().find_map(|s| match &s.step {
            Stage::Classifier(c) => Some(c),
            _ => None,
        })
    }

    /// The first transform-tagged stage, in definition order.
    pub fn transformer(&self) -> Option<&ColumnTransformer> {
        self.stages.iter().find_map(|s| match &s.step {
            Stage::Transform(t) => Some(t),
            _ => None,
        })
    }

    fn count(&self, kind: StageKind) -> usize {
        self.stages.iter().filter(|s| s.step.kind() == kind).count()
    }
}

/// A loadable model: a bare classifier or a composite pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Model {
    Pipeline(Pipeline),
    Classifier(Classifier),
}

impl Model {
    /// The classifier to predict with and to explain.
    pub fn classifier(&self) -> Option<&Classifier> {
        match self {
            Self::Pipeline(p) => p.classifier(),
            Self::Classifier(c) => Some(c),
        }
    }

    /// The preprocessing stage applied before the classifier, if any.
    ///
    /// Only the first transform stage is recognized; later ones are ignored.
    pub fn transformer(&self) -> Option<&ColumnTransformer> {
        match self {
            Self::Pipeline(p) => p.transformer(),
            Self::Classifier(_) => None,
        }
    }

    /// Turn a raw row into the numeric row the classifier consumes.
    pub fn prepare_input(&self, row: &FeatureRow) -> Result<NumericRow, MlError> {
        match self.transformer() {
            Some(t) => t.transform(row),
            None => row.to_numeric(),
        }
    }

    pub fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, MlError> {
        let classifier = self
            .classifier()
            .ok_or_else(|| MlError::model("model has no classifier stage"))?;
        let input = self.prepare_input(row)?;
        classifier.predict_proba(&input.values)
    }

    /// Index of the most probable class (ties go to the lower index).
    pub fn predict(&self, row: &FeatureRow) -> Result<usize, MlError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Check that the model can predict. Duplicate stage kinds are allowed;
    /// only the first of each is used.
    pub fn validate(&self) -> Result<(), MlError> {
        if let Self::Pipeline(p) = self {
            for kind in [StageKind::Transform, StageKind::Classifier] {
                let n = p.count(kind);
                if n > 1 {
                    warn!(stage_kind = %kind, count = n, "Pipeline has several stages of one kind; only the first is used");
                }
            }
        }
        let classifier = self
            .classifier()
            .ok_or_else(|| MlError::model("model has no classifier stage"))?;
        classifier.validate()?;

        if let (Some(transformer), Classifier::TreeEnsemble(ensemble)) =
            (self.transformer(), classifier)
            && let Some(names) = &ensemble.feature_names
        {
            let produced = transformer.feature_names_out(std::iter::empty());
            if transformer.remainder == crate::features::Remainder::Drop && produced != *names {
                return Err(MlError::model(format!(
                    "transform produces columns {produced:?} but the classifier was fitted on {names:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{DecisionTree, TreeNode};
    use crate::features::{ColumnSpec, FeatureTransformType};

    fn forest() -> Classifier {
        Classifier::TreeEnsemble(TreeEnsemble::random_forest(
            1,
            2,
            vec![DecisionTree::new(vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 40.0,
                    left: 1,
                    right: 2,
                    cover: 4.0,
                },
                TreeNode::Leaf {
                    value: vec![1.0, 3.0],
                    cover: 2.0,
                },
                TreeNode::Leaf {
                    value: vec![2.0, 0.0],
                    cover: 2.0,
                },
            ])],
        ))
    }

    fn scale_income() -> ColumnTransformer {
        ColumnTransformer::new(vec![ColumnSpec {
            name: "dti_ratio".into(),
            transform: FeatureTransformType::Passthrough,
        }])
    }

    #[test]
    fn test_first_stage_of_each_kind_is_used() {
        let pipeline = Pipeline::default()
            .with_stage(
                "sampler",
                Stage::Other {
                    description: "smote".into(),
                },
            )
            .with_stage("preprocessor", Stage::Transform(scale_income()))
            .with_stage("classifier", Stage::Classifier(forest()))
            .with_stage(
                "fallback",
                Stage::Classifier(Classifier::Logistic(LogisticRegression::new(vec![1.0], 0.0))),
            );
        let model = Model::Pipeline(pipeline);
        assert_eq!(model.classifier().map(Classifier::name), Some("tree_ensemble"));
        assert!(model.transformer().is_some());
        model.validate().unwrap();

        let row = FeatureRow::new().with("person_age", 30.0).with("dti_ratio", 25.0);
        assert_eq!(model.predict(&row).unwrap(), 1);
        let row = FeatureRow::new().with("dti_ratio", 55.0);
        assert_eq!(model.predict(&row).unwrap(), 0);
    }

    #[test]
    fn test_bare_classifier_uses_numeric_view() {
        let model = Model::Classifier(forest());
        assert!(model.transformer().is_none());
        let proba = model
            .predict_proba(&FeatureRow::new().with("dti_ratio", 10.0))
            .unwrap();
        assert_eq!(proba, vec![0.25, 0.75]);
    }

    #[test]
    fn test_validate_requires_classifier() {
        let model = Model::Pipeline(
            Pipeline::default().with_stage("preprocessor", Stage::Transform(scale_income())),
        );
        assert!(matches!(model.validate(), Err(MlError::Model(_))));
    }

    #[test]
    fn test_stage_kinds() {
        assert_eq!(Stage::Transform(scale_income()).kind(), StageKind::Transform);
        assert_eq!(Stage::Classifier(forest()).kind(), StageKind::Classifier);
        assert_eq!(StageKind::Other.to_string(), "other");
    }

    #[test]
    fn test_model_serde_round_trip_preserves_tags() {
        let model = Model::Pipeline(
            Pipeline::default()
                .with_stage("preprocessor", Stage::Transform(scale_income()))
                .with_stage("classifier", Stage::Classifier(forest())),
        );
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["type"], "pipeline");
        assert_eq!(json["stages"][1]["step"]["type"], "classifier");
        assert_eq!(json["stages"][1]["step"]["algorithm"], "tree_ensemble");
        assert_eq!(json["stages"][1]["step"]["kind"], "random_forest");
        let back: Model = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }
}
