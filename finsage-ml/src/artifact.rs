//! JSON model artifacts.

use crate::error::MlError;
use crate::pipeline::Model;
use std::path::Path;
use tracing::{debug, info};

/// Load and validate a model artifact.
pub fn load_model(path: &Path) -> Result<Model, MlError> {
    if !path.exists() {
        return Err(MlError::NotFound(format!(
            "model artifact {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;
    let model: Model = serde_json::from_str(&text)?;
    model.validate()?;

    let classifier = model.classifier().map(|c| c.name()).unwrap_or("none");
    info!(path = %path.display(), classifier, "Loaded model artifact");
    Ok(model)
}

/// Write a model artifact as pretty-printed JSON.
pub fn save_model(model: &Model, path: &Path) -> Result<(), MlError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(model)?)?;
    debug!(path = %path.display(), "Saved model artifact");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{DecisionTree, TreeEnsemble, TreeNode};
    use crate::pipeline::Classifier;
    use tempfile::TempDir;

    fn model() -> Model {
        Model::Classifier(Classifier::TreeEnsemble(TreeEnsemble::random_forest(
            1,
            2,
            vec![DecisionTree::new(vec![TreeNode::Leaf {
                value: vec![1.0, 1.0],
                cover: 2.0,
            }])],
        )))
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("loan.json");
        save_model(&model(), &path).unwrap();
        assert_eq!(load_model(&path).unwrap(), model());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_model(&dir.path().join("nope.json")),
            Err(MlError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_artifacts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_model(&path), Err(MlError::Serde(_))));

        let mut broken = model();
        if let Model::Classifier(Classifier::TreeEnsemble(e)) = &mut broken {
            e.n_classes = 3;
        }
        save_model(&broken, &path).unwrap();
        assert!(matches!(load_model(&path), Err(MlError::Model(_))));
    }
}
