//! Binary logistic regression.

use crate::algorithms::ensemble::sigmoid;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn validate(&self) -> Result<(), MlError> {
        if self.coefficients.is_empty() {
            return Err(MlError::model("logistic regression has no coefficients"));
        }
        if self.coefficients.iter().chain([&self.intercept]).any(|c| !c.is_finite()) {
            return Err(MlError::model("logistic regression weights must be finite"));
        }
        Ok(())
    }

    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        if x.len() != self.coefficients.len() {
            return Err(MlError::invalid_input(format!(
                "classifier expects {} features, row has {}",
                self.coefficients.len(),
                x.len()
            )));
        }
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(w, v)| w * v)
                .sum::<f64>();
        let p = sigmoid(z);
        Ok(vec![1.0 - p, p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_proba() {
        let model = LogisticRegression::new(vec![1.0, -1.0], 0.0);
        let p = model.predict_proba(&[2.0, 2.0]).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!(model.predict_proba(&[1.0]).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(LogisticRegression::new(vec![], 0.0).validate().is_err());
        assert!(LogisticRegression::new(vec![f64::NAN], 0.0).validate().is_err());
        assert!(LogisticRegression::new(vec![0.3], 1.0).validate().is_ok());
    }
}
