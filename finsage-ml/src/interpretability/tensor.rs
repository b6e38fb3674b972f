//! Attribution tensor layouts and their normalization to a 2-D slice.

use crate::error::AttributionError;

/// Rows × features.
pub type Matrix = Vec<Vec<f64>>;

/// Raw explainer output, in one of the layouts explainers commonly return.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributionTensor {
    /// Class-major: one rows × features matrix per class.
    PerClass(Vec<Matrix>),
    /// Rows × features × classes.
    RowFeatureClass(Vec<Vec<Vec<f64>>>),
    /// Classes × features for one explained row.
    ClassFeature(Matrix),
    /// Rows × features for a single designated output.
    Matrix(Matrix),
}

impl AttributionTensor {
    pub fn layout(&self) -> &'static str {
        match self {
            Self::PerClass(_) => "per_class",
            Self::RowFeatureClass(_) => "row_feature_class",
            Self::ClassFeature(_) => "class_feature",
            Self::Matrix(_) => "matrix",
        }
    }
}

/// Reduce any [`AttributionTensor`] to the rows × features slice of the
/// class at `class_index`.
///
/// A single-class result (a one-element class list, a single class row, or a
/// trailing class axis of length one) is taken to be the designated output
/// already. A [`AttributionTensor::Matrix`] carries one output and is kept. The result
/// always has at least one row and every row the same width.
pub fn normalize_attributions(
    tensor: AttributionTensor,
    class_index: usize,
) -> Result<Matrix, AttributionError> {
    let matrix = match tensor {
        AttributionTensor::PerClass(mut classes) => match classes.len() {
            0 => return Err(shape("explainer returned an empty class list")),
            1 => classes.swap_remove(0),
            n if class_index < n => classes.swap_remove(class_index),
            n => {
                return Err(shape(format!(
                    "class index {class_index} out of range for {n} classes"
                )));
            }
        },
        AttributionTensor::RowFeatureClass(rows) => {
            let n_classes = rows
                .iter()
                .flatten()
                .map(Vec::len)
                .next()
                .ok_or_else(|| shape("3-D attribution tensor is empty"))?;
            if rows.iter().flatten().any(|cell| cell.len() != n_classes) {
                return Err(shape("3-D attribution tensor has a ragged class axis"));
            }
            let index = match n_classes {
                1 => 0,
                n if class_index < n => class_index,
                n => {
                    return Err(shape(format!(
                        "class index {class_index} out of range for {n} classes"
                    )));
                }
            };
            rows.into_iter()
                .map(|row| row.into_iter().map(|cell| cell[index]).collect())
                .collect()
        }
        AttributionTensor::ClassFeature(mut classes) => {
            let row = match classes.len() {
                0 => return Err(shape("class-by-feature attributions are empty")),
                1 => classes.swap_remove(0),
                n if class_index < n => classes.swap_remove(class_index),
                n => {
                    return Err(shape(format!(
                        "class index {class_index} out of range for {n} class rows"
                    )));
                }
            };
            vec![row]
        }
        AttributionTensor::Matrix(matrix) => matrix,
    };
    check_rectangular(&matrix)?;
    Ok(matrix)
}

fn check_rectangular(matrix: &Matrix) -> Result<(), AttributionError> {
    let width = matrix
        .first()
        .map(Vec::len)
        .ok_or_else(|| shape("attribution slice has no rows"))?;
    if matrix.iter().any(|row| row.len() != width) {
        return Err(shape("attribution slice has rows of different widths"));
    }
    Ok(())
}

fn shape(msg: impl Into<String>) -> AttributionError {
    AttributionError::ShapeMismatch(msg.into())
}
