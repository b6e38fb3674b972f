//! Feature rows and preprocessing transforms.

pub mod row;
pub mod transforms;

pub use row::{FeatureRow, FeatureValue, NumericRow};
pub use transforms::{
    CategoricalMethod, ColumnSpec, ColumnTransformer, FeatureTransformType, NumericalMethod,
    Remainder,
};
