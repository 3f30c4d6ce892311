//! Feature engineering
//!
//! Converts inventory records into fixed-schema numeric vectors. The schema
//! (ordered numeric features plus categorical vocabularies) travels with
//! every model snapshot so training and scoring always agree on layout.

mod builder;
mod schema;

pub use builder::{linear_regression_slope, FeatureBuilder, FeatureSet};
pub use schema::{
    CategoricalField, FeatureSchema, FeatureVector, CATEGORY_FIELD, FEATURE_SCHEMA_VERSION,
    HISTORY_FEATURES, LOCATION_FIELD, NUMERIC_FEATURES, STATUS_FIELD, UNKNOWN_BUCKET,
};
