//! Versioned feature schema and fixed-order feature vectors

use crate::models::{ToolRecord, ToolStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Layout version of the numeric feature block
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Bucket that absorbs categorical values outside the vocabulary
pub const UNKNOWN_BUCKET: &str = "unknown";

/// Numeric features in schema order
pub const NUMERIC_FEATURES: [&str; 14] = [
    "usage_hours",
    "days_since_purchase",
    "days_since_last_maintenance",
    "total_usage_hours",
    "avg_usage_hours",
    "usage_count",
    "usage_intensity",
    "maintenance_count",
    "maintenance_frequency",
    "total_maintenance_cost",
    "avg_maintenance_cost",
    "cost_per_hour",
    "condition_trend",
    "avg_condition_recovery",
];

/// Numeric features derived purely from usage and maintenance history
pub const HISTORY_FEATURES: [&str; 10] = [
    "total_usage_hours",
    "avg_usage_hours",
    "usage_count",
    "maintenance_count",
    "maintenance_frequency",
    "total_maintenance_cost",
    "avg_maintenance_cost",
    "cost_per_hour",
    "condition_trend",
    "avg_condition_recovery",
];

pub const CATEGORY_FIELD: &str = "category";
pub const LOCATION_FIELD: &str = "location";
pub const STATUS_FIELD: &str = "status";

/// A one-hot encoded categorical field with a fixed vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalField {
    pub name: String,
    pub vocabulary: Vec<String>,
    /// Whether unseen values map to an `unknown` column
    pub has_unknown: bool,
}

impl CategoricalField {
    pub fn new(name: impl Into<String>, vocabulary: Vec<String>) -> Self {
        Self {
            name: name.into(),
            vocabulary,
            has_unknown: true,
        }
    }

    /// Number of one-hot columns this field occupies
    pub fn width(&self) -> usize {
        self.vocabulary.len() + usize::from(self.has_unknown)
    }

    fn column_names(&self) -> impl Iterator<Item = String> + '_ {
        let unknown = self
            .has_unknown
            .then(|| format!("{}={}", self.name, UNKNOWN_BUCKET));
        self.vocabulary
            .iter()
            .map(move |v| format!("{}={}", self.name, v))
            .chain(unknown)
    }

    /// Column offset within this field for `value`, or None when the value
    /// has no bucket at all
    pub fn encode(&self, value: Option<&str>) -> Option<usize> {
        let known = value.and_then(|v| self.vocabulary.iter().position(|t| t == v.trim()));
        match known {
            Some(idx) => Some(idx),
            None if self.has_unknown => Some(self.vocabulary.len()),
            None => None,
        }
    }
}

/// Ordered feature definitions a snapshot was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub numeric: Vec<String>,
    pub categorical: Vec<CategoricalField>,
}

impl FeatureSchema {
    /// Build the schema for a training population, capturing the categorical
    /// vocabularies seen in `tools`
    pub fn from_tools(tools: &[ToolRecord]) -> Self {
        let categories = vocabulary(tools.iter().map(|t| t.category.as_str()));
        let locations = vocabulary(tools.iter().map(|t| t.location.as_str()));
        let statuses = ToolStatus::ALL.iter().map(|s| s.as_str().to_string()).collect();

        Self {
            version: FEATURE_SCHEMA_VERSION,
            numeric: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical: vec![
                CategoricalField::new(CATEGORY_FIELD, categories),
                CategoricalField::new(LOCATION_FIELD, locations),
                CategoricalField::new(STATUS_FIELD, statuses),
            ],
        }
    }

    /// Column names in vector order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric.clone();
        for field in &self.categorical {
            names.extend(field.column_names());
        }
        names
    }

    pub fn width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|f| f.width()).sum::<usize>()
    }

    pub fn is_compatible(&self) -> bool {
        self.version == FEATURE_SCHEMA_VERSION
    }
}

fn vocabulary<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != UNKNOWN_BUCKET)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fixed-order numeric features for one tool
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub tool_code: String,
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub(crate) fn new(tool_code: String, names: Arc<[String]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            tool_code,
            names,
            values,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.index_of(name).map(|i| self.values[i])
    }

    /// Copy of this vector with one feature replaced
    pub fn with_value(&self, name: &str, value: f64) -> Option<Self> {
        let idx = self.index_of(name)?;
        let mut next = self.clone();
        next.values[idx] = value;
        Some(next)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
