//! Feature construction from inventory records
//!
//! Turns tool, usage and maintenance records into fixed-schema feature
//! vectors. Features include usage intensity, maintenance frequency and
//! cost, condition trend across maintenance events, and one-hot encoded
//! categories.

use super::schema::{FeatureSchema, FeatureVector, CATEGORY_FIELD, LOCATION_FIELD, STATUS_FIELD};
use crate::error::{EngineError, EngineResult};
use crate::models::{MaintenanceRecord, ToolRecord, UsageRecord};
use crate::predictor::{MAX_CONDITION, MIN_CONDITION};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Feature vectors for a batch of tools plus the tools that were rejected
#[derive(Debug, Default)]
pub struct FeatureSet {
    pub vectors: BTreeMap<String, FeatureVector>,
    pub rejected: Vec<(String, EngineError)>,
}

/// Builds feature vectors bound to one schema and one reference date
pub struct FeatureBuilder {
    schema: FeatureSchema,
    names: Arc<[String]>,
    as_of: NaiveDate,
}

/// Per-tool aggregates feeding the numeric features
#[derive(Debug, Default)]
struct ToolStats {
    usage_hours: f64,
    days_since_purchase: f64,
    days_since_last_maintenance: f64,
    total_usage_hours: f64,
    usage_count: f64,
    maintenance_count: f64,
    total_maintenance_cost: f64,
    condition_trend: f64,
    avg_condition_recovery: f64,
}

impl FeatureBuilder {
    pub fn new(schema: FeatureSchema, as_of: NaiveDate) -> Self {
        let names: Arc<[String]> = schema.feature_names().into();
        Self {
            schema,
            names,
            as_of,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Build one vector per tool.
    ///
    /// Tools without history get zeroed history features. A tool whose
    /// categorical values have no bucket in the schema is rejected with
    /// `SchemaMismatch`; the rest of the batch is still built.
    pub fn build(
        &self,
        tools: &[ToolRecord],
        usage_history: &[UsageRecord],
        maintenance_history: &[MaintenanceRecord],
    ) -> EngineResult<FeatureSet> {
        if tools.is_empty() {
            return Err(EngineError::InvalidInput(
                "feature construction needs at least one tool".to_string(),
            ));
        }

        let mut usage_by_tool: HashMap<&str, Vec<&UsageRecord>> = HashMap::new();
        for record in usage_history {
            usage_by_tool
                .entry(record.tool_code.as_str())
                .or_default()
                .push(record);
        }
        let mut maintenance_by_tool: HashMap<&str, Vec<&MaintenanceRecord>> = HashMap::new();
        for record in maintenance_history {
            maintenance_by_tool
                .entry(record.tool_code.as_str())
                .or_default()
                .push(record);
        }

        let mut set = FeatureSet::default();
        for tool in tools {
            let code = tool.tool_code.as_str();
            let usage = usage_by_tool.get(code).map(Vec::as_slice).unwrap_or(&[]);
            let maintenance = maintenance_by_tool.get(code).map(Vec::as_slice).unwrap_or(&[]);

            match self.build_one(tool, usage, maintenance) {
                Ok(vector) => {
                    if set.vectors.insert(tool.tool_code.clone(), vector).is_some() {
                        warn!(tool_code = %code, "Duplicate tool record, keeping the last one");
                    }
                }
                Err(e) => {
                    warn!(tool_code = %code, error = %e, "Skipping tool during feature construction");
                    set.rejected.push((tool.tool_code.clone(), e));
                }
            }
        }

        debug!(
            built = set.vectors.len(),
            rejected = set.rejected.len(),
            "Feature construction completed"
        );
        Ok(set)
    }

    fn build_one(
        &self,
        tool: &ToolRecord,
        usage: &[&UsageRecord],
        maintenance: &[&MaintenanceRecord],
    ) -> EngineResult<FeatureVector> {
        let stats = self.tool_stats(tool, usage, maintenance);
        let mut values = Vec::with_capacity(self.names.len());

        for name in &self.schema.numeric {
            let value = numeric_feature(name, &stats);
            values.push(if value.is_finite() { value } else { 0.0 });
        }

        for field in &self.schema.categorical {
            let raw = match field.name.as_str() {
                CATEGORY_FIELD => Some(tool.category.as_str()),
                LOCATION_FIELD => Some(tool.location.as_str()),
                STATUS_FIELD => Some(tool.status.as_str()),
                _ => None,
            };
            let offset = field.encode(raw).ok_or_else(|| EngineError::SchemaMismatch {
                tool_code: tool.tool_code.clone(),
                field: field.name.clone(),
                value: raw.unwrap_or("<missing>").to_string(),
            })?;
            let start = values.len();
            values.resize(start + field.width(), 0.0);
            values[start + offset] = 1.0;
        }

        Ok(FeatureVector::new(
            tool.tool_code.clone(),
            Arc::clone(&self.names),
            values,
        ))
    }

    fn tool_stats(
        &self,
        tool: &ToolRecord,
        usage: &[&UsageRecord],
        maintenance: &[&MaintenanceRecord],
    ) -> ToolStats {
        let durations: Vec<f64> = usage.iter().filter_map(|u| u.duration_hours()).collect();

        let mut events: Vec<&MaintenanceRecord> = maintenance.to_vec();
        events.sort_by_key(|m| m.maintenance_date);

        let last_maintenance = events
            .last()
            .map(|m| m.maintenance_date)
            .into_iter()
            .chain(tool.last_maintenance_date)
            .max();

        let recoveries: Vec<f64> = events
            .iter()
            .filter_map(|m| {
                Some(condition_reading(m.condition_after)? - condition_reading(m.condition_before)?)
            })
            .collect();

        ToolStats {
            usage_hours: tool.usage_hours.max(0.0),
            days_since_purchase: self.days_since(tool.purchase_date),
            days_since_last_maintenance: self.days_since(last_maintenance),
            total_usage_hours: durations.iter().sum(),
            usage_count: durations.len() as f64,
            maintenance_count: events.len() as f64,
            total_maintenance_cost: events.iter().map(|m| m.cost.max(0.0)).sum(),
            condition_trend: condition_trend(&events),
            avg_condition_recovery: mean(&recoveries),
        }
    }

    fn days_since(&self, date: Option<NaiveDate>) -> f64 {
        date.map(|d| (self.as_of - d).num_days().max(0) as f64)
            .unwrap_or(0.0)
    }
}

fn numeric_feature(name: &str, s: &ToolStats) -> f64 {
    match name {
        "usage_hours" => s.usage_hours,
        "days_since_purchase" => s.days_since_purchase,
        "days_since_last_maintenance" => s.days_since_last_maintenance,
        "total_usage_hours" => s.total_usage_hours,
        "avg_usage_hours" => ratio(s.total_usage_hours, s.usage_count),
        "usage_count" => s.usage_count,
        "usage_intensity" => ratio(s.usage_hours, s.days_since_purchase),
        "maintenance_count" => s.maintenance_count,
        "maintenance_frequency" => ratio(s.maintenance_count, s.days_since_purchase),
        "total_maintenance_cost" => s.total_maintenance_cost,
        "avg_maintenance_cost" => ratio(s.total_maintenance_cost, s.maintenance_count),
        "cost_per_hour" => s.total_maintenance_cost / (s.usage_hours + 1.0),
        "condition_trend" => s.condition_trend,
        "avg_condition_recovery" => s.avg_condition_recovery,
        // numeric features never fail
        _ => 0.0,
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// A recorded condition score, kept within the condition scale
fn condition_reading(value: Option<f64>) -> Option<f64> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(MIN_CONDITION, MAX_CONDITION))
}

/// Slope of the chronological before/after condition readings; zero with
/// fewer than two maintenance events
fn condition_trend(events: &[&MaintenanceRecord]) -> f64 {
    if events.len() < 2 {
        return 0.0;
    }
    let readings: Vec<f64> = events
        .iter()
        .flat_map(|m| [m.condition_before, m.condition_after])
        .filter_map(condition_reading)
        .collect();
    linear_regression_slope(&readings)
}

/// Calculate linear regression slope for trend detection
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}
