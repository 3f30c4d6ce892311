//! Risk scoring and priority assignment
//!
//! Blends the regressor's gradual-wear estimate with the anomaly score into
//! a single confidence value, maps it onto priority tiers and estimates a
//! failure date.

use super::forest::MAX_CONDITION;
use crate::config::{EngineConfig, MAX_FAILURE_HORIZON_DAYS};
use crate::features::FeatureVector;
use crate::models::{FeatureContribution, Prediction, Priority};
use chrono::{Duration, NaiveDate};

/// Model version reported when no snapshot is attached
pub const UNVERSIONED: &str = "unversioned";

/// Configuration for risk scoring
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Weight of the gradual-wear term; the anomaly term gets the rest
    pub blend_weight: f64,
    pub max_horizon_days: u32,
    pub lead_scale_days: f64,
    pub top_contributors: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RiskConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            blend_weight: config.confidence_blend_weight.clamp(0.0, 1.0),
            max_horizon_days: config
                .max_failure_horizon_days
                .clamp(1, MAX_FAILURE_HORIZON_DAYS),
            lead_scale_days: config.failure_lead_scale_days,
            top_contributors: config.top_contributors,
        }
    }
}

/// Converts model outputs into `Prediction` records
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: RiskConfig,
    /// Feature importances, highest first
    importances: Vec<(String, f64)>,
    model_version: String,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            importances: Vec::new(),
            model_version: UNVERSIONED.to_string(),
        }
    }

    pub fn with_importances(mut self, importances: Vec<(String, f64)>) -> Self {
        self.importances = importances;
        self
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Gradual-wear term in [0, 1] for a predicted condition score
    pub fn wear_risk(&self, predicted_condition: f64) -> f64 {
        if !predicted_condition.is_finite() {
            return 1.0;
        }
        ((MAX_CONDITION - predicted_condition) / MAX_CONDITION).clamp(0.0, 1.0)
    }

    /// Blended confidence in [0, 1]
    pub fn confidence(&self, predicted_condition: f64, anomaly_score: f64) -> f64 {
        let wear = self.wear_risk(predicted_condition);
        let anomaly = sanitize_unit(anomaly_score);
        let w = self.config.blend_weight;
        (w * wear + (1.0 - w) * anomaly).clamp(0.0, 1.0)
    }

    /// Days until the predicted failure: inversely proportional to
    /// confidence, between one day and the configured horizon
    pub fn lead_time_days(&self, confidence: f64) -> i64 {
        let horizon = i64::from(self.config.max_horizon_days.clamp(1, MAX_FAILURE_HORIZON_DAYS));
        if confidence <= 0.0 || !confidence.is_finite() {
            return horizon;
        }
        let days = (self.config.lead_scale_days / confidence).round();
        if days >= horizon as f64 {
            horizon
        } else {
            (days as i64).clamp(1, horizon)
        }
    }

    pub fn score(
        &self,
        degradation_prediction: f64,
        anomaly_score: f64,
        features: &FeatureVector,
        as_of: NaiveDate,
    ) -> Prediction {
        let predicted_condition = if degradation_prediction.is_finite() {
            degradation_prediction.clamp(0.0, MAX_CONDITION)
        } else {
            0.0
        };
        let confidence = self.confidence(predicted_condition, anomaly_score);
        let lead = self.lead_time_days(confidence);
        let predicted_failure_date = as_of
            .checked_add_signed(Duration::days(lead))
            .unwrap_or(NaiveDate::MAX);

        Prediction {
            tool_code: features.tool_code.clone(),
            prediction_date: as_of,
            confidence,
            priority: Priority::from_confidence(confidence),
            predicted_failure_date,
            predicted_condition,
            wear_risk: self.wear_risk(predicted_condition),
            anomaly_score: sanitize_unit(anomaly_score),
            contributing_features: self.contributions(features),
            model_version: self.model_version.clone(),
        }
    }

    fn contributions(&self, features: &FeatureVector) -> Vec<FeatureContribution> {
        self.importances
            .iter()
            .filter(|(_, importance)| *importance > 0.0)
            .filter_map(|(name, importance)| {
                features.get(name).map(|value| FeatureContribution {
                    feature: name.clone(),
                    value,
                    importance: *importance,
                })
            })
            .take(self.config.top_contributors)
            .collect()
    }
}

fn sanitize_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
