//! Core data models for the maintenance engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current availability of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Available,
    InUse,
    Maintenance,
}

impl ToolStatus {
    pub const ALL: [ToolStatus; 3] = [
        ToolStatus::Available,
        ToolStatus::InUse,
        ToolStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Available => "available",
            ToolStatus::InUse => "in_use",
            ToolStatus::Maintenance => "maintenance",
        }
    }
}

/// Tool inventory record, owned by the database layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_code: String,
    pub category: String,
    pub location: String,
    pub purchase_date: Option<NaiveDate>,
    /// 0-100, 100 = as-new
    pub condition_score: f64,
    /// Cumulative usage hours
    pub usage_hours: f64,
    pub last_maintenance_date: Option<NaiveDate>,
    pub status: ToolStatus,
}

/// One checkout/checkin cycle of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tool_code: String,
    pub user_id: String,
    pub checkout_time: DateTime<Utc>,
    pub checkin_time: Option<DateTime<Utc>>,
    /// Usage duration in hours as computed by the database layer
    pub usage_duration: Option<f64>,
}

impl UsageRecord {
    /// Usage duration in hours, derived from timestamps when not recorded.
    /// Open checkouts have no duration yet.
    pub fn duration_hours(&self) -> Option<f64> {
        if let Some(hours) = self.usage_duration.filter(|h| h.is_finite()) {
            return Some(hours.max(0.0));
        }
        let checkin = self.checkin_time?;
        let secs = (checkin - self.checkout_time).num_seconds().max(0);
        Some(secs as f64 / 3600.0)
    }
}

/// A completed maintenance event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub tool_code: String,
    pub maintenance_date: NaiveDate,
    pub maintenance_type: String,
    pub cost: f64,
    pub condition_before: Option<f64>,
    pub condition_after: Option<f64>,
}

/// Discrete maintenance priority derived from confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Map a confidence value onto the priority bands.
    ///
    /// Bands are inclusive on their lower bound, except Critical which
    /// requires strictly more than 0.90.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.90 {
            Priority::Critical
        } else if confidence >= 0.80 {
            Priority::High
        } else if confidence >= 0.60 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A feature that contributed to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
    pub importance: f64,
}

/// Risk assessment for a single tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub tool_code: String,
    pub prediction_date: NaiveDate,
    /// Blended failure risk in [0, 1]
    pub confidence: f64,
    pub priority: Priority,
    pub predicted_failure_date: NaiveDate,
    /// Regressor output in [0, 100]
    pub predicted_condition: f64,
    /// Gradual-wear term in [0, 1]
    pub wear_risk: f64,
    /// Anomaly term in [0, 1]
    pub anomaly_score: f64,
    pub contributing_features: Vec<FeatureContribution>,
    pub model_version: String,
}

impl Prediction {
    /// Whether the alerting pipeline should notify about this tool
    pub fn requires_alert(&self) -> bool {
        self.priority >= Priority::High
    }

    pub fn days_until_failure(&self) -> i64 {
        (self.predicted_failure_date - self.prediction_date).num_days()
    }
}

/// Actionable maintenance recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub tool_code: String,
    pub priority: Priority,
    pub recommended_action: String,
    pub estimated_cost: f64,
    pub suggested_date: NaiveDate,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_priority_boundaries() {
        let eps = 1e-9;
        assert_eq!(Priority::from_confidence(0.60 - eps), Priority::Low);
        assert_eq!(Priority::from_confidence(0.60), Priority::Medium);
        assert_eq!(Priority::from_confidence(0.60 + eps), Priority::Medium);
        assert_eq!(Priority::from_confidence(0.80 - eps), Priority::Medium);
        assert_eq!(Priority::from_confidence(0.80), Priority::High);
        assert_eq!(Priority::from_confidence(0.80 + eps), Priority::High);
        assert_eq!(Priority::from_confidence(0.90 - eps), Priority::High);
        assert_eq!(Priority::from_confidence(0.90), Priority::High);
        assert_eq!(Priority::from_confidence(0.90 + eps), Priority::Critical);
        assert_eq!(Priority::from_confidence(0.0), Priority::Low);
        assert_eq!(Priority::from_confidence(1.0), Priority::Critical);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_usage_duration_from_timestamps() {
        let checkout = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let record = UsageRecord {
            tool_code: "EJ-001".to_string(),
            user_id: "tech-7".to_string(),
            checkout_time: checkout,
            checkin_time: Some(checkout + chrono::Duration::minutes(90)),
            usage_duration: None,
        };
        assert!((record.duration_hours().unwrap() - 1.5).abs() < 1e-12);

        let open = UsageRecord {
            checkin_time: None,
            ..record.clone()
        };
        assert!(open.duration_hours().is_none());

        let recorded = UsageRecord {
            usage_duration: Some(4.0),
            ..record
        };
        assert_eq!(recorded.duration_hours(), Some(4.0));
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&ToolStatus::InUse).unwrap();
        assert_eq!(json, "\"in_use\"");
        let status: ToolStatus = serde_json::from_str("\"maintenance\"").unwrap();
        assert_eq!(status, ToolStatus::Maintenance);
    }
}
