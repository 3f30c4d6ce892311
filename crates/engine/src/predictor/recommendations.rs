//! Maintenance recommendations derived from predictions

use crate::models::{Prediction, Priority, Recommendation};

/// Wear or anomaly level above which a factor is called out in the reasoning
const NOTABLE_RISK: f64 = 0.7;

/// Turn predictions into actionable recommendations.
///
/// Only tools at Medium priority or above get a recommendation.
pub fn recommend(predictions: &[Prediction], base_cost: f64) -> Vec<Recommendation> {
    predictions
        .iter()
        .filter(|p| p.priority >= Priority::Medium)
        .map(|p| Recommendation {
            tool_code: p.tool_code.clone(),
            priority: p.priority,
            recommended_action: recommended_action(p).to_string(),
            estimated_cost: estimate_cost(p.confidence, base_cost),
            suggested_date: p.predicted_failure_date,
            reasoning: reasoning(p),
        })
        .collect()
}

fn recommended_action(prediction: &Prediction) -> &'static str {
    match prediction.priority {
        Priority::Critical => "Immediate inspection and preventive maintenance required",
        Priority::High => "Schedule comprehensive maintenance within 3 days",
        Priority::Medium if prediction.confidence > 0.7 => {
            "Plan preventive maintenance within 1 week"
        }
        Priority::Medium => "Monitor closely and schedule routine maintenance",
        Priority::Low => "Continue normal usage and monitoring",
    }
}

/// Cost estimate scaled by risk, rounded to cents
fn estimate_cost(confidence: f64, base_cost: f64) -> f64 {
    let cost = base_cost * (1.0 + confidence.clamp(0.0, 1.0) * 2.0);
    (cost * 100.0).round() / 100.0
}

fn reasoning(prediction: &Prediction) -> String {
    let mut reasons = Vec::new();
    if prediction.wear_risk > NOTABLE_RISK {
        reasons.push("Poor tool condition");
    }
    if prediction.anomaly_score > NOTABLE_RISK {
        reasons.push("Unusual usage pattern detected");
    }
    if prediction.confidence > 0.8 {
        reasons.push("High probability of failure");
    }
    if reasons.is_empty() {
        "Based on usage patterns and condition".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn prediction(code: &str, confidence: f64, wear: f64, anomaly: f64) -> Prediction {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        Prediction {
            tool_code: code.to_string(),
            prediction_date: date,
            confidence,
            priority: Priority::from_confidence(confidence),
            predicted_failure_date: date + chrono::Duration::days(7),
            predicted_condition: (1.0 - wear) * 100.0,
            wear_risk: wear,
            anomaly_score: anomaly,
            contributing_features: Vec::new(),
            model_version: "v1".to_string(),
        }
    }

    #[test]
    fn test_low_priority_filtered_out() {
        let recs = recommend(&[prediction("A", 0.3, 0.3, 0.3)], 100.0);
        assert!(recs.is_empty());
    }

    #[test]
    fn test_critical_recommendation() {
        let recs = recommend(&[prediction("A", 0.95, 0.9, 1.0)], 100.0);
        assert_eq!(recs.len(), 1);
        let rec = &recs[0];
        assert_eq!(rec.priority, Priority::Critical);
        assert_eq!(
            rec.recommended_action,
            "Immediate inspection and preventive maintenance required"
        );
        assert_eq!(rec.estimated_cost, 290.0);
        assert_eq!(
            rec.reasoning,
            "Poor tool condition; Unusual usage pattern detected; High probability of failure"
        );
    }

    #[test]
    fn test_medium_band_actions() {
        let recs = recommend(
            &[prediction("A", 0.75, 0.5, 0.5), prediction("B", 0.62, 0.5, 0.5)],
            100.0,
        );
        assert_eq!(recs[0].recommended_action, "Plan preventive maintenance within 1 week");
        assert_eq!(
            recs[1].recommended_action,
            "Monitor closely and schedule routine maintenance"
        );
        assert_eq!(recs[1].reasoning, "Based on usage patterns and condition");
        assert_eq!(recs[1].estimated_cost, 224.0);
    }
}
