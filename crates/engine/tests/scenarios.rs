//! End-to-end training and scoring scenarios

mod common;

use common::{days_ago, ej_001, idle_tool, intensity_fleet, now, test_config, today, wear_fleet};
use maintenance_engine::engine::{score_tools, train_snapshot};
use maintenance_engine::features::{FeatureBuilder, HISTORY_FEATURES};
use maintenance_engine::{
    EngineError, InMemoryStore, MaintenanceEngine, Priority, ScoringOutcome,
};
use std::sync::Arc;

fn trained_engine() -> (MaintenanceEngine, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new(wear_fleet(), vec![], vec![]));
    let engine = MaintenanceEngine::new(test_config(), store.clone()).unwrap();
    engine.train(now()).unwrap();
    (engine, store)
}

#[test]
fn test_ej_001_features() {
    let (engine, _) = trained_engine();
    let snapshot = engine.active_snapshot().unwrap();
    let (tool, repair) = ej_001();

    let builder = FeatureBuilder::new(snapshot.schema().clone(), today());
    let set = builder.build(&[tool], &[], &[repair]).unwrap();
    let vector = &set.vectors["EJ-001"];

    assert!((vector.get("usage_intensity").unwrap() - 0.75).abs() < 1e-9);
    assert!((vector.get("maintenance_frequency").unwrap() - 0.0025).abs() < 1e-9);
    // a single maintenance event has no trend yet
    assert_eq!(vector.get("condition_trend"), Some(0.0));
    assert_eq!(vector.get("avg_condition_recovery"), Some(25.0));
    assert_eq!(vector.get("days_since_last_maintenance"), Some(200.0));
}

#[test]
fn test_ej_001_is_never_low_priority() {
    let (engine, store) = trained_engine();
    let (tool, repair) = ej_001();
    let mut tools = wear_fleet();
    tools.push(tool);
    store.set_tools(tools);
    store.push_maintenance(repair);

    let report = engine.score(now()).unwrap().into_report().unwrap();
    let prediction = report
        .predictions
        .iter()
        .find(|p| p.tool_code == "EJ-001")
        .unwrap();

    assert!(
        prediction.priority >= Priority::Medium,
        "EJ-001 scored {:?} at confidence {}",
        prediction.priority,
        prediction.confidence
    );
    assert!(prediction.predicted_condition < 30.0);
    assert!(prediction.predicted_failure_date > today());
    assert!(prediction.predicted_failure_date <= days_ago(-90));
}

#[test]
fn test_idle_tool_is_low_priority() {
    let (engine, store) = trained_engine();
    store.set_tools(vec![idle_tool()]);

    let report = engine.score(now()).unwrap().into_report().unwrap();
    let prediction = &report.predictions[0];

    assert_eq!(prediction.priority, Priority::Low);
    assert!(!prediction.requires_alert());
    assert!(prediction.predicted_condition > 90.0);

    let snapshot = engine.active_snapshot().unwrap();
    let builder = FeatureBuilder::new(snapshot.schema().clone(), today());
    let set = builder.build(&[idle_tool()], &[], &[]).unwrap();
    for name in HISTORY_FEATURES {
        assert_eq!(set.vectors["ID-001"].get(name), Some(0.0), "{}", name);
    }
}

#[test]
fn test_risk_monotone_in_usage_intensity() {
    let fleet = intensity_fleet();
    let trained = train_snapshot(&test_config(), &fleet, &[], &[], now()).unwrap();
    let snapshot = trained.snapshot;
    let builder = FeatureBuilder::new(snapshot.schema().clone(), today());
    let base = builder.build(&fleet, &[], &[]).unwrap().vectors["IN-015"].clone();

    let risk_at = |intensity: f64| {
        let vector = base.with_value("usage_intensity", intensity).unwrap();
        100.0 - snapshot.regressor().predict(&vector)
    };

    let mut previous_risk = f64::NEG_INFINITY;
    for step in 0..=40 {
        let intensity = step as f64 * 0.025;
        let risk = risk_at(intensity);
        assert!(
            risk >= previous_risk,
            "risk fell from {} to {} at intensity {}",
            previous_risk,
            risk,
            intensity
        );
        previous_risk = risk;
    }
    assert!(risk_at(1.0) > risk_at(0.0));
}

#[test]
fn test_training_is_deterministic() {
    let config = test_config();
    let (tool, repair) = ej_001();
    let mut tools = wear_fleet();
    tools.push(tool);
    let history = vec![repair];

    let first = train_snapshot(&config, &tools, &[], &history, now()).unwrap().snapshot;
    let second = train_snapshot(&config, &tools, &[], &history, now()).unwrap().snapshot;
    assert_eq!(first, second);
    assert_eq!(first.checksum(), second.checksum());
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

    let a = score_tools(&first, &config, &tools, &[], &history, today()).unwrap();
    let b = score_tools(&second, &config, &tools, &[], &history, today()).unwrap();
    assert_eq!(a.predictions, b.predictions);

    let mut reseeded = config.clone();
    reseeded.random_seed += 1;
    let third = train_snapshot(&reseeded, &tools, &[], &history, now()).unwrap().snapshot;
    assert_ne!(first.checksum(), third.checksum());
}

#[test]
fn test_insufficient_data_keeps_active_snapshot() {
    let (engine, store) = trained_engine();
    let before = engine.active_snapshot().unwrap();

    store.set_tools(wear_fleet().into_iter().take(4).collect());
    let result = engine.train(now() + chrono::Duration::days(1));

    assert!(matches!(
        result,
        Err(EngineError::InsufficientData {
            available: 4,
            required: 10
        })
    ));
    let after = engine.active_snapshot().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(store.snapshot_count(), 1);
}

#[test]
fn test_unknown_category_scores_into_unknown_bucket() {
    let (engine, store) = trained_engine();
    let mut welder = idle_tool();
    welder.tool_code = "WL-001".to_string();
    welder.category = "Welder".to_string();
    welder.location = "Site 9".to_string();
    store.set_tools(vec![welder]);

    let report = engine.score(now()).unwrap().into_report().unwrap();
    assert_eq!(report.predictions.len(), 1);
    assert!(report.failures.is_empty());
}

#[test]
fn test_no_model_suppresses_scoring() {
    let store = Arc::new(InMemoryStore::new(wear_fleet(), vec![], vec![]));
    let engine = MaintenanceEngine::new(test_config(), store.clone()).unwrap();

    assert!(matches!(engine.score(now()).unwrap(), ScoringOutcome::NoModelAvailable));
    assert!(store.predictions().is_empty());
}

#[test]
fn test_recommendations_follow_priority() {
    let (engine, store) = trained_engine();
    let (tool, repair) = ej_001();
    store.set_tools(vec![tool, idle_tool()]);
    store.push_maintenance(repair);

    let report = engine.score(now()).unwrap().into_report().unwrap();
    let recommendations = engine.recommendations(&report);

    assert!(recommendations.iter().any(|r| r.tool_code == "EJ-001"));
    assert!(recommendations.iter().all(|r| r.tool_code != "ID-001"));
    for recommendation in &recommendations {
        assert!(recommendation.estimated_cost >= 100.0);
    }
}
