//! Shared inventory fixtures for scenario tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use maintenance_engine::{EngineConfig, MaintenanceRecord, ToolRecord, ToolStatus};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 3, 0, 0).unwrap()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

/// Small forests keep the suite fast while exercising every code path
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.regressor.n_trees = 25;
    config.anomaly.n_trees = 50;
    config
}

pub fn tool(code: &str, usage_hours: f64, condition_score: f64) -> ToolRecord {
    ToolRecord {
        tool_code: code.to_string(),
        category: "Drill".to_string(),
        location: "Warehouse A".to_string(),
        purchase_date: Some(days_ago(400)),
        condition_score,
        usage_hours,
        last_maintenance_date: None,
        status: ToolStatus::Available,
    }
}

/// Thirty drills bought on the same day where condition falls steadily with
/// usage: 0 hours at condition 100 down to 290 hours at condition 13
pub fn wear_fleet() -> Vec<ToolRecord> {
    (0..30)
        .map(|i| {
            let hours = i as f64 * 10.0;
            tool(&format!("DR-{:03}", i), hours, 100.0 - 0.3 * hours)
        })
        .collect()
}

/// Heavily used drill with a single prior repair
pub fn ej_001() -> (ToolRecord, MaintenanceRecord) {
    let mut record = tool("EJ-001", 300.0, 60.0);
    record.last_maintenance_date = Some(days_ago(200));
    let repair = MaintenanceRecord {
        tool_code: "EJ-001".to_string(),
        maintenance_date: days_ago(200),
        maintenance_type: "repair".to_string(),
        cost: 120.0,
        condition_before: Some(70.0),
        condition_after: Some(95.0),
    };
    (record, repair)
}

/// New drill that was never checked out or serviced
pub fn idle_tool() -> ToolRecord {
    tool("ID-001", 0.0, 100.0)
}

/// Tools of varied age whose condition depends only on usage intensity,
/// so neither usage hours nor age alone ranks them
pub fn intensity_fleet() -> Vec<ToolRecord> {
    (0..30)
        .map(|i| {
            let intensity = i as f64 * 0.03;
            let age = 150 + (i * 53) % 350;
            let mut record = tool(&format!("IN-{:03}", i), intensity * age as f64, 100.0 - 100.0 * intensity);
            record.purchase_date = Some(days_ago(age));
            record
        })
        .collect()
}
