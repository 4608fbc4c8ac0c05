#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use orbat_core::{load_scenario, load_scenario_file, ScenarioStore, StoreConfig};
use orbat_schema::Scenario;
use serde_json::Value;

/// 2024-03-01T06:00:00Z, the brigade fixture's start time.
pub const BRIGADE_START: i64 = 1_709_272_800_000;
pub const HOUR: i64 = 3_600_000;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture_value(name: &str) -> anyhow::Result<Value> {
    let path = fixture_path(name);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("missing fixture {}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn load_fixture(name: &str) -> anyhow::Result<ScenarioStore> {
    load_fixture_with(name, StoreConfig::builtin())
}

pub fn load_fixture_with(name: &str, config: Arc<StoreConfig>) -> anyhow::Result<ScenarioStore> {
    let store = load_scenario_file(&fixture_path(name), config)
        .with_context(|| format!("loading fixture {name}"))?;
    Ok(store)
}

/// Load a fixture after editing its raw JSON.
pub fn load_patched(name: &str, patch: impl FnOnce(&mut Value)) -> anyhow::Result<ScenarioStore> {
    let mut value = fixture_value(name)?;
    patch(&mut value);
    let scenario = Scenario::from_value(value)?;
    Ok(load_scenario(scenario, StoreConfig::builtin())?)
}

pub fn assert_close(actual: [f64; 2], expected: [f64; 2], tolerance: f64) {
    assert!(
        (actual[0] - expected[0]).abs() < tolerance && (actual[1] - expected[1]).abs() < tolerance,
        "expected {expected:?}, got {actual:?}"
    );
}
