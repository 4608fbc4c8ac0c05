use color_eyre::Result;
use orbat_core::{ScenarioState, ScenarioStore, UnitUpdate};
use orbat_runtime::{CommandPayload, ShowTarget};
use orbat_schema::{format_timestamp, Position};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnitRow {
    id: String,
    name: String,
    side: String,
    group: String,
    level: usize,
    sidc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeatureRow {
    id: String,
    name: Option<String>,
    hidden: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LayerRow {
    id: String,
    name: String,
    hidden: bool,
    features: Vec<FeatureRow>,
}

pub struct InspectorApp {
    store: ScenarioStore,
}

impl InspectorApp {
    pub fn new(store: ScenarioStore) -> Self {
        Self { store }
    }

    pub fn set_time(&mut self, timestamp: i64) {
        self.store.set_current_time(timestamp);
    }

    /// Snapshot of the clock and history state, emitted after every command.
    pub fn summary(&self) -> Value {
        let state = self.store.state();
        json!({
            "currentTime": state.current_time,
            "time": format_timestamp(state.current_time),
            "scenarioTime": state.scenario_time().map(|t| t.to_rfc3339()),
            "units": state.unit_map.len(),
            "visibleFeatures": state.feature_map.values().filter(|f| !f.hidden).count(),
            "canUndo": self.store.can_undo(),
            "canRedo": self.store.can_redo(),
        })
    }

    pub fn execute(&mut self, command: &CommandPayload) -> Result<Value> {
        debug!(target: "orbat::inspector", ?command, "command.execute");
        let (changed, result) = match command {
            CommandPayload::SetTime { timestamp } => {
                let before = self.store.state().current_time;
                self.store.set_current_time(*timestamp);
                (before != *timestamp, Value::Null)
            }
            CommandPayload::AddTime {
                amount,
                unit,
                normalize,
            } => (self.store.add(*amount, *unit, *normalize), Value::Null),
            CommandPayload::SubtractTime {
                amount,
                unit,
                normalize,
            } => (self.store.subtract(*amount, *unit, *normalize), Value::Null),
            CommandPayload::NextKeyframe => (self.store.jump_to_next_event(), Value::Null),
            CommandPayload::PrevKeyframe => (self.store.jump_to_prev_event(), Value::Null),
            CommandPayload::NextEvent => (self.store.go_to_next_scenario_event(), Value::Null),
            CommandPayload::PrevEvent => (self.store.go_to_prev_scenario_event(), Value::Null),
            CommandPayload::Undo => (self.store.undo(), Value::Null),
            CommandPayload::Redo => (self.store.redo(), Value::Null),
            CommandPayload::Show { target } => (false, self.show(*target)?),
            CommandPayload::RenameUnit { unit_id, name } => {
                let update = UnitUpdate {
                    name: Some(name.clone()),
                    ..UnitUpdate::default()
                };
                match self.store.update_unit(unit_id, update) {
                    Ok(()) => (true, Value::Null),
                    Err(err) => (false, json!({ "error": err.to_string() })),
                }
            }
        };

        Ok(json!({
            "command": command,
            "changed": changed,
            "result": result,
            "state": self.summary(),
        }))
    }

    fn show(&self, target: ShowTarget) -> Result<Value> {
        debug!(target: "orbat::inspector", view = %target, "inspector.show");
        let state = self.store.state();
        let value = match target {
            ShowTarget::Units => serde_json::to_value(unit_rows(state))?,
            ShowTarget::Layers => serde_json::to_value(layer_rows(state))?,
            ShowTarget::Events => serde_json::to_value(state.merged_events())?,
            ShowTarget::History => serde_json::to_value(self.store.history())?,
        };
        Ok(value)
    }
}

fn unit_rows(state: &ScenarioState) -> Vec<UnitRow> {
    let mut rows = Vec::with_capacity(state.unit_map.len());
    for side_id in state.sides.iter() {
        state.walk_side(side_id, |unit, level, group, side| {
            let current = unit.current_state.as_ref();
            rows.push(UnitRow {
                id: unit.id.clone(),
                name: unit.name.clone(),
                side: side.name.clone(),
                group: group.name.clone(),
                level,
                sidc: current
                    .and_then(|s| s.sidc.clone())
                    .unwrap_or_else(|| unit.sidc.clone()),
                location: current.and_then(|s| s.location),
                status: current.and_then(|s| s.status.clone()).or_else(|| unit.status.clone()),
            });
        });
    }
    rows
}

fn layer_rows(state: &ScenarioState) -> Vec<LayerRow> {
    state
        .layers
        .iter()
        .filter_map(|id| state.layer_map.get(id))
        .map(|layer| LayerRow {
            id: layer.id.clone(),
            name: layer.name.clone(),
            hidden: layer.hidden,
            features: layer
                .features
                .iter()
                .filter_map(|id| state.feature_map.get(id))
                .map(|feature| FeatureRow {
                    id: feature.id.clone(),
                    name: feature.meta.name.clone(),
                    hidden: feature.hidden,
                })
                .collect(),
        })
        .collect()
}
