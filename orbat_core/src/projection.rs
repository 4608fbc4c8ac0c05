//! Point-in-time projection of keyframe histories.
//!
//! [`project`] recomputes the derived `_state` of every unit and `_hidden` of
//! every layer and feature for one timestamp. Only entries whose derived value
//! actually changes are replaced, so projecting twice at the same instant
//! leaves every `Arc` untouched.

use std::sync::Arc;

use crate::geodesy;
use crate::model::{CurrentState, EntityId, NUnit, Position, ScenarioState, StateType};

/// Smallest timestamp an initial state can carry (`-(2^53 - 1)`).
pub const MIN_TIMESTAMP: i64 = -9_007_199_254_740_991;
pub const MAX_TIMESTAMP: i64 = 9_007_199_254_740_991;

/// The state a unit shows before any keyframe applies, if it has a static location.
pub fn create_initial_state(unit: &NUnit) -> Option<CurrentState> {
    unit.location
        .map(|location| CurrentState::initial(MIN_TIMESTAMP, location, &unit.sidc))
}

/// Fold a unit's keyframes up to `timestamp`, interpolating toward the first later one.
///
/// Keyframes at or before `timestamp` are merged in array order. The first
/// keyframe after it is the upper bracket: when both it and the running state
/// have a location, the unit is placed along the great-circle path
/// `running → via… → bracket` at constant speed. Scanning stops there.
pub fn unit_state_at(unit: &NUnit, timestamp: i64) -> Option<CurrentState> {
    let mut current = create_initial_state(unit);
    for keyframe in &unit.state {
        if keyframe.t <= timestamp {
            match current.as_mut() {
                Some(state) => state.merge(keyframe),
                None => current = Some(CurrentState::from_keyframe(keyframe)),
            }
            continue;
        }

        if let Some(state) = current.as_mut() {
            if let (Some(from), Some(to)) = (state.location, keyframe.location) {
                let via = keyframe.via.as_deref();
                if let Some(location) = interpolate(from, to, via, state.t, keyframe.t, timestamp) {
                    state.location = Some(location);
                    state.t = timestamp;
                    state.state_type = Some(StateType::Interpolated);
                }
            }
        }
        break;
    }
    current
}

fn interpolate(
    from: Position,
    to: Position,
    via: Option<&[Position]>,
    from_t: i64,
    to_t: i64,
    timestamp: i64,
) -> Option<Position> {
    let span = to_t as f64 - from_t as f64;
    if span <= 0.0 {
        return None;
    }
    let mut path = Vec::with_capacity(2 + via.map_or(0, <[Position]>::len));
    path.push(from);
    path.extend_from_slice(via.unwrap_or_default());
    path.push(to);

    let speed = geodesy::path_length(&path) / span;
    let elapsed = timestamp as f64 - from_t as f64;
    geodesy::along(&path, speed * elapsed)
}

/// Visibility window test; unset bounds never hide.
pub fn is_hidden_at(visible_from: Option<i64>, visible_until: Option<i64>, timestamp: i64) -> bool {
    let from = visible_from.unwrap_or(MIN_TIMESTAMP);
    let until = visible_until.unwrap_or(MAX_TIMESTAMP);
    timestamp <= from || timestamp >= until
}

/// How many derived fields a projection pass replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub units_changed: usize,
    pub layers_changed: usize,
    pub features_changed: usize,
}

impl ProjectionSummary {
    pub fn is_empty(&self) -> bool {
        self.units_changed == 0 && self.layers_changed == 0 && self.features_changed == 0
    }
}

/// Recompute all derived fields at `timestamp` and set `current_time`.
pub fn project(state: &mut ScenarioState, timestamp: i64) -> ProjectionSummary {
    let mut summary = ProjectionSummary::default();

    let unit_updates: Vec<(EntityId, Option<CurrentState>)> = state
        .unit_map
        .values()
        .filter_map(|unit| {
            let next = unit_state_at(unit, timestamp);
            (next != unit.current_state).then(|| (unit.id.clone(), next))
        })
        .collect();
    summary.units_changed = unit_updates.len();
    if !unit_updates.is_empty() {
        let units = Arc::make_mut(&mut state.unit_map);
        for (id, next) in unit_updates {
            if let Some(unit) = units.get_mut(&id) {
                Arc::make_mut(unit).current_state = next;
            }
        }
    }

    let layer_updates: Vec<(EntityId, bool)> = state
        .layer_map
        .values()
        .filter_map(|layer| {
            let hidden = is_hidden_at(layer.visible_from_t, layer.visible_until_t, timestamp);
            (hidden != layer.hidden).then(|| (layer.id.clone(), hidden))
        })
        .collect();
    summary.layers_changed = layer_updates.len();
    for (id, hidden) in layer_updates {
        if let Some(layer) = state.layer_mut(&id) {
            layer.hidden = hidden;
        }
    }

    let feature_updates: Vec<(EntityId, bool)> = state
        .feature_map
        .values()
        .filter_map(|feature| {
            let meta = &feature.meta;
            let hidden = is_hidden_at(meta.visible_from_t, meta.visible_until_t, timestamp);
            (hidden != feature.hidden).then(|| (feature.id.clone(), hidden))
        })
        .collect();
    summary.features_changed = feature_updates.len();
    for (id, hidden) in feature_updates {
        if let Some(feature) = state.feature_mut(&id) {
            feature.hidden = hidden;
        }
    }

    state.current_time = timestamp;
    tracing::trace!(
        target: "orbat::time",
        t = timestamp,
        units = summary.units_changed,
        layers = summary.layers_changed,
        features = summary.features_changed,
        "projection.completed"
    );
    summary
}
