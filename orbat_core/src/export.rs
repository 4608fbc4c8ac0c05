//! Rebuild the nested document shape from a normalized state.

use orbat_schema::{
    EquipmentData, FeatureState, PersonnelData, RangeRing, RangeRingGroup, ReferenceCount,
    Scenario, ScenarioEvent, ScenarioFeature, ScenarioFeatureMeta, ScenarioLayer,
    ScenarioMapLayer, ScenarioSettings, Side, SideGroup, TimeValue, Unit, UnitState, UnitStatus,
    SCENARIO_DOCUMENT_TYPE, SCENARIO_FILE_VERSION,
};
use serde_json::Value;

use crate::model::{EntityId, EntityMap, NUnit, ReferenceEntry, ScenarioState, StateKeyframe};

/// Keys that only exist in the normalized form and never belong in a document.
pub const INTERNAL_NAMES: &[&str] = &[
    "_pid", "_gid", "_sid", "_state", "_hidden", "_isOpen", "_type", "_zIndex",
];

fn time(millis: i64) -> TimeValue {
    TimeValue::from_millis(millis)
}

fn name_of<T>(map: &EntityMap<T>, id: &EntityId, name: impl Fn(&T) -> &str) -> String {
    map.get(id).map(|entry| name(entry.as_ref()).to_string()).unwrap_or_else(|| id.clone())
}

fn reference_counts<T, F>(entries: &[ReferenceEntry], map: &EntityMap<T>, name: F) -> Vec<ReferenceCount>
where
    F: Copy + Fn(&T) -> &str,
{
    entries
        .iter()
        .map(|entry| ReferenceCount {
            name: name_of(map, &entry.reference_id, name),
            count: entry.count,
        })
        .collect()
}

/// Nested document equivalent to `state`, with reference ids mapped back to names.
pub fn to_document(state: &ScenarioState) -> Scenario {
    let sides = state
        .sides
        .iter()
        .filter_map(|id| state.side_map.get(id))
        .map(|side| Side {
            id: Some(side.id.clone()),
            name: side.name.clone(),
            groups: side
                .groups
                .iter()
                .filter_map(|id| state.side_group_map.get(id))
                .map(|group| SideGroup {
                    id: Some(group.id.clone()),
                    name: group.name.clone(),
                    sub_units: export_units(state, &group.sub_units),
                    extra: group.extra.clone(),
                })
                .collect(),
            extra: side.extra.clone(),
        })
        .collect();

    let events = state
        .events
        .iter()
        .filter_map(|id| state.event_map.get(id))
        .map(|event| ScenarioEvent {
            id: Some(event.id.clone()),
            title: event.title.clone(),
            sub_title: event.sub_title.clone(),
            description: event.description.clone(),
            start_time: time(event.start_time),
            extra: event.extra.clone(),
        })
        .collect();

    let layers = state
        .layers
        .iter()
        .filter_map(|id| state.layer_map.get(id))
        .map(|layer| ScenarioLayer {
            id: Some(layer.id.clone()),
            name: layer.name.clone(),
            description: layer.description.clone(),
            features: layer
                .features
                .iter()
                .filter_map(|id| state.feature_map.get(id))
                .map(|feature| ScenarioFeature {
                    id: Some(feature.id.clone()),
                    kind: feature.kind.clone(),
                    geometry: feature.geometry.clone(),
                    properties: feature.properties.clone(),
                    meta: ScenarioFeatureMeta {
                        geometry_type: feature.meta.geometry_type.clone(),
                        name: feature.meta.name.clone(),
                        description: feature.meta.description.clone(),
                        radius: feature.meta.radius,
                        visible_from_t: feature.meta.visible_from_t.map(time),
                        visible_until_t: feature.meta.visible_until_t.map(time),
                        extra: feature.meta.extra.clone(),
                    },
                    style: feature.style.clone(),
                    state: feature
                        .state
                        .iter()
                        .map(|keyframe| FeatureState {
                            id: Some(keyframe.id.clone()),
                            t: time(keyframe.t),
                            geometry: keyframe.geometry.clone(),
                            extra: keyframe.extra.clone(),
                        })
                        .collect(),
                    extra: feature.extra.clone(),
                })
                .collect(),
            is_hidden: layer.is_hidden,
            visible_from_t: layer.visible_from_t.map(time),
            visible_until_t: layer.visible_until_t.map(time),
            extra: layer.extra.clone(),
        })
        .collect();

    let map_layers = state
        .map_layers
        .iter()
        .filter_map(|id| state.map_layer_map.get(id))
        .map(|layer| ScenarioMapLayer {
            id: Some(layer.id.clone()),
            kind: layer.kind.clone(),
            name: layer.name.clone(),
            url: layer.url.clone(),
            opacity: layer.opacity,
            is_hidden: layer.is_hidden,
            visible_from_t: layer.visible_from_t.map(time),
            visible_until_t: layer.visible_until_t.map(time),
            extra: layer.extra.clone(),
        })
        .collect();

    let settings = ScenarioSettings {
        range_ring_groups: state
            .range_ring_group_map
            .values()
            .map(|group| RangeRingGroup {
                name: group.name.clone(),
                style: group.style.clone(),
                extra: group.extra.clone(),
            })
            .collect(),
        statuses: state
            .unit_status_map
            .values()
            .map(|status| UnitStatus {
                name: status.name.clone(),
                extra: status.extra.clone(),
            })
            .collect(),
        map: Some(state.map_settings.as_ref().clone()),
        extra: Default::default(),
    };

    let info = &state.info;
    Scenario {
        id: Some(state.id.clone()),
        kind: Some(SCENARIO_DOCUMENT_TYPE.to_string()),
        version: Some(SCENARIO_FILE_VERSION.to_string()),
        name: info.name.clone(),
        description: info.description.clone(),
        start_time: info.start_time.map(time),
        time_zone: info.time_zone.clone(),
        symbology_standard: info.symbology_standard.clone(),
        sides,
        events,
        layers,
        map_layers,
        equipment: state
            .equipment_map
            .values()
            .map(|item| EquipmentData {
                name: item.name.clone(),
                description: item.description.clone(),
                extra: item.extra.clone(),
            })
            .collect(),
        personnel: state
            .personnel_map
            .values()
            .map(|item| PersonnelData {
                name: item.name.clone(),
                description: item.description.clone(),
                extra: item.extra.clone(),
            })
            .collect(),
        settings: Some(settings),
        meta: Some(state.meta.as_ref().clone()),
        extra: info.extra.clone(),
    }
}

fn export_units(state: &ScenarioState, ids: &[EntityId]) -> Vec<Unit> {
    ids.iter()
        .filter_map(|id| state.unit(id))
        .map(|unit| export_unit(state, unit))
        .collect()
}

fn export_unit(state: &ScenarioState, unit: &NUnit) -> Unit {
    let status_name = |id: &EntityId| name_of(&state.unit_status_map, id, |s| s.name.as_str());
    Unit {
        id: Some(unit.id.clone()),
        name: unit.name.clone(),
        short_name: unit.short_name.clone(),
        description: unit.description.clone(),
        sidc: unit.sidc.clone(),
        location: unit.location,
        sub_units: export_units(state, &unit.sub_units),
        state: unit
            .state
            .iter()
            .map(|keyframe| export_keyframe(keyframe, &status_name))
            .collect(),
        equipment: reference_counts(&unit.equipment, &state.equipment_map, |e| e.name.as_str()),
        personnel: reference_counts(&unit.personnel, &state.personnel_map, |p| p.name.as_str()),
        range_rings: unit
            .range_rings
            .iter()
            .map(|ring| RangeRing {
                name: ring.name.clone(),
                range: ring.range,
                uom: ring.uom.clone(),
                hidden: ring.hidden,
                group: ring.group.as_ref().map(|id| {
                    name_of(&state.range_ring_group_map, id, |g| g.name.as_str())
                }),
                style: ring.style.clone(),
                extra: ring.extra.clone(),
            })
            .collect(),
        status: unit.status.as_ref().map(&status_name),
        extra: unit.extra.clone(),
    }
}

fn export_keyframe(keyframe: &StateKeyframe, status_name: &impl Fn(&EntityId) -> String) -> UnitState {
    UnitState {
        id: Some(keyframe.id.clone()),
        t: time(keyframe.t),
        location: keyframe.location,
        via: keyframe.via.clone(),
        via_start_time: keyframe.via_start_time.map(time),
        sidc: keyframe.sidc.clone(),
        status: keyframe.status.as_ref().map(status_name),
        title: keyframe.title.clone(),
        sub_title: keyframe.sub_title.clone(),
        description: keyframe.description.clone(),
        state_type: keyframe.state_type.clone().map(String::from),
        extra: keyframe.extra.clone(),
    }
}

/// Remove every key listed in [`INTERNAL_NAMES`] at any depth.
pub fn strip_internal_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !INTERNAL_NAMES.contains(&key.as_str()));
            map.values_mut().for_each(strip_internal_fields);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_internal_fields),
        _ => {}
    }
}

/// Pretty-printed document JSON with internal fields removed.
pub fn to_json_string(state: &ScenarioState) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(to_document(state))?;
    strip_internal_fields(&mut value);
    serde_json::to_string_pretty(&value)
}
