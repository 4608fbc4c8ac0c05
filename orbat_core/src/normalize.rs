//! Flattening of nested scenario documents into id-keyed tables.

use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use orbat_schema::{
    DocumentError, FeatureState, RangeRing, Scenario, ScenarioEvent, ScenarioFeature,
    ScenarioLayer, ScenarioMapLayer, SideGroup, TimeValue, TimestampError, Unit, UnitState,
};
use serde_json::Value;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::ids::IdGenerator;
use crate::model::{
    EntityId, EntityKind, EntityMap, EventSource, NEquipmentData, NFeatureMeta, NFeatureState,
    NPersonnelData, NRangeRing, NRangeRingGroup, NScenarioEvent, NScenarioFeature,
    NScenarioLayer, NScenarioMapLayer, NSide, NSideGroup, NUnit, NUnitStatus, ReferenceEntry,
    ScenarioInfo, ScenarioState, StateKeyframe, StateType,
};
use crate::reference::ReferenceTables;
use crate::store::ScenarioStore;
use crate::validate::{validate_state, MalformedScenarioError};

#[derive(Debug, Error)]
pub enum ScenarioLoadError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid {field} on {entity}: {source}")]
    Timestamp {
        entity: String,
        field: &'static str,
        #[source]
        source: TimestampError,
    },
    #[error("malformed scenario: {0}")]
    Malformed(#[from] MalformedScenarioError),
}

fn millis(value: &TimeValue, entity: &str, field: &'static str) -> Result<i64, ScenarioLoadError> {
    value.to_millis().map_err(|source| ScenarioLoadError::Timestamp {
        entity: entity.to_string(),
        field,
        source,
    })
}

fn optional_millis(
    value: Option<&TimeValue>,
    entity: &str,
    field: &'static str,
) -> Result<Option<i64>, ScenarioLoadError> {
    value.map(|value| millis(value, entity, field)).transpose()
}

fn insert<T>(map: &mut EntityMap<T>, id: &EntityId, value: T) {
    map.insert(id.clone(), Arc::new(value));
}

/// Upgrade a raw JSON document, then normalize it.
pub fn normalize_value(
    document: Value,
    ids: &mut IdGenerator,
) -> Result<ScenarioState, ScenarioLoadError> {
    let scenario = Scenario::from_value(document)?;
    normalize(scenario, ids)
}

/// Turn a nested document into a flat [`ScenarioState`].
///
/// Missing ids are generated, timestamps become epoch milliseconds, and
/// reference data embedded by name is interned into the reference tables.
/// Derived fields start empty; call [`crate::projection::project`] (or load
/// through [`load_scenario`]) to fill them.
pub fn normalize(
    scenario: Scenario,
    ids: &mut IdGenerator,
) -> Result<ScenarioState, ScenarioLoadError> {
    reserve_document_ids(&scenario, ids)?;
    let mut normalizer = Normalizer {
        ids,
        refs: ReferenceTables::default(),
        units: EntityMap::default(),
    };
    let state = normalizer.run(scenario)?;
    tracing::info!(
        target: "orbat::normalize",
        scenario = %state.id,
        sides = state.sides.len(),
        units = state.unit_map.len(),
        layers = state.layers.len(),
        features = state.feature_map.len(),
        events = state.events.len(),
        "scenario.normalized"
    );
    Ok(state)
}

struct Normalizer<'a> {
    ids: &'a mut IdGenerator,
    refs: ReferenceTables,
    units: EntityMap<NUnit>,
}

impl Normalizer<'_> {
    fn run(&mut self, scenario: Scenario) -> Result<ScenarioState, ScenarioLoadError> {
        let Scenario {
            id,
            kind: _,
            version: _,
            name,
            description,
            start_time,
            time_zone,
            symbology_standard,
            sides,
            events,
            layers,
            map_layers,
            equipment,
            personnel,
            settings,
            meta,
            extra,
        } = scenario;
        let settings = settings.unwrap_or_default();

        let scenario_id = self.ids.ensure(id);
        let mut event_map = EntityMap::default();
        for event in events {
            let event = self.event(event)?;
            insert(&mut event_map, &event.id.clone(), event);
        }

        for status in settings.statuses {
            let name = status.name.clone();
            self.refs.unit_statuses.intern(self.ids, &name, |id| NUnitStatus {
                id,
                name: status.name,
                extra: status.extra,
            });
        }

        let start_time = optional_millis(start_time.as_ref(), &scenario_id, "startTime")?;

        for item in equipment {
            let name = item.name.clone();
            self.refs.equipment.intern(self.ids, &name, |id| NEquipmentData {
                id,
                name: item.name,
                description: item.description,
                extra: item.extra,
            });
        }
        for item in personnel {
            let name = item.name.clone();
            self.refs.personnel.intern(self.ids, &name, |id| NPersonnelData {
                id,
                name: item.name,
                description: item.description,
                extra: item.extra,
            });
        }
        for group in settings.range_ring_groups {
            let name = group.name.clone();
            self.refs.range_ring_groups.intern(self.ids, &name, |id| NRangeRingGroup {
                id,
                name: group.name,
                style: group.style,
                extra: group.extra,
            });
        }

        let mut side_ids = Vec::with_capacity(sides.len());
        let mut side_map = EntityMap::default();
        let mut side_group_map = EntityMap::default();
        for side in sides {
            let side_id = self.ids.ensure(side.id);
            let group_ids: Vec<EntityId> = side
                .groups
                .iter()
                .map(|group| self.ids.ensure(group.id.clone()))
                .collect();
            side_ids.push(side_id.clone());
            insert(
                &mut side_map,
                &side_id,
                NSide {
                    id: side_id.clone(),
                    name: side.name,
                    groups: group_ids.clone(),
                    extra: side.extra,
                },
            );
            for (group, group_id) in side.groups.into_iter().zip(group_ids) {
                let group = self.side_group(group, group_id, &side_id)?;
                insert(&mut side_group_map, &group.id.clone(), group);
            }
        }

        let info = ScenarioInfo {
            name,
            start_time,
            time_zone,
            description,
            symbology_standard,
            extra,
        };

        let mut layer_ids = Vec::with_capacity(layers.len());
        let mut layer_map = EntityMap::default();
        let mut feature_map = EntityMap::default();
        for layer in layers {
            let (layer, features) = self.layer(layer)?;
            layer_ids.push(layer.id.clone());
            for feature in features {
                insert(&mut feature_map, &feature.id.clone(), feature);
            }
            insert(&mut layer_map, &layer.id.clone(), layer);
        }

        let mut map_layer_ids = Vec::with_capacity(map_layers.len());
        let mut map_layer_map = EntityMap::default();
        for map_layer in map_layers {
            let map_layer = self.map_layer(map_layer)?;
            map_layer_ids.push(map_layer.id.clone());
            insert(&mut map_layer_map, &map_layer.id.clone(), map_layer);
        }

        // Stable sort keeps input order for events sharing a start time.
        let mut event_ids: Vec<EntityId> = event_map.keys().cloned().collect();
        event_ids.sort_by_key(|id| event_map[id].start_time);

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut meta = meta.unwrap_or_default();
        meta.created_date.get_or_insert_with(|| now.clone());
        meta.last_modified_date.get_or_insert(now);

        let refs = std::mem::take(&mut self.refs);
        Ok(ScenarioState {
            id: scenario_id,
            meta: Arc::new(meta),
            info: Arc::new(info),
            map_settings: Arc::new(settings.map.unwrap_or_default()),
            sides: Arc::new(side_ids),
            side_map: Arc::new(side_map),
            side_group_map: Arc::new(side_group_map),
            unit_map: Arc::new(std::mem::take(&mut self.units)),
            layers: Arc::new(layer_ids),
            layer_map: Arc::new(layer_map),
            feature_map: Arc::new(feature_map),
            map_layers: Arc::new(map_layer_ids),
            map_layer_map: Arc::new(map_layer_map),
            events: Arc::new(event_ids),
            event_map: Arc::new(event_map),
            equipment_map: Arc::new(refs.equipment.into_map()),
            personnel_map: Arc::new(refs.personnel.into_map()),
            range_ring_group_map: Arc::new(refs.range_ring_groups.into_map()),
            unit_status_map: Arc::new(refs.unit_statuses.into_map()),
            current_time: start_time.unwrap_or(0),
            unit_state_counter: 0,
            feature_state_counter: 0,
        })
    }

    fn event(&mut self, event: ScenarioEvent) -> Result<NScenarioEvent, ScenarioLoadError> {
        let id = self.ids.ensure(event.id);
        let start_time = millis(&event.start_time, &id, "startTime")?;
        Ok(NScenarioEvent {
            id,
            title: event.title,
            sub_title: event.sub_title,
            description: event.description,
            start_time,
            extra: event.extra,
            source: EventSource::Scenario,
            pid: None,
        })
    }

    fn side_group(
        &mut self,
        group: SideGroup,
        group_id: EntityId,
        side_id: &EntityId,
    ) -> Result<NSideGroup, ScenarioLoadError> {
        let unit_ids: Vec<EntityId> = group
            .sub_units
            .iter()
            .map(|unit| self.ids.ensure(unit.id.clone()))
            .collect();
        for (unit, unit_id) in group.sub_units.into_iter().zip(&unit_ids) {
            self.unit(unit, unit_id.clone(), &group_id, &group_id, side_id)?;
        }
        Ok(NSideGroup {
            id: group_id,
            name: group.name,
            sub_units: unit_ids,
            pid: side_id.clone(),
            extra: group.extra,
        })
    }

    /// Registers the unit before its children so the map stays in pre-order.
    fn unit(
        &mut self,
        unit: Unit,
        id: EntityId,
        parent_id: &EntityId,
        group_id: &EntityId,
        side_id: &EntityId,
    ) -> Result<(), ScenarioLoadError> {
        let Unit {
            id: _,
            name,
            short_name,
            description,
            sidc,
            location,
            sub_units,
            state,
            equipment,
            personnel,
            range_rings,
            status,
            extra,
        } = unit;

        let child_ids: Vec<EntityId> = sub_units
            .iter()
            .map(|child| self.ids.ensure(child.id.clone()))
            .collect();
        let state = state
            .into_iter()
            .map(|keyframe| self.keyframe(keyframe, &id))
            .collect::<Result<Vec<_>, _>>()?;
        let equipment = equipment
            .into_iter()
            .map(|entry| ReferenceEntry {
                reference_id: self.refs.equipment_id(self.ids, &entry.name),
                count: entry.count,
            })
            .collect();
        let personnel = personnel
            .into_iter()
            .map(|entry| ReferenceEntry {
                reference_id: self.refs.personnel_id(self.ids, &entry.name),
                count: entry.count,
            })
            .collect();
        let range_rings = range_rings
            .into_iter()
            .map(|ring| self.range_ring(ring))
            .collect();
        let status = status.map(|name| self.refs.unit_status_id(self.ids, &name));

        insert(
            &mut self.units,
            &id,
            NUnit {
                id: id.clone(),
                name,
                short_name,
                description,
                sidc,
                location,
                sub_units: child_ids.clone(),
                pid: parent_id.clone(),
                gid: group_id.clone(),
                sid: side_id.clone(),
                equipment,
                personnel,
                range_rings,
                status,
                state,
                extra,
                is_open: false,
                current_state: None,
            },
        );

        for (child, child_id) in sub_units.into_iter().zip(child_ids) {
            self.unit(child, child_id, &id, group_id, side_id)?;
        }
        Ok(())
    }

    fn keyframe(&mut self, keyframe: UnitState, unit_id: &str) -> Result<StateKeyframe, ScenarioLoadError> {
        let t = millis(&keyframe.t, unit_id, "state.t")?;
        let via_start_time =
            optional_millis(keyframe.via_start_time.as_ref(), unit_id, "state.viaStartTime")?;
        let status = keyframe
            .status
            .map(|name| self.refs.unit_status_id(self.ids, &name));
        Ok(StateKeyframe {
            id: self.ids.ensure(keyframe.id),
            t,
            location: keyframe.location,
            via: keyframe.via,
            via_start_time,
            sidc: keyframe.sidc,
            status,
            title: keyframe.title,
            sub_title: keyframe.sub_title,
            description: keyframe.description,
            state_type: keyframe.state_type.map(StateType::from),
            extra: keyframe.extra,
        })
    }

    fn range_ring(&mut self, ring: RangeRing) -> NRangeRing {
        match ring.group {
            Some(group) => NRangeRing {
                name: ring.name,
                range: ring.range,
                uom: ring.uom,
                hidden: ring.hidden,
                group: Some(self.refs.range_ring_group_id(self.ids, &group)),
                style: None,
                extra: ring.extra,
            },
            None => NRangeRing {
                name: ring.name,
                range: ring.range,
                uom: ring.uom,
                hidden: ring.hidden,
                group: None,
                style: ring.style,
                extra: ring.extra,
            },
        }
    }

    fn layer(
        &mut self,
        layer: ScenarioLayer,
    ) -> Result<(NScenarioLayer, Vec<NScenarioFeature>), ScenarioLoadError> {
        let id = self.ids.ensure(layer.id);
        let visible_from_t = optional_millis(layer.visible_from_t.as_ref(), &id, "visibleFromT")?;
        let visible_until_t = optional_millis(layer.visible_until_t.as_ref(), &id, "visibleUntilT")?;
        let features = layer
            .features
            .into_iter()
            .map(|feature| self.feature(feature, &id))
            .collect::<Result<Vec<_>, _>>()?;
        let normalized = NScenarioLayer {
            id,
            name: layer.name,
            description: layer.description,
            features: features.iter().map(|feature| feature.id.clone()).collect(),
            is_hidden: layer.is_hidden,
            visible_from_t,
            visible_until_t,
            extra: layer.extra,
            hidden: false,
        };
        Ok((normalized, features))
    }

    fn feature(
        &mut self,
        feature: ScenarioFeature,
        layer_id: &EntityId,
    ) -> Result<NScenarioFeature, ScenarioLoadError> {
        let id = self.ids.ensure(feature.id);
        let meta = feature.meta;
        let visible_from_t = optional_millis(meta.visible_from_t.as_ref(), &id, "meta.visibleFromT")?;
        let visible_until_t =
            optional_millis(meta.visible_until_t.as_ref(), &id, "meta.visibleUntilT")?;
        let state = feature
            .state
            .into_iter()
            .map(|keyframe| self.feature_keyframe(keyframe, &id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NScenarioFeature {
            id,
            kind: feature.kind,
            geometry: feature.geometry,
            properties: feature.properties,
            meta: NFeatureMeta {
                geometry_type: meta.geometry_type,
                name: meta.name,
                description: meta.description,
                radius: meta.radius,
                visible_from_t,
                visible_until_t,
                extra: meta.extra,
            },
            style: feature.style,
            state,
            extra: feature.extra,
            pid: layer_id.clone(),
            hidden: false,
        })
    }

    fn feature_keyframe(
        &mut self,
        keyframe: FeatureState,
        feature_id: &str,
    ) -> Result<NFeatureState, ScenarioLoadError> {
        Ok(NFeatureState {
            t: millis(&keyframe.t, feature_id, "state.t")?,
            id: self.ids.ensure(keyframe.id),
            geometry: keyframe.geometry,
            extra: keyframe.extra,
        })
    }

    fn map_layer(&mut self, layer: ScenarioMapLayer) -> Result<NScenarioMapLayer, ScenarioLoadError> {
        let id = self.ids.ensure(layer.id);
        let visible_from_t = optional_millis(layer.visible_from_t.as_ref(), &id, "visibleFromT")?;
        let visible_until_t = optional_millis(layer.visible_until_t.as_ref(), &id, "visibleUntilT")?;
        Ok(NScenarioMapLayer {
            id,
            kind: layer.kind,
            name: layer.name,
            url: layer.url,
            opacity: layer.opacity,
            is_hidden: layer.is_hidden,
            visible_from_t,
            visible_until_t,
            extra: layer.extra,
        })
    }
}

/// Reserve every explicit id in the document and reject duplicates.
///
/// Runs before any id is generated so fresh ids never collide with ids that
/// appear later in the document.
fn reserve_document_ids(scenario: &Scenario, ids: &mut IdGenerator) -> Result<(), MalformedScenarioError> {
    let mut claim = |kind: EntityKind, id: &Option<EntityId>| match id {
        Some(id) if !id.is_empty() && !ids.reserve(id) => Err(MalformedScenarioError::DuplicateId {
            kind,
            id: id.clone(),
        }),
        _ => Ok(()),
    };

    fn walk_units<F>(units: &[Unit], claim: &mut F) -> Result<(), MalformedScenarioError>
    where
        F: FnMut(EntityKind, &Option<EntityId>) -> Result<(), MalformedScenarioError>,
    {
        for unit in units {
            claim(EntityKind::Unit, &unit.id)?;
            walk_units(&unit.sub_units, claim)?;
        }
        Ok(())
    }

    for side in &scenario.sides {
        claim(EntityKind::Side, &side.id)?;
        for group in &side.groups {
            claim(EntityKind::SideGroup, &group.id)?;
            walk_units(&group.sub_units, &mut claim)?;
        }
    }
    for layer in &scenario.layers {
        claim(EntityKind::Layer, &layer.id)?;
        for feature in &layer.features {
            claim(EntityKind::Feature, &feature.id)?;
        }
    }
    for map_layer in &scenario.map_layers {
        claim(EntityKind::MapLayer, &map_layer.id)?;
    }
    for event in &scenario.events {
        claim(EntityKind::Event, &event.id)?;
    }
    Ok(())
}

/// Normalize, optionally validate, and wrap a document in a projected store.
pub fn load_scenario(
    scenario: Scenario,
    config: Arc<StoreConfig>,
) -> Result<ScenarioStore, ScenarioLoadError> {
    let mut ids = IdGenerator::new(config.id_length);
    let state = normalize(scenario, &mut ids)?;
    if config.validate_on_load {
        validate_state(&state)?;
    }
    Ok(ScenarioStore::new(state, ids, config))
}

pub fn load_scenario_str(
    json: &str,
    config: Arc<StoreConfig>,
) -> Result<ScenarioStore, ScenarioLoadError> {
    load_scenario(Scenario::from_json_str(json)?, config)
}

pub fn load_scenario_file(
    path: &Path,
    config: Arc<StoreConfig>,
) -> Result<ScenarioStore, ScenarioLoadError> {
    let scenario = Scenario::from_file(path)?;
    tracing::debug!(target: "orbat::normalize", path = %path.display(), "scenario.read");
    load_scenario(scenario, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_json(document: Value) -> ScenarioState {
        let mut ids = IdGenerator::seeded(42);
        normalize_value(document, &mut ids).expect("scenario should normalize")
    }

    fn sample() -> Value {
        json!({
            "name": "Exercise",
            "version": "2.0.0",
            "startTime": "2024-05-01T06:00:00Z",
            "equipment": [{ "name": "Rifle", "description": "canonical" }],
            "settings": { "statuses": [{ "name": "Ready" }] },
            "sides": [{
                "id": "blue",
                "name": "Blue",
                "groups": [{
                    "id": "army",
                    "name": "Army",
                    "subUnits": [
                        {
                            "id": "bde",
                            "name": "1 Bde",
                            "sidc": "10031000001211000000",
                            "equipment": [{ "name": "Rifle", "count": 10 }],
                            "status": "Ready",
                            "subUnits": [
                                {
                                    "name": "1 Bn",
                                    "sidc": "10031000001211000000",
                                    "equipment": [{ "name": "Rifle", "count": 3 }],
                                    "state": [
                                        { "t": "2024-05-01T08:00:00Z", "location": [1, 2], "status": "Damaged" }
                                    ]
                                }
                            ]
                        }
                    ]
                }]
            }],
            "layers": [{
                "name": "Obstacles",
                "visibleFromT": 10,
                "features": [{
                    "geometry": { "type": "Point", "coordinates": [1, 1] },
                    "meta": { "type": "Point", "visibleUntilT": "1970-01-01T00:00:00.020Z" },
                    "state": [{ "t": 5 }]
                }]
            }],
            "events": [
                { "id": "late", "title": "Late", "startTime": 300 },
                { "id": "early", "title": "Early", "startTime": 100 },
                { "id": "tie", "title": "Tie", "startTime": 100 }
            ]
        })
    }

    #[test]
    fn flattens_hierarchy_with_back_references() {
        let state = normalize_json(sample());
        assert_eq!(state.sides.as_slice(), ["blue".to_string()]);
        let group = state.get_side_group_by_id("army").expect("group");
        assert_eq!(group.pid, "blue");
        assert_eq!(group.sub_units, vec!["bde".to_string()]);

        let bde = state.get_unit_by_id("bde").expect("brigade");
        assert_eq!(bde.pid, "army");
        assert_eq!(bde.sub_units.len(), 1);
        let bn = state.get_unit_by_id(&bde.sub_units[0]).expect("battalion");
        assert_eq!(bn.pid, "bde");
        assert_eq!(bn.gid, "army");
        assert_eq!(bn.sid, "blue");
        assert!(!bn.is_open);
        assert!(bn.current_state.is_none());

        let order: Vec<&str> = state.unit_map.keys().map(String::as_str).collect();
        assert_eq!(order[0], "bde");
    }

    #[test]
    fn reference_data_is_deduplicated_by_name() {
        let state = normalize_json(sample());
        assert_eq!(state.equipment_map.len(), 1);
        let (rifle_id, rifle) = state.equipment_map.first().expect("rifle");
        assert_eq!(rifle.description.as_deref(), Some("canonical"));

        let bde = state.get_unit_by_id("bde").expect("brigade");
        let bn = state.get_unit_by_id(&bde.sub_units[0]).expect("battalion");
        assert_eq!(bde.equipment[0].reference_id, *rifle_id);
        assert_eq!(bn.equipment[0].reference_id, *rifle_id);
        assert_eq!((bde.equipment[0].count, bn.equipment[0].count), (10, 3));

        let ready = state.unit_status_map.values().find(|s| s.name == "Ready").expect("ready");
        assert_eq!(bde.status.as_ref(), Some(&ready.id));
        let damaged = bn.state[0].status.as_ref().expect("keyframe status");
        assert_eq!(state.unit_status_map[damaged].name, "Damaged");
    }

    #[test]
    fn timestamps_become_epoch_millis() {
        let state = normalize_json(sample());
        let start = orbat_schema::parse_timestamp("2024-05-01T06:00:00Z").expect("start");
        assert_eq!(state.info.start_time, Some(start));
        assert_eq!(state.current_time, start);

        let bde = state.get_unit_by_id("bde").expect("brigade");
        let bn = state.get_unit_by_id(&bde.sub_units[0]).expect("battalion");
        assert_eq!(bn.state[0].t, start + 2 * 3_600_000);
        assert!(!bn.state[0].id.is_empty());

        let layer = state.get_layer_by_id(&state.layers[0]).expect("layer");
        assert_eq!(layer.visible_from_t, Some(10));
        let feature = state.get_feature_by_id(&layer.features[0]).expect("feature");
        assert_eq!(feature.meta.visible_until_t, Some(20));
        assert_eq!(feature.pid, layer.id);
        assert_eq!(feature.state[0].t, 5);
    }

    #[test]
    fn events_sort_stably_by_start_time() {
        let state = normalize_json(sample());
        assert_eq!(state.events.as_slice(), ["early", "tie", "late"].map(String::from));
        assert!(state
            .event_map
            .values()
            .all(|event| event.source == EventSource::Scenario));
    }

    #[test]
    fn defaults_fill_missing_metadata() {
        let state = normalize_json(json!({ "name": "Empty", "version": "2.0.0" }));
        assert!(!state.id.is_empty());
        assert_eq!(state.current_time, 0);
        assert_eq!(state.map_settings.base_map_id, "osm");
        assert!(state.meta.created_date.is_some());
        assert!(state.meta.last_modified_date.is_some());
    }

    #[test]
    fn range_ring_groups_replace_inline_style() {
        let state = normalize_json(json!({
            "name": "Rings",
            "version": "2.0.0",
            "sides": [{ "name": "Red", "groups": [{ "name": "G", "subUnits": [{
                "name": "Arty",
                "sidc": "x",
                "rangeRings": [
                    { "name": "Max", "range": 30, "group": "Fires", "style": { "stroke": "red" } },
                    { "name": "Min", "range": 5, "style": { "stroke": "blue" } }
                ]
            }] }] }]
        }));
        let unit = state.unit_map.values().next().expect("unit");
        let group_id = unit.range_rings[0].group.as_ref().expect("group id");
        assert_eq!(state.range_ring_group_map[group_id].name, "Fires");
        assert!(unit.range_rings[0].style.is_none());
        assert!(unit.range_rings[1].style.is_some());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut ids = IdGenerator::seeded(1);
        let err = normalize_value(
            json!({
                "name": "Dup",
                "version": "2.0.0",
                "sides": [{ "id": "x", "name": "A", "groups": [{ "id": "x", "name": "B" }] }]
            }),
            &mut ids,
        )
        .expect_err("duplicate");
        match err {
            ScenarioLoadError::Malformed(inner) => assert_eq!(inner.entity_id(), "x"),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn bad_timestamp_names_the_field() {
        let mut ids = IdGenerator::seeded(1);
        let err = normalize_value(
            json!({ "name": "Bad", "version": "2.0.0", "events": [{ "id": "e", "title": "E", "startTime": "soon" }] }),
            &mut ids,
        )
        .expect_err("bad timestamp");
        let message = err.to_string();
        assert!(message.contains("startTime"), "{message}");
        assert!(message.contains('e'), "{message}");
    }

    #[test]
    fn legacy_documents_are_upgraded() {
        let state = normalize_json(json!({
            "name": "Legacy",
            "sides": [{ "name": "Blue", "groups": [{ "name": "G", "units": [{ "name": "Old", "sidc": "x" }] }] }]
        }));
        assert_eq!(state.unit_map.len(), 1);
    }
}
