//! Normalized scenario entities and the root [`ScenarioState`].
//!
//! Every entity lives in exactly one id-keyed map owned by the root. Maps and
//! entries are held behind `Arc` so a transaction can copy-on-write only the
//! paths it touches; untouched entries keep their identity across revisions.
//! Fields prefixed with `_` in serialized form (`_pid`, `_state`, ...) are
//! back-references or derived values and never appear in exported documents.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value};
use thiserror::Error;

pub use orbat_schema::{EntityId, MapSettings, Position, ScenarioMetadata};

/// Id-keyed entity table preserving insertion order.
pub type EntityMap<T> = IndexMap<EntityId, Arc<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Unit,
    Side,
    SideGroup,
    Layer,
    Feature,
    MapLayer,
    Event,
    Equipment,
    Personnel,
    RangeRingGroup,
    UnitStatus,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Unit => "unit",
            EntityKind::Side => "side",
            EntityKind::SideGroup => "side group",
            EntityKind::Layer => "layer",
            EntityKind::Feature => "feature",
            EntityKind::MapLayer => "map layer",
            EntityKind::Event => "event",
            EntityKind::Equipment => "equipment",
            EntityKind::Personnel => "personnel",
            EntityKind::RangeRingGroup => "range ring group",
            EntityKind::UnitStatus => "unit status",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {id} not found")]
pub struct LookupError {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl LookupError {
    pub fn new(kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }
}

/// Origin of a projected state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateType {
    /// Synthesized from a unit's static starting location.
    Initial,
    /// Location computed between two keyframes.
    Interpolated,
    Other(String),
}

impl From<String> for StateType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "initial" => StateType::Initial,
            "interpolated" => StateType::Interpolated,
            _ => StateType::Other(value),
        }
    }
}

impl From<StateType> for String {
    fn from(value: StateType) -> Self {
        match value {
            StateType::Initial => "initial".to_string(),
            StateType::Interpolated => "interpolated".to_string(),
            StateType::Other(other) => other,
        }
    }
}

/// A unit keyframe after normalization: numeric `t`, id assigned, status resolved to an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateKeyframe {
    pub id: EntityId,
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Vec<Position>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub state_type: Option<StateType>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Derived state of a unit at the last projected instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub state_type: Option<StateType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Vec<Position>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_start_time: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl CurrentState {
    pub fn initial(t: i64, location: Position, sidc: &str) -> Self {
        Self {
            t,
            location: Some(location),
            state_type: Some(StateType::Initial),
            sidc: Some(sidc.to_string()),
            ..Self::default()
        }
    }

    pub fn from_keyframe(keyframe: &StateKeyframe) -> Self {
        let mut state = Self::default();
        state.merge(keyframe);
        state
    }

    /// Field-wise merge where every field set on `keyframe` wins.
    pub fn merge(&mut self, keyframe: &StateKeyframe) {
        self.id = Some(keyframe.id.clone());
        self.t = keyframe.t;
        overwrite(&mut self.location, &keyframe.location);
        overwrite(&mut self.via, &keyframe.via);
        overwrite(&mut self.via_start_time, &keyframe.via_start_time);
        overwrite(&mut self.sidc, &keyframe.sidc);
        overwrite(&mut self.status, &keyframe.status);
        overwrite(&mut self.title, &keyframe.title);
        overwrite(&mut self.sub_title, &keyframe.sub_title);
        overwrite(&mut self.description, &keyframe.description);
        overwrite(&mut self.state_type, &keyframe.state_type);
        for (key, value) in &keyframe.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }
}

fn overwrite<T: Clone>(slot: &mut Option<T>, update: &Option<T>) {
    if let Some(value) = update {
        *slot = Some(value.clone());
    }
}

/// `{referenceId, count}` pointing into a reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub reference_id: EntityId,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NRangeRing {
    pub name: String,
    pub range: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NUnit {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sidc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Position>,
    pub sub_units: Vec<EntityId>,
    /// Parent unit or side group.
    #[serde(rename = "_pid")]
    pub pid: EntityId,
    #[serde(rename = "_gid")]
    pub gid: EntityId,
    #[serde(rename = "_sid")]
    pub sid: EntityId,
    pub equipment: Vec<ReferenceEntry>,
    pub personnel: Vec<ReferenceEntry>,
    pub range_rings: Vec<NRangeRing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntityId>,
    pub state: Vec<StateKeyframe>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    #[serde(rename = "_isOpen")]
    pub is_open: bool,
    #[serde(rename = "_state")]
    pub current_state: Option<CurrentState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NSide {
    pub id: EntityId,
    pub name: String,
    pub groups: Vec<EntityId>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NSideGroup {
    pub id: EntityId,
    pub name: String,
    pub sub_units: Vec<EntityId>,
    #[serde(rename = "_pid")]
    pub pid: EntityId,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NScenarioLayer {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub features: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_from_t: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_until_t: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    #[serde(rename = "_hidden")]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NFeatureMeta {
    #[serde(rename = "type")]
    pub geometry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_from_t: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_until_t: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NFeatureState {
    pub id: EntityId,
    pub t: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NScenarioFeature {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: Value,
    pub properties: JsonMap<String, Value>,
    pub meta: NFeatureMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    pub state: Vec<NFeatureState>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    #[serde(rename = "_pid")]
    pub pid: EntityId,
    #[serde(rename = "_hidden")]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NScenarioMapLayer {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_from_t: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible_until_t: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Scenario,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NScenarioEvent {
    pub id: EntityId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
    #[serde(rename = "_type")]
    pub source: EventSource,
    /// Owning unit for events lifted from keyframes.
    #[serde(rename = "_pid", skip_serializing_if = "Option::is_none")]
    pub pid: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NEquipmentData {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NPersonnelData {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NRangeRingGroup {
    pub id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NUnitStatus {
    pub id: EntityId,
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbology_standard: Option<String>,
    /// Unrecognised top-level document fields, kept for export.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The single root value owned by the transaction store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioState {
    pub id: EntityId,
    pub meta: Arc<ScenarioMetadata>,
    pub info: Arc<ScenarioInfo>,
    pub map_settings: Arc<MapSettings>,
    pub sides: Arc<Vec<EntityId>>,
    pub side_map: Arc<EntityMap<NSide>>,
    pub side_group_map: Arc<EntityMap<NSideGroup>>,
    pub unit_map: Arc<EntityMap<NUnit>>,
    pub layers: Arc<Vec<EntityId>>,
    pub layer_map: Arc<EntityMap<NScenarioLayer>>,
    pub feature_map: Arc<EntityMap<NScenarioFeature>>,
    pub map_layers: Arc<Vec<EntityId>>,
    pub map_layer_map: Arc<EntityMap<NScenarioMapLayer>>,
    /// Scenario events ordered by ascending `startTime`, ties in input order.
    pub events: Arc<Vec<EntityId>>,
    pub event_map: Arc<EntityMap<NScenarioEvent>>,
    pub equipment_map: Arc<EntityMap<NEquipmentData>>,
    pub personnel_map: Arc<EntityMap<NPersonnelData>>,
    pub range_ring_group_map: Arc<EntityMap<NRangeRingGroup>>,
    pub unit_status_map: Arc<EntityMap<NUnitStatus>>,
    pub current_time: i64,
    pub unit_state_counter: u64,
    pub feature_state_counter: u64,
}

fn lookup<'a, T>(
    map: &'a EntityMap<T>,
    kind: EntityKind,
    id: &str,
) -> Result<&'a T, LookupError> {
    map.get(id)
        .map(|entry| entry.as_ref())
        .ok_or_else(|| LookupError::new(kind, id))
}

/// Copy-on-write access to one entry; the map is only cloned when the id exists.
fn entry_mut<'a, T: Clone>(map: &'a mut Arc<EntityMap<T>>, id: &str) -> Option<&'a mut T> {
    if !map.contains_key(id) {
        return None;
    }
    Arc::make_mut(map).get_mut(id).map(Arc::make_mut)
}

impl ScenarioState {
    pub fn unit(&self, id: &str) -> Option<&NUnit> {
        self.unit_map.get(id).map(Arc::as_ref)
    }

    pub fn get_unit_by_id(&self, id: &str) -> Result<&NUnit, LookupError> {
        lookup(&self.unit_map, EntityKind::Unit, id)
    }

    pub fn get_side_by_id(&self, id: &str) -> Result<&NSide, LookupError> {
        lookup(&self.side_map, EntityKind::Side, id)
    }

    pub fn get_side_group_by_id(&self, id: &str) -> Result<&NSideGroup, LookupError> {
        lookup(&self.side_group_map, EntityKind::SideGroup, id)
    }

    pub fn get_layer_by_id(&self, id: &str) -> Result<&NScenarioLayer, LookupError> {
        lookup(&self.layer_map, EntityKind::Layer, id)
    }

    pub fn get_feature_by_id(&self, id: &str) -> Result<&NScenarioFeature, LookupError> {
        lookup(&self.feature_map, EntityKind::Feature, id)
    }

    pub fn get_map_layer_by_id(&self, id: &str) -> Result<&NScenarioMapLayer, LookupError> {
        lookup(&self.map_layer_map, EntityKind::MapLayer, id)
    }

    pub fn unit_mut(&mut self, id: &str) -> Option<&mut NUnit> {
        entry_mut(&mut self.unit_map, id)
    }

    pub fn side_mut(&mut self, id: &str) -> Option<&mut NSide> {
        entry_mut(&mut self.side_map, id)
    }

    pub fn side_group_mut(&mut self, id: &str) -> Option<&mut NSideGroup> {
        entry_mut(&mut self.side_group_map, id)
    }

    pub fn layer_mut(&mut self, id: &str) -> Option<&mut NScenarioLayer> {
        entry_mut(&mut self.layer_map, id)
    }

    pub fn feature_mut(&mut self, id: &str) -> Option<&mut NScenarioFeature> {
        entry_mut(&mut self.feature_map, id)
    }

    /// Depth-first, pre-order walk over every unit under a side.
    ///
    /// The callback receives the unit, its depth (0 for side-group members),
    /// its group and its side. Ids that do not resolve are skipped.
    pub fn walk_side<F>(&self, side_id: &str, mut visit: F)
    where
        F: FnMut(&NUnit, usize, &NSideGroup, &NSide),
    {
        let Some(side) = self.side_map.get(side_id) else {
            return;
        };
        for group_id in &side.groups {
            let Some(group) = self.side_group_map.get(group_id) else {
                continue;
            };
            for unit_id in &group.sub_units {
                self.walk_unit(unit_id, 0, group, side, &mut visit);
            }
        }
    }

    fn walk_unit<F>(&self, unit_id: &str, level: usize, group: &NSideGroup, side: &NSide, visit: &mut F)
    where
        F: FnMut(&NUnit, usize, &NSideGroup, &NSide),
    {
        let Some(unit) = self.unit_map.get(unit_id) else {
            return;
        };
        visit(unit, level, group, side);
        for child in &unit.sub_units {
            self.walk_unit(child, level + 1, group, side, visit);
        }
    }
}
