//! Typed mutations built on [`ScenarioStore::apply`].
//!
//! Each edit runs as a single transaction under its own [`ActionLabel`]. An
//! unknown id aborts the transaction with a [`LookupError`] and leaves the
//! store untouched.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};

use crate::model::{
    EntityId, EntityKind, LookupError, NFeatureMeta, NScenarioFeature, NScenarioLayer, Position,
    ScenarioState, StateKeyframe,
};
use crate::store::{ActionLabel, ApplyOptions, ScenarioStore, TransactionError};

/// Fields of a unit that can be changed in place; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UnitUpdate {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub sidc: Option<String>,
    pub location: Option<Position>,
    pub status: Option<EntityId>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_hidden: Option<bool>,
    pub visible_from_t: Option<i64>,
    pub visible_until_t: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewFeature {
    pub geometry: Value,
    pub properties: JsonMap<String, Value>,
    pub meta: NFeatureMeta,
    pub style: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureUpdate {
    pub geometry: Option<Value>,
    pub properties: Option<JsonMap<String, Value>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub visible_from_t: Option<i64>,
    pub visible_until_t: Option<i64>,
    pub style: Option<Value>,
}

fn missing(kind: EntityKind, id: &str) -> LookupError {
    LookupError::new(kind, id)
}

fn unwrap_lookup<T>(result: Result<T, TransactionError<LookupError>>) -> Result<T, LookupError> {
    result.map_err(TransactionError::into_inner)
}

/// Move `id` to `index` within `order`, clamping to the end.
fn reorder(order: &mut Vec<EntityId>, id: &str, index: usize) -> bool {
    let Some(from) = order.iter().position(|existing| existing == id) else {
        return false;
    };
    let moved = order.remove(from);
    order.insert(index.min(order.len()), moved);
    true
}

impl ScenarioStore {
    pub fn update_unit(&mut self, unit_id: &str, update: UnitUpdate) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::UpdateUnit, |draft| {
            if let Some(status) = &update.status {
                if !draft.unit_status_map.contains_key(status) {
                    return Err(missing(EntityKind::UnitStatus, status));
                }
            }
            let unit = draft
                .unit_mut(unit_id)
                .ok_or_else(|| missing(EntityKind::Unit, unit_id))?;
            let UnitUpdate {
                name,
                short_name,
                description,
                sidc,
                location,
                status,
            } = update;
            if let Some(name) = name {
                unit.name = name;
            }
            if short_name.is_some() {
                unit.short_name = short_name;
            }
            if description.is_some() {
                unit.description = description;
            }
            if let Some(sidc) = sidc {
                unit.sidc = sidc;
            }
            if location.is_some() {
                unit.location = location;
            }
            if status.is_some() {
                unit.status = status;
            }
            Ok(())
        }))
    }

    /// Record a position at `t`, replacing the location of an existing keyframe at the same instant.
    ///
    /// Returns the id of the keyframe that now holds the position.
    pub fn add_unit_position(
        &mut self,
        unit_id: &str,
        location: Position,
        t: i64,
    ) -> Result<EntityId, LookupError> {
        let fresh_id = self.ids_mut().next_id();
        unwrap_lookup(self.apply(ActionLabel::AddUnitPosition, |draft| {
            let unit = draft
                .unit_mut(unit_id)
                .ok_or_else(|| missing(EntityKind::Unit, unit_id))?;
            let keyframe_id = match unit.state.iter_mut().find(|keyframe| keyframe.t == t) {
                Some(existing) => {
                    existing.location = Some(location);
                    existing.id.clone()
                }
                None => {
                    let index = unit.state.partition_point(|keyframe| keyframe.t < t);
                    unit.state.insert(
                        index,
                        StateKeyframe {
                            id: fresh_id.clone(),
                            t,
                            location: Some(location),
                            ..StateKeyframe::default()
                        },
                    );
                    fresh_id
                }
            };
            draft.unit_state_counter += 1;
            Ok(keyframe_id)
        }))
    }

    pub fn clear_unit_state(&mut self, unit_id: &str) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::ClearUnitState, |draft| {
            let unit = draft
                .unit_mut(unit_id)
                .ok_or_else(|| missing(EntityKind::Unit, unit_id))?;
            unit.state.clear();
            draft.unit_state_counter += 1;
            Ok(())
        }))
    }

    /// Remove a side with all of its groups and every unit beneath them.
    pub fn delete_side(&mut self, side_id: &str) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::DeleteSide, |draft| {
            let side = draft.get_side_by_id(side_id)?.clone();
            let unit_ids = draft.side_unit_ids(side_id);

            let units = Arc::make_mut(&mut draft.unit_map);
            for id in &unit_ids {
                units.shift_remove(id);
            }
            let groups = Arc::make_mut(&mut draft.side_group_map);
            for id in &side.groups {
                groups.shift_remove(id);
            }
            Arc::make_mut(&mut draft.side_map).shift_remove(side_id);
            Arc::make_mut(&mut draft.sides).retain(|id| id != side_id);
            tracing::debug!(
                target: "orbat::store",
                side = side_id,
                groups = side.groups.len(),
                units = unit_ids.len(),
                "side.deleted"
            );
            Ok(())
        }))
    }

    pub fn add_layer(&mut self, name: &str) -> Result<EntityId, LookupError> {
        let id = self.ids_mut().next_id();
        unwrap_lookup(self.apply(ActionLabel::AddLayer, |draft| {
            Arc::make_mut(&mut draft.layer_map).insert(
                id.clone(),
                Arc::new(NScenarioLayer {
                    id: id.clone(),
                    name: name.to_string(),
                    ..NScenarioLayer::default()
                }),
            );
            Arc::make_mut(&mut draft.layers).push(id.clone());
            Ok(id)
        }))
    }

    /// Update a layer; pass `undoable = false` for transient visibility sync.
    pub fn update_layer(
        &mut self,
        layer_id: &str,
        update: LayerUpdate,
        undoable: bool,
    ) -> Result<(), LookupError> {
        let options = if undoable {
            ApplyOptions::default()
        } else {
            ApplyOptions::transient()
        };
        unwrap_lookup(self.apply_with(ActionLabel::UpdateLayer, options, |draft| {
            let layer = draft
                .layer_mut(layer_id)
                .ok_or_else(|| missing(EntityKind::Layer, layer_id))?;
            if let Some(name) = update.name {
                layer.name = name;
            }
            if update.description.is_some() {
                layer.description = update.description;
            }
            if update.is_hidden.is_some() {
                layer.is_hidden = update.is_hidden;
            }
            if update.visible_from_t.is_some() {
                layer.visible_from_t = update.visible_from_t;
            }
            if update.visible_until_t.is_some() {
                layer.visible_until_t = update.visible_until_t;
            }
            Ok(())
        }))
    }

    pub fn move_layer(&mut self, layer_id: &str, index: usize) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::MoveLayer, |draft| {
            if !reorder(Arc::make_mut(&mut draft.layers), layer_id, index) {
                return Err(missing(EntityKind::Layer, layer_id));
            }
            Ok(())
        }))
    }

    /// Remove a layer and the features it owns.
    pub fn delete_layer(&mut self, layer_id: &str) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::DeleteLayer, |draft| {
            let layer = draft.get_layer_by_id(layer_id)?.clone();
            let features = Arc::make_mut(&mut draft.feature_map);
            for feature_id in &layer.features {
                features.shift_remove(feature_id);
            }
            Arc::make_mut(&mut draft.layer_map).shift_remove(layer_id);
            Arc::make_mut(&mut draft.layers).retain(|id| id != layer_id);
            Ok(())
        }))
    }

    pub fn add_feature(&mut self, layer_id: &str, feature: NewFeature) -> Result<EntityId, LookupError> {
        let id = self.ids_mut().next_id();
        unwrap_lookup(self.apply(ActionLabel::AddFeature, |draft| {
            let layer = draft
                .layer_mut(layer_id)
                .ok_or_else(|| missing(EntityKind::Layer, layer_id))?;
            layer.features.push(id.clone());
            Arc::make_mut(&mut draft.feature_map).insert(
                id.clone(),
                Arc::new(NScenarioFeature {
                    id: id.clone(),
                    kind: "Feature".to_string(),
                    geometry: feature.geometry,
                    properties: feature.properties,
                    meta: feature.meta,
                    style: feature.style,
                    pid: layer_id.to_string(),
                    ..NScenarioFeature::default()
                }),
            );
            Ok(id)
        }))
    }

    pub fn update_feature(&mut self, feature_id: &str, update: FeatureUpdate) -> Result<(), LookupError> {
        let label = if update.geometry.is_some() && update == geometry_only(&update) {
            ActionLabel::UpdateFeatureGeometry
        } else {
            ActionLabel::UpdateFeature
        };
        unwrap_lookup(self.apply(label, |draft| {
            let feature = draft
                .feature_mut(feature_id)
                .ok_or_else(|| missing(EntityKind::Feature, feature_id))?;
            let FeatureUpdate {
                geometry,
                properties,
                name,
                description,
                visible_from_t,
                visible_until_t,
                style,
            } = update;
            if let Some(geometry) = geometry {
                feature.geometry = geometry;
            }
            if let Some(properties) = properties {
                feature.properties = properties;
            }
            if name.is_some() {
                feature.meta.name = name;
            }
            if description.is_some() {
                feature.meta.description = description;
            }
            if visible_from_t.is_some() {
                feature.meta.visible_from_t = visible_from_t;
            }
            if visible_until_t.is_some() {
                feature.meta.visible_until_t = visible_until_t;
            }
            if style.is_some() {
                feature.style = style;
            }
            Ok(())
        }))
    }

    pub fn delete_feature(&mut self, feature_id: &str) -> Result<(), LookupError> {
        unwrap_lookup(self.apply(ActionLabel::DeleteFeature, |draft| {
            let layer_id = draft.get_feature_by_id(feature_id)?.pid.clone();
            if let Some(layer) = draft.layer_mut(&layer_id) {
                layer.features.retain(|id| id != feature_id);
            }
            Arc::make_mut(&mut draft.feature_map).shift_remove(feature_id);
            Ok(())
        }))
    }
}

fn geometry_only(update: &FeatureUpdate) -> FeatureUpdate {
    FeatureUpdate {
        geometry: update.geometry.clone(),
        ..FeatureUpdate::default()
    }
}

impl ScenarioState {
    /// Ids of every unit under a side, in pre-order.
    pub fn side_unit_ids(&self, side_id: &str) -> Vec<EntityId> {
        let mut ids = Vec::new();
        self.walk_side(side_id, |unit, _, _, _| ids.push(unit.id.clone()));
        ids
    }
}
