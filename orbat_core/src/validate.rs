use std::collections::HashMap;

use thiserror::Error;

use crate::model::{EntityId, EntityKind, ScenarioState};

/// Structural breakage in a normalized scenario, naming the offending entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedScenarioError {
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: EntityKind, id: EntityId },
    #[error("{parent_kind} {parent} lists missing child {child}")]
    DanglingChild {
        parent_kind: EntityKind,
        parent: EntityId,
        child: EntityId,
    },
    #[error("{kind} {id} points at parent {parent} which does not own it")]
    MissingParent {
        kind: EntityKind,
        id: EntityId,
        parent: EntityId,
    },
    #[error("{kind} {id} is not owned by any parent")]
    Orphaned { kind: EntityKind, id: EntityId },
    #[error("{kind} {id} is owned by more than one parent")]
    MultipleParents { kind: EntityKind, id: EntityId },
    #[error("{id} references unknown {table} {reference}")]
    DanglingReference {
        id: EntityId,
        table: EntityKind,
        reference: EntityId,
    },
    #[error("ordering of {kind} lists missing id {id}")]
    DanglingOrder { kind: EntityKind, id: EntityId },
}

impl MalformedScenarioError {
    pub fn entity_id(&self) -> &str {
        match self {
            MalformedScenarioError::DuplicateId { id, .. }
            | MalformedScenarioError::MissingParent { id, .. }
            | MalformedScenarioError::Orphaned { id, .. }
            | MalformedScenarioError::MultipleParents { id, .. }
            | MalformedScenarioError::DanglingReference { id, .. }
            | MalformedScenarioError::DanglingOrder { id, .. } => id,
            MalformedScenarioError::DanglingChild { child, .. } => child,
        }
    }
}

/// Check referential integrity of a normalized state.
///
/// Verifies ordering arrays, child lists, back-references (`_pid`, `_gid`,
/// `_sid`), single ownership of every unit and feature, and every id that
/// points into a reference table.
pub fn validate_state(state: &ScenarioState) -> Result<(), MalformedScenarioError> {
    check_order(&state.sides, EntityKind::Side, |id| state.side_map.contains_key(id))?;
    check_order(&state.layers, EntityKind::Layer, |id| state.layer_map.contains_key(id))?;
    check_order(&state.events, EntityKind::Event, |id| state.event_map.contains_key(id))?;
    check_order(&state.map_layers, EntityKind::MapLayer, |id| {
        state.map_layer_map.contains_key(id)
    })?;

    let mut unit_owners: HashMap<&str, usize> = HashMap::new();
    let mut group_owners: HashMap<&str, usize> = HashMap::new();

    for side in state.side_map.values() {
        for group_id in &side.groups {
            let group = state.side_group_map.get(group_id).ok_or_else(|| {
                MalformedScenarioError::DanglingChild {
                    parent_kind: EntityKind::Side,
                    parent: side.id.clone(),
                    child: group_id.clone(),
                }
            })?;
            if group.pid != side.id {
                return Err(MalformedScenarioError::MissingParent {
                    kind: EntityKind::SideGroup,
                    id: group.id.clone(),
                    parent: group.pid.clone(),
                });
            }
            *group_owners.entry(group_id.as_str()).or_default() += 1;
            for unit_id in &group.sub_units {
                *unit_owners.entry(unit_id.as_str()).or_default() += 1;
                check_unit_parent(state, unit_id, &group.id, EntityKind::SideGroup)?;
            }
        }
    }

    for unit in state.unit_map.values() {
        for child in &unit.sub_units {
            *unit_owners.entry(child.as_str()).or_default() += 1;
            check_unit_parent(state, child, &unit.id, EntityKind::Unit)?;
        }
        let group = state.side_group_map.get(&unit.gid);
        if group.is_none() || !state.side_map.contains_key(&unit.sid) {
            return Err(MalformedScenarioError::MissingParent {
                kind: EntityKind::Unit,
                id: unit.id.clone(),
                parent: unit.gid.clone(),
            });
        }
        check_unit_references(state, unit)?;
    }

    check_single_owner(state.side_group_map.keys(), &group_owners, EntityKind::SideGroup)?;
    check_single_owner(state.unit_map.keys(), &unit_owners, EntityKind::Unit)?;

    let mut feature_owners: HashMap<&str, usize> = HashMap::new();
    for layer in state.layer_map.values() {
        for feature_id in &layer.features {
            let feature = state.feature_map.get(feature_id).ok_or_else(|| {
                MalformedScenarioError::DanglingChild {
                    parent_kind: EntityKind::Layer,
                    parent: layer.id.clone(),
                    child: feature_id.clone(),
                }
            })?;
            if feature.pid != layer.id {
                return Err(MalformedScenarioError::MissingParent {
                    kind: EntityKind::Feature,
                    id: feature.id.clone(),
                    parent: feature.pid.clone(),
                });
            }
            *feature_owners.entry(feature_id.as_str()).or_default() += 1;
        }
    }
    check_single_owner(state.feature_map.keys(), &feature_owners, EntityKind::Feature)?;

    Ok(())
}

fn check_order<F>(order: &[EntityId], kind: EntityKind, exists: F) -> Result<(), MalformedScenarioError>
where
    F: Fn(&str) -> bool,
{
    match order.iter().find(|id| !exists(id)) {
        Some(id) => Err(MalformedScenarioError::DanglingOrder {
            kind,
            id: id.clone(),
        }),
        None => Ok(()),
    }
}

fn check_unit_parent(
    state: &ScenarioState,
    unit_id: &str,
    parent: &str,
    parent_kind: EntityKind,
) -> Result<(), MalformedScenarioError> {
    let unit = state
        .unit(unit_id)
        .ok_or_else(|| MalformedScenarioError::DanglingChild {
            parent_kind,
            parent: parent.to_string(),
            child: unit_id.to_string(),
        })?;
    if unit.pid != parent {
        return Err(MalformedScenarioError::MissingParent {
            kind: EntityKind::Unit,
            id: unit.id.clone(),
            parent: unit.pid.clone(),
        });
    }
    Ok(())
}

fn check_unit_references(
    state: &ScenarioState,
    unit: &crate::model::NUnit,
) -> Result<(), MalformedScenarioError> {
    let dangling = |table: EntityKind, reference: &EntityId| MalformedScenarioError::DanglingReference {
        id: unit.id.clone(),
        table,
        reference: reference.clone(),
    };

    for entry in &unit.equipment {
        if !state.equipment_map.contains_key(&entry.reference_id) {
            return Err(dangling(EntityKind::Equipment, &entry.reference_id));
        }
    }
    for entry in &unit.personnel {
        if !state.personnel_map.contains_key(&entry.reference_id) {
            return Err(dangling(EntityKind::Personnel, &entry.reference_id));
        }
    }
    for ring in &unit.range_rings {
        if let Some(group) = &ring.group {
            if !state.range_ring_group_map.contains_key(group) {
                return Err(dangling(EntityKind::RangeRingGroup, group));
            }
        }
    }
    let statuses = unit
        .status
        .iter()
        .chain(unit.state.iter().filter_map(|keyframe| keyframe.status.as_ref()));
    for status in statuses {
        if !state.unit_status_map.contains_key(status) {
            return Err(dangling(EntityKind::UnitStatus, status));
        }
    }
    Ok(())
}

fn check_single_owner<'a>(
    ids: impl Iterator<Item = &'a EntityId>,
    owners: &HashMap<&str, usize>,
    kind: EntityKind,
) -> Result<(), MalformedScenarioError> {
    for id in ids {
        match owners.get(id.as_str()).copied().unwrap_or(0) {
            1 => {}
            0 => {
                return Err(MalformedScenarioError::Orphaned {
                    kind,
                    id: id.clone(),
                })
            }
            _ => {
                return Err(MalformedScenarioError::MultipleParents {
                    kind,
                    id: id.clone(),
                })
            }
        }
    }
    Ok(())
}
