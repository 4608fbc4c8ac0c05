//! Replay one recorded transition onto a root that has moved on since.
//!
//! Undo and redo only revert the entities a transition touched. Anything
//! committed afterwards without an undo entry (visibility sync, time moves)
//! stays in place. Entries are compared by `Arc` identity, so the touched set
//! is exactly what the transition's mutator reached through `Arc::make_mut`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{EntityId, EntityMap, ScenarioState};

/// Rewrite `current` so the entries that differ between `from` and `to` take
/// their `to` values. `current_time` is left as it is in `current`.
pub(crate) fn rebase(current: &ScenarioState, from: &ScenarioState, to: &ScenarioState) -> ScenarioState {
    let mut next = current.clone();

    if from.id != to.id {
        next.id = to.id.clone();
    }
    shared(&mut next.meta, &from.meta, &to.meta);
    shared(&mut next.info, &from.info, &to.info);
    shared(&mut next.map_settings, &from.map_settings, &to.map_settings);

    entries(&mut next.side_map, &from.side_map, &to.side_map);
    entries(&mut next.side_group_map, &from.side_group_map, &to.side_group_map);
    entries(&mut next.unit_map, &from.unit_map, &to.unit_map);
    entries(&mut next.layer_map, &from.layer_map, &to.layer_map);
    entries(&mut next.feature_map, &from.feature_map, &to.feature_map);
    entries(&mut next.map_layer_map, &from.map_layer_map, &to.map_layer_map);
    entries(&mut next.event_map, &from.event_map, &to.event_map);
    entries(&mut next.equipment_map, &from.equipment_map, &to.equipment_map);
    entries(&mut next.personnel_map, &from.personnel_map, &to.personnel_map);
    entries(&mut next.range_ring_group_map, &from.range_ring_group_map, &to.range_ring_group_map);
    entries(&mut next.unit_status_map, &from.unit_status_map, &to.unit_status_map);

    order(&mut next.sides, &from.sides, &to.sides, |id| next.side_map.contains_key(id));
    order(&mut next.layers, &from.layers, &to.layers, |id| next.layer_map.contains_key(id));
    order(&mut next.map_layers, &from.map_layers, &to.map_layers, |id| {
        next.map_layer_map.contains_key(id)
    });
    order(&mut next.events, &from.events, &to.events, |id| next.event_map.contains_key(id));

    if from.unit_state_counter != to.unit_state_counter {
        next.unit_state_counter = to.unit_state_counter;
    }
    if from.feature_state_counter != to.feature_state_counter {
        next.feature_state_counter = to.feature_state_counter;
    }
    next
}

fn shared<T>(current: &mut Arc<T>, from: &Arc<T>, to: &Arc<T>) {
    if !Arc::ptr_eq(from, to) {
        *current = Arc::clone(to);
    }
}

fn entries<T>(current: &mut Arc<EntityMap<T>>, from: &Arc<EntityMap<T>>, to: &Arc<EntityMap<T>>) {
    if Arc::ptr_eq(from, to) {
        return;
    }
    if Arc::ptr_eq(current, from) {
        *current = Arc::clone(to);
        return;
    }

    let touched: HashSet<&str> = from
        .iter()
        .filter(|(id, entry)| to.get(*id).map_or(true, |other| !Arc::ptr_eq(entry, other)))
        .map(|(id, _)| id.as_str())
        .chain(to.keys().filter(|id| !from.contains_key(*id)).map(String::as_str))
        .collect();
    if touched.is_empty() {
        return;
    }

    let same_keys = from.len() == to.len() && from.keys().all(|id| to.contains_key(id));
    if same_keys {
        let map = Arc::make_mut(current);
        for id in touched {
            if let (Some(slot), Some(entry)) = (map.get_mut(id), to.get(id)) {
                *slot = Arc::clone(entry);
            }
        }
        return;
    }

    // Inserts or removals: rebuild in `to` order, keeping later additions at the end.
    let mut rebuilt = EntityMap::with_capacity(to.len());
    for (id, entry) in to.iter() {
        if touched.contains(id.as_str()) {
            rebuilt.insert(id.clone(), Arc::clone(entry));
        } else if let Some(live) = current.get(id) {
            rebuilt.insert(id.clone(), Arc::clone(live));
        }
    }
    for (id, live) in current.iter() {
        if !touched.contains(id.as_str()) && !to.contains_key(id) {
            rebuilt.insert(id.clone(), Arc::clone(live));
        }
    }
    *current = Arc::new(rebuilt);
}

fn order<F>(current: &mut Arc<Vec<EntityId>>, from: &Arc<Vec<EntityId>>, to: &Arc<Vec<EntityId>>, exists: F)
where
    F: Fn(&str) -> bool,
{
    if Arc::ptr_eq(from, to) || from == to {
        retain_existing(current, &exists);
        return;
    }
    if Arc::ptr_eq(current, from) || **current == **from {
        *current = Arc::clone(to);
        retain_existing(current, &exists);
        return;
    }
    let mut rebuilt: Vec<EntityId> = to.iter().filter(|id| exists(id)).cloned().collect();
    rebuilt.extend(
        current
            .iter()
            .filter(|id| !from.contains(id) && !to.contains(id) && exists(id))
            .cloned(),
    );
    *current = Arc::new(rebuilt);
}

/// Drop ids whose entity is gone, copying the list only when one is.
fn retain_existing<F>(list: &mut Arc<Vec<EntityId>>, exists: &F)
where
    F: Fn(&str) -> bool,
{
    if list.iter().all(|id| exists(id)) {
        return;
    }
    Arc::make_mut(list).retain(|id| exists(id));
}
