mod common;

use orbat_core::{load_scenario_str, to_document, to_json_string, StoreConfig, INTERNAL_NAMES};
use serde_json::Value;

fn contains_internal_key(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, nested)| {
            if INTERNAL_NAMES.contains(&key.as_str()) {
                Some(key.clone())
            } else {
                contains_internal_key(nested)
            }
        }),
        Value::Array(items) => items.iter().find_map(contains_internal_key),
        _ => None,
    }
}

#[test]
fn export_then_reload_preserves_the_scenario() -> anyhow::Result<()> {
    let original = common::load_fixture("brigade.json")?;
    let json = to_json_string(original.state())?;
    let reloaded = load_scenario_str(&json, StoreConfig::builtin())?;

    let (a, b) = (original.state(), reloaded.state());
    assert_eq!(a.id, b.id);
    assert_eq!(a.sides, b.sides);
    assert_eq!(a.layers, b.layers);
    assert_eq!(a.events, b.events);
    assert_eq!(a.map_layers, b.map_layers);
    assert_eq!(a.info.start_time, b.info.start_time);
    assert!(a.unit_map.keys().eq(b.unit_map.keys()));

    for (id, unit) in a.unit_map.iter() {
        let other = b.get_unit_by_id(id)?;
        assert_eq!(unit.name, other.name);
        assert_eq!(unit.pid, other.pid);
        assert_eq!(unit.sub_units, other.sub_units);
        assert_eq!(unit.state.len(), other.state.len());
        for (left, right) in unit.state.iter().zip(&other.state) {
            assert_eq!(left.id, right.id);
            assert_eq!(left.t, right.t);
            assert_eq!(left.location, right.location);
        }
        assert_eq!(unit.equipment.len(), other.equipment.len());
    }

    let names = |state: &orbat_core::ScenarioState| -> Vec<String> {
        state.unit_status_map.values().map(|s| s.name.clone()).collect()
    };
    assert_eq!(names(a), names(b));
    assert_eq!(
        a.equipment_map.values().map(|e| e.name.clone()).collect::<Vec<_>>(),
        b.equipment_map.values().map(|e| e.name.clone()).collect::<Vec<_>>()
    );
    assert_eq!(a.get_feature_by_id("f-pl-red")?.state, b.get_feature_by_id("f-pl-red")?.state);
    Ok(())
}

#[test]
fn exported_json_has_no_internal_fields() -> anyhow::Result<()> {
    let store = common::load_fixture("brigade.json")?;
    let value: Value = serde_json::from_str(&to_json_string(store.state())?)?;
    assert_eq!(contains_internal_key(&value), None);
    assert_eq!(value["classification"], "UNCLASSIFIED");
    assert_eq!(value["sides"][0]["standardIdentity"], "3");
    assert_eq!(value["startTime"], "2024-03-01T06:00:00.000Z");
    Ok(())
}

#[test]
fn export_maps_reference_ids_back_to_names() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.add_unit_position("u-bn2", [10.15, 59.25], common::BRIGADE_START + common::HOUR)?;

    let document = to_document(store.state());
    let brigade = &document.sides[0].groups[0].sub_units[0];
    assert_eq!(brigade.status.as_deref(), Some("Ready"));
    let battalion = &brigade.sub_units[0];
    assert_eq!(battalion.equipment[0].name, "Leopard 2A6");
    assert_eq!(battalion.personnel[1].name, "Soldier");
    assert_eq!(battalion.range_rings[0].group.as_deref(), Some("Direct fire"));
    assert_eq!(battalion.state[1].status.as_deref(), Some("Engaged"));

    let mechanised = &brigade.sub_units[1];
    assert_eq!(mechanised.state.len(), 1);
    assert_eq!(mechanised.state[0].location, Some([10.15, 59.25]));
    Ok(())
}
