mod common;

use std::sync::Arc;

use orbat_core::{
    validate_state, ActionLabel, LayerUpdate, NewFeature, StoreConfig, UnitUpdate,
};
use serde_json::json;

fn rename(name: &str) -> UnitUpdate {
    UnitUpdate {
        name: Some(name.to_string()),
        ..UnitUpdate::default()
    }
}

#[test]
fn untouched_subtrees_are_shared_after_an_edit() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let before = store.snapshot();
    store.update_unit("u-bn2", rename("2 Mech"))?;
    let after = store.snapshot();

    assert!(!Arc::ptr_eq(&before, &after));
    assert!(!Arc::ptr_eq(&before.unit_map, &after.unit_map));
    assert!(!Arc::ptr_eq(&before.unit_map["u-bn2"], &after.unit_map["u-bn2"]));
    assert!(Arc::ptr_eq(&before.unit_map["u-bn1"], &after.unit_map["u-bn1"]));
    assert!(Arc::ptr_eq(&before.unit_map["u-bde"], &after.unit_map["u-bde"]));
    assert!(Arc::ptr_eq(&before.side_map, &after.side_map));
    assert!(Arc::ptr_eq(&before.layer_map, &after.layer_map));
    assert!(Arc::ptr_eq(&before.equipment_map, &after.equipment_map));
    assert_eq!(before.unit_map["u-bn2"].name, "2nd Mechanised Battalion");
    Ok(())
}

#[test]
fn undo_and_redo_restore_equal_roots() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let original = store.snapshot();
    store.update_unit("u-bde", rename("Tern Brigade"))?;
    let edited = store.snapshot();

    assert!(store.undo());
    assert_eq!(*store.state(), *original);
    assert!(store.can_redo());

    assert!(store.redo());
    assert_eq!(*store.state(), *edited);
    assert!(!store.redo());
    Ok(())
}

#[test]
fn undo_keeps_the_live_time() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.update_unit("u-bn1", rename("Renamed"))?;
    let later = common::BRIGADE_START + common::HOUR;
    store.set_current_time(later);

    assert!(store.undo());
    let state = store.state();
    assert_eq!(state.current_time, later);
    assert_eq!(state.get_unit_by_id("u-bn1")?.name, "1st Tank Battalion");
    let projected = state.get_unit_by_id("u-bn1")?.current_state.as_ref().expect("state");
    assert_eq!(projected.t, later);
    Ok(())
}

#[test]
fn time_changes_stay_out_of_history() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.set_current_time(common::BRIGADE_START + common::HOUR);
    assert!(!store.can_undo());

    store.update_layer(
        "lyr-obj",
        LayerUpdate {
            is_hidden: Some(true),
            ..LayerUpdate::default()
        },
        false,
    )?;
    assert!(!store.can_undo());
    assert_eq!(store.state().get_layer_by_id("lyr-obj")?.is_hidden, Some(true));
    Ok(())
}

#[test]
fn undo_leaves_later_visibility_sync_in_place() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.update_unit("u-bde", rename("Tern Brigade"))?;
    store.update_layer(
        "lyr-obj",
        LayerUpdate {
            is_hidden: Some(true),
            ..LayerUpdate::default()
        },
        false,
    )?;

    assert!(store.undo());
    assert_eq!(store.state().get_unit_by_id("u-bde")?.name, "1 Armoured Brigade");
    assert_eq!(store.state().get_layer_by_id("lyr-obj")?.is_hidden, Some(true));

    assert!(store.redo());
    assert_eq!(store.state().get_unit_by_id("u-bde")?.name, "Tern Brigade");
    assert_eq!(store.state().get_layer_by_id("lyr-obj")?.is_hidden, Some(true));
    validate_state(store.state())?;
    Ok(())
}

#[test]
fn new_edits_clear_the_redo_stack() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.update_unit("u-bde", rename("A"))?;
    store.undo();
    assert!(store.can_redo());
    store.update_unit("u-bde", rename("B"))?;
    assert!(!store.can_redo());
    assert_eq!(store.history(), vec![ActionLabel::UpdateUnit]);
    Ok(())
}

#[test]
fn history_is_capped() -> anyhow::Result<()> {
    let config = Arc::new(StoreConfig {
        history_limit: 2,
        ..StoreConfig::default()
    });
    let mut store = common::load_fixture_with("brigade.json", config)?;
    store.update_unit("u-bde", rename("One"))?;
    store.add_layer("Scratch")?;
    store.update_unit("u-bde", rename("Three"))?;

    assert_eq!(store.history(), vec![ActionLabel::AddLayer, ActionLabel::UpdateUnit]);
    assert!(store.undo());
    assert!(store.undo());
    assert!(!store.undo());
    assert_eq!(store.state().get_unit_by_id("u-bde")?.name, "One");
    Ok(())
}

#[test]
fn failed_edits_leave_the_store_untouched() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let before = store.snapshot();

    let err = store.update_unit("ghost", rename("Nobody")).expect_err("unknown unit");
    assert!(err.to_string().contains("ghost"));
    let err = store
        .update_unit(
            "u-bde",
            UnitUpdate {
                status: Some("no-such-status".into()),
                ..UnitUpdate::default()
            },
        )
        .expect_err("unknown status");
    assert!(err.to_string().contains("no-such-status"));

    assert!(Arc::ptr_eq(&before, &store.snapshot()));
    assert!(!store.can_undo());
    Ok(())
}

#[test]
fn deleting_a_side_cascades() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    store.delete_side("side-blue")?;

    let state = store.state();
    assert_eq!(*state.sides, vec!["side-red".to_string()]);
    assert!(state.get_side_group_by_id("grp-blue").is_err());
    for id in ["u-bde", "u-bn1", "u-bn2", "u-coy-a"] {
        assert!(state.unit(id).is_none(), "{id} should be gone");
    }
    assert!(state.unit("u-red-rgt").is_some());
    validate_state(state)?;

    store.undo();
    assert_eq!(store.state().unit_map.len(), 5);
    Ok(())
}

#[test]
fn keyframe_edits_keep_order_and_bump_counter() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let counter = store.state().unit_state_counter;
    let t = common::BRIGADE_START + common::HOUR;

    let id = store.add_unit_position("u-bn1", [10.05, 59.05], t)?;
    let state = store.state();
    let battalion = state.get_unit_by_id("u-bn1")?;
    let times: Vec<i64> = battalion.state.iter().map(|k| k.t).collect();
    assert_eq!(times, vec![common::BRIGADE_START, t, common::BRIGADE_START + 2 * common::HOUR]);
    assert_eq!(battalion.state[1].id, id);
    assert_eq!(state.unit_state_counter, counter + 1);

    let same = store.add_unit_position("u-bn1", [10.06, 59.06], t)?;
    assert_eq!(same, id);
    assert_eq!(store.state().get_unit_by_id("u-bn1")?.state.len(), 3);

    store.clear_unit_state("u-bn1")?;
    assert!(store.state().get_unit_by_id("u-bn1")?.state.is_empty());
    Ok(())
}

#[test]
fn layer_and_feature_lifecycle() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let layer = store.add_layer("Fires")?;
    assert_eq!(store.state().layers.last(), Some(&layer));

    let feature = store.add_feature(
        &layer,
        NewFeature {
            geometry: json!({ "type": "Point", "coordinates": [10.2, 59.2] }),
            ..NewFeature::default()
        },
    )?;
    assert_eq!(store.state().get_feature_by_id(&feature)?.pid, layer);

    store.move_layer(&layer, 0)?;
    assert_eq!(store.state().layers.first(), Some(&layer));

    store.delete_layer(&layer)?;
    assert!(store.state().get_feature_by_id(&feature).is_err());
    assert_eq!(store.state().layers.len(), 2);
    validate_state(store.state())?;
    Ok(())
}
