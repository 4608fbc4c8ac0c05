mod common;

use orbat_core::ScenarioStore;
use orbat_runtime::{parse_script, CommandPayload};
use serde_json::json;

/// Apply the time and history commands the store understands directly.
fn run(store: &mut ScenarioStore, command: &CommandPayload) -> bool {
    match command {
        CommandPayload::SetTime { timestamp } => {
            store.set_current_time(*timestamp);
            true
        }
        CommandPayload::AddTime {
            amount,
            unit,
            normalize,
        } => store.add(*amount, *unit, *normalize),
        CommandPayload::SubtractTime {
            amount,
            unit,
            normalize,
        } => store.subtract(*amount, *unit, *normalize),
        CommandPayload::NextKeyframe => store.jump_to_next_event(),
        CommandPayload::PrevKeyframe => store.jump_to_prev_event(),
        CommandPayload::NextEvent => store.go_to_next_scenario_event(),
        CommandPayload::PrevEvent => store.go_to_prev_scenario_event(),
        CommandPayload::Undo => store.undo(),
        CommandPayload::Redo => store.redo(),
        CommandPayload::Show { .. } | CommandPayload::RenameUnit { .. } => false,
    }
}

fn times_after(store: &mut ScenarioStore, script: &str) -> anyhow::Result<Vec<i64>> {
    let mut times = Vec::new();
    for command in parse_script(script)? {
        run(store, &command);
        times.push(store.state().current_time);
    }
    Ok(times)
}

#[test]
fn scripted_time_navigation() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let start = common::BRIGADE_START;
    let hour = common::HOUR;

    let times = times_after(
        &mut store,
        "# walk the first morning\n\
         time set 2024-03-01T07:00:00Z\n\
         time add 1 hour\n\
         time add 1 day normalize\n\
         time subtract 2 d\n",
    )?;
    assert_eq!(
        times,
        vec![
            start + hour,
            start + 2 * hour,
            // 12:00 at +01:00 on 2 March
            1_709_377_200_000,
            1_709_377_200_000 - 2 * 24 * hour,
        ]
    );
    Ok(())
}

#[test]
fn normalize_uses_named_scenario_zone() -> anyhow::Result<()> {
    let mut store = common::load_patched("brigade.json", |doc| {
        doc["timeZone"] = json!("Asia/Tokyo");
    })?;
    assert_eq!(store.state().time_zone_offset().local_minus_utc(), 9 * 3_600);

    let times = times_after(&mut store, "time add 1 day normalize\n")?;
    // 12:00 JST on 2 March
    assert_eq!(times, vec![1_709_348_400_000]);
    let local = store.state().scenario_time().expect("time");
    assert_eq!(local.to_rfc3339(), "2024-03-02T12:00:00+09:00");
    Ok(())
}

#[test]
fn keyframe_and_event_navigation() -> anyhow::Result<()> {
    let mut store = common::load_fixture("brigade.json")?;
    let start = common::BRIGADE_START;
    let hour = common::HOUR;

    let times = times_after(&mut store, "next\nnext\nnext\nprev\nnext-event\nnext-event\nprev-event\n")?;
    assert_eq!(
        times,
        vec![
            start + hour,
            start + 2 * hour,
            // no later keyframe
            start + 2 * hour,
            start + hour,
            // H-hour keyframe title, then the 12:00 scenario event
            start + 2 * hour,
            start + 6 * hour,
            start + 2 * hour,
        ]
    );
    Ok(())
}

#[test]
fn merged_events_include_titled_keyframes() -> anyhow::Result<()> {
    let store = common::load_fixture("brigade.json")?;
    let events = store.state().merged_events();
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Line of departure crossed", "H-hour", "Objective secured"]);

    let h_hour = store.state().get_event_by_id("k-bn1-b")?;
    assert_eq!(h_hour.pid.as_deref(), Some("u-bn1"));
    Ok(())
}
