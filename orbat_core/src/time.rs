//! Time navigation over the store.
//!
//! Every move is a non-undoable `SetCurrentTime` transaction that re-runs the
//! full projection at the new instant.

use std::convert::Infallible;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use orbat_schema::{shift_millis, TimeUnit};

use crate::model::{EntityKind, EventSource, LookupError, NScenarioEvent, ScenarioState};
use crate::projection;
use crate::store::{ActionLabel, ApplyOptions, ScenarioStore};

/// Scenario time zone: a fixed offset or an IANA zone with its DST rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioZone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl ScenarioZone {
    pub fn utc() -> Self {
        ScenarioZone::Fixed(Utc.fix())
    }

    pub fn offset_at(&self, instant: &DateTime<Utc>) -> FixedOffset {
        match self {
            ScenarioZone::Fixed(offset) => *offset,
            ScenarioZone::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }

    /// 12:00 local time on the local calendar day of `instant`.
    pub fn noon_of(&self, instant: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ScenarioZone::Fixed(offset) => noon_in(offset, instant),
            ScenarioZone::Named(tz) => noon_in(tz, instant),
        }
    }
}

fn noon_in<Z: TimeZone>(zone: &Z, instant: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let noon = instant.with_timezone(zone).date_naive().and_hms_opt(12, 0, 0)?;
    zone.from_local_datetime(&noon)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Parse `UTC`, `Z`, a fixed offset such as `+02:00`, `-0530`, `UTC+1`, or an
/// IANA name such as `Europe/Oslo`.
pub fn parse_time_zone(zone: &str) -> Option<ScenarioZone> {
    let trimmed = zone.trim();
    if let Some(offset) = parse_fixed_offset(trimmed) {
        return Some(ScenarioZone::Fixed(offset));
    }
    trimmed.parse::<Tz>().ok().map(ScenarioZone::Named)
}

fn parse_fixed_offset(zone: &str) -> Option<FixedOffset> {
    let rest = zone
        .strip_prefix("UTC")
        .or_else(|| zone.strip_prefix("GMT"))
        .unwrap_or(zone);
    if rest.is_empty() || rest == "Z" {
        return Some(Utc.fix());
    }
    let (sign, digits) = match rest.as_bytes().first()? {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }
    let (hours, minutes) = match digits.split_once(':') {
        Some((hours, minutes)) => (hours, minutes),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3_600 + minutes * 60))
}

impl ScenarioState {
    /// The scenario's time zone; unknown zones fall back to UTC.
    pub fn time_zone(&self) -> ScenarioZone {
        let Some(zone) = self.info.time_zone.as_deref() else {
            return ScenarioZone::utc();
        };
        parse_time_zone(zone).unwrap_or_else(|| {
            tracing::warn!(target: "orbat::time", zone, "time_zone.unsupported");
            ScenarioZone::utc()
        })
    }

    /// Offset in effect at `current_time`.
    pub fn time_zone_offset(&self) -> FixedOffset {
        match self.utc_time() {
            Some(instant) => self.time_zone().offset_at(&instant),
            None => Utc.fix(),
        }
    }

    pub fn utc_time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.current_time)
    }

    pub fn scenario_time(&self) -> Option<DateTime<FixedOffset>> {
        self.utc_time()
            .map(|instant| instant.with_timezone(&self.time_zone().offset_at(&instant)))
    }

    /// Scenario events plus titled unit keyframes, ascending by start time.
    pub fn merged_events(&self) -> Vec<NScenarioEvent> {
        let mut merged: Vec<NScenarioEvent> = self
            .events
            .iter()
            .filter_map(|id| self.event_map.get(id))
            .map(|event| event.as_ref().clone())
            .collect();
        for unit in self.unit_map.values() {
            for keyframe in &unit.state {
                let Some(title) = &keyframe.title else {
                    continue;
                };
                merged.push(NScenarioEvent {
                    id: keyframe.id.clone(),
                    title: title.clone(),
                    sub_title: keyframe.sub_title.clone(),
                    description: keyframe.description.clone(),
                    start_time: keyframe.t,
                    extra: Default::default(),
                    source: EventSource::Unit,
                    pid: Some(unit.id.clone()),
                });
            }
        }
        merged.sort_by_key(|event| event.start_time);
        merged
    }

    pub fn get_event_by_id(&self, id: &str) -> Result<NScenarioEvent, LookupError> {
        if let Some(event) = self.event_map.get(id) {
            return Ok(event.as_ref().clone());
        }
        self.merged_events()
            .into_iter()
            .find(|event| event.id == id)
            .ok_or_else(|| LookupError::new(EntityKind::Event, id))
    }

    /// Nearest keyframe timestamp strictly after `current_time`, across all units.
    pub fn next_keyframe_time(&self) -> Option<i64> {
        let now = self.current_time;
        self.unit_map
            .values()
            .flat_map(|unit| unit.state.iter().map(|keyframe| keyframe.t))
            .filter(|t| *t > now)
            .min()
    }

    pub fn prev_keyframe_time(&self) -> Option<i64> {
        let now = self.current_time;
        self.unit_map
            .values()
            .flat_map(|unit| unit.state.iter().map(|keyframe| keyframe.t))
            .filter(|t| *t < now)
            .max()
    }
}

impl ScenarioStore {
    pub fn set_current_time(&mut self, timestamp: i64) {
        let result = self.apply_with(
            ActionLabel::SetCurrentTime,
            ApplyOptions::transient(),
            |draft| {
                let summary = projection::project(draft, timestamp);
                Ok::<_, Infallible>(summary)
            },
        );
        match result {
            Ok(summary) => tracing::debug!(
                target: "orbat::time",
                t = timestamp,
                units = summary.units_changed,
                "time.set"
            ),
            Err(err) => match err.into_inner() {},
        }
    }

    /// Move forward by `amount` units; `normalize` snaps to 12:00 scenario time.
    ///
    /// Returns `false` and leaves the time unchanged when the result is not
    /// representable.
    pub fn add(&mut self, amount: i64, unit: TimeUnit, normalize: bool) -> bool {
        let Some(shifted) = shift_millis(self.state().current_time, amount, unit) else {
            return false;
        };
        let target = if normalize {
            match self.noon_in_scenario_zone(shifted) {
                Some(noon) => noon,
                None => return false,
            }
        } else {
            shifted
        };
        self.set_current_time(target);
        true
    }

    pub fn subtract(&mut self, amount: i64, unit: TimeUnit, normalize: bool) -> bool {
        match amount.checked_neg() {
            Some(negated) => self.add(negated, unit, normalize),
            None => false,
        }
    }

    fn noon_in_scenario_zone(&self, millis: i64) -> Option<i64> {
        let instant = DateTime::<Utc>::from_timestamp_millis(millis)?;
        let noon = self.state().time_zone().noon_of(&instant)?;
        Some(noon.timestamp_millis())
    }

    /// Jump to the nearest later unit keyframe. No-op when there is none.
    pub fn jump_to_next_event(&mut self) -> bool {
        match self.state().next_keyframe_time() {
            Some(t) => {
                self.set_current_time(t);
                true
            }
            None => false,
        }
    }

    pub fn jump_to_prev_event(&mut self) -> bool {
        match self.state().prev_keyframe_time() {
            Some(t) => {
                self.set_current_time(t);
                true
            }
            None => false,
        }
    }

    pub fn go_to_next_scenario_event(&mut self) -> bool {
        let now = self.state().current_time;
        let next = self
            .state()
            .merged_events()
            .into_iter()
            .find(|event| event.start_time > now);
        match next {
            Some(event) => {
                self.set_current_time(event.start_time);
                true
            }
            None => false,
        }
    }

    pub fn go_to_prev_scenario_event(&mut self) -> bool {
        let now = self.state().current_time;
        let prev = self
            .state()
            .merged_events()
            .into_iter()
            .rev()
            .find(|event| event.start_time < now);
        match prev {
            Some(event) => {
                self.set_current_time(event.start_time);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Timelike;

    use super::*;
    use crate::config::StoreConfig;
    use crate::ids::IdGenerator;
    use crate::model::{NUnit, ScenarioInfo, StateKeyframe};

    fn keyframe(id: &str, t: i64, title: Option<&str>) -> StateKeyframe {
        StateKeyframe {
            id: id.into(),
            t,
            location: Some([0.0, 0.0]),
            title: title.map(String::from),
            ..Default::default()
        }
    }

    fn store() -> ScenarioStore {
        let mut state = ScenarioState::default();
        let units = Arc::make_mut(&mut state.unit_map);
        units.insert(
            "a".into(),
            Arc::new(NUnit {
                id: "a".into(),
                state: vec![keyframe("a1", 100, None), keyframe("a2", 300, Some("Assault"))],
                ..Default::default()
            }),
        );
        units.insert(
            "b".into(),
            Arc::new(NUnit {
                id: "b".into(),
                state: vec![keyframe("b1", 200, None)],
                ..Default::default()
            }),
        );
        Arc::make_mut(&mut state.event_map).insert(
            "e".into(),
            Arc::new(NScenarioEvent {
                id: "e".into(),
                title: "H-hour".into(),
                sub_title: None,
                description: None,
                start_time: 250,
                extra: Default::default(),
                source: EventSource::Scenario,
                pid: None,
            }),
        );
        state.events = Arc::new(vec!["e".into()]);
        ScenarioStore::new(state, IdGenerator::seeded(2), StoreConfig::builtin())
    }

    #[test]
    fn keyframe_jumps_pick_nearest_timestamp() {
        let mut store = store();
        assert!(store.jump_to_next_event());
        assert_eq!(store.state().current_time, 100);
        assert!(store.jump_to_next_event());
        assert_eq!(store.state().current_time, 200);
        assert!(store.jump_to_next_event());
        assert_eq!(store.state().current_time, 300);
        assert!(!store.jump_to_next_event());
        assert_eq!(store.state().current_time, 300);
        assert!(store.jump_to_prev_event());
        assert_eq!(store.state().current_time, 200);
    }

    #[test]
    fn scenario_event_navigation_uses_merged_list() {
        let mut store = store();
        let merged: Vec<_> = store.state().merged_events().into_iter().map(|e| e.id).collect();
        assert_eq!(merged, vec!["e".to_string(), "a2".to_string()]);

        assert!(store.go_to_next_scenario_event());
        assert_eq!(store.state().current_time, 250);
        assert!(store.go_to_next_scenario_event());
        assert_eq!(store.state().current_time, 300);
        assert!(!store.go_to_next_scenario_event());
        assert!(store.go_to_prev_scenario_event());
        assert_eq!(store.state().current_time, 250);
        assert!(!store.can_undo());
    }

    #[test]
    fn event_lookup_covers_unit_events() {
        let store = store();
        let event = store.state().get_event_by_id("a2").expect("unit event");
        assert_eq!(event.source, EventSource::Unit);
        assert_eq!(event.pid.as_deref(), Some("a"));
        assert!(store.state().get_event_by_id("zzz").is_err());
    }

    #[test]
    fn add_and_subtract_shift_time() {
        let mut store = store();
        assert!(store.add(2, TimeUnit::Day, false));
        assert_eq!(store.state().current_time, 2 * 86_400_000);
        assert!(store.subtract(1, TimeUnit::Hour, false));
        assert_eq!(store.state().current_time, 2 * 86_400_000 - 3_600_000);
    }

    fn set_zone(store: &mut ScenarioStore, zone: &str) {
        store
            .apply(ActionLabel::UpdateUnit, |draft| {
                draft.info = Arc::new(ScenarioInfo {
                    time_zone: Some(zone.into()),
                    ..ScenarioInfo::default()
                });
                Ok::<_, Infallible>(())
            })
            .expect("zone");
    }

    fn fixed_seconds(zone: &str) -> Option<i32> {
        match parse_time_zone(zone)? {
            ScenarioZone::Fixed(offset) => Some(offset.local_minus_utc()),
            ScenarioZone::Named(_) => None,
        }
    }

    #[test]
    fn normalize_snaps_to_noon_in_zone() {
        let mut store = store();
        set_zone(&mut store, "+02:00");
        assert!(store.add(1, TimeUnit::Day, true));
        let local = store.state().scenario_time().expect("time");
        assert_eq!(local.hour(), 12);
        assert_eq!(store.state().current_time, 86_400_000 + 10 * 3_600_000);
    }

    #[test]
    fn normalize_follows_daylight_saving_change() {
        let mut store = store();
        set_zone(&mut store, "Europe/Oslo");
        // 2024-03-30T12:00 CET; summer time starts the next night.
        store.set_current_time(1_711_796_400_000);
        assert_eq!(store.state().time_zone_offset().local_minus_utc(), 3_600);

        assert!(store.add(2, TimeUnit::Day, true));
        // 2024-04-01T12:00 CEST
        assert_eq!(store.state().current_time, 1_711_965_600_000);
        let local = store.state().scenario_time().expect("time");
        assert_eq!(local.hour(), 12);
        assert_eq!(local.offset().local_minus_utc(), 7_200);
    }

    #[test]
    fn time_zone_parsing() {
        assert_eq!(parse_time_zone("UTC"), Some(ScenarioZone::utc()));
        assert_eq!(fixed_seconds("+05:30"), Some(19_800));
        assert_eq!(fixed_seconds("UTC-1"), Some(-3_600));
        assert_eq!(fixed_seconds("-0330"), Some(-12_600));
        assert_eq!(
            parse_time_zone("Europe/Oslo"),
            Some(ScenarioZone::Named(chrono_tz::Europe::Oslo))
        );
        assert_eq!(parse_time_zone("Mars/Olympus"), None);
    }

    #[test]
    fn malformed_offsets_are_rejected() {
        for zone in ["+1\u{e9}1", "-\u{e9}\u{e9}", "UTC+", "+12:\u{e9}", "+2500", "+1:60"] {
            assert_eq!(parse_time_zone(zone), None, "{zone}");
        }
    }

    #[test]
    fn unknown_zone_falls_back_to_utc() {
        let mut store = store();
        set_zone(&mut store, "Nowhere/Special");
        assert_eq!(store.state().time_zone(), ScenarioZone::utc());
        assert_eq!(store.state().time_zone_offset().local_minus_utc(), 0);
    }
}
