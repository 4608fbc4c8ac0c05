use serde_json::Value;

pub const SCENARIO_FILE_VERSION: &str = "2.0.0";

/// Bring an older document up to the current schema. Applying it twice is a no-op.
///
/// Documents before 2.0 stored side-group members under `units`; they are
/// moved to `subUnits` unless that key is already present.
pub fn upgrade_scenario_if_necessary(mut document: Value) -> Value {
    let Some(root) = document.as_object_mut() else {
        return document;
    };
    let major = root
        .get("version")
        .and_then(Value::as_str)
        .and_then(|version| version.split('.').next())
        .and_then(|major| major.parse::<u32>().ok())
        .unwrap_or(0);
    if major >= 2 {
        return document;
    }

    if let Some(sides) = root.get_mut("sides").and_then(Value::as_array_mut) {
        for side in sides {
            let groups = side.get_mut("groups").and_then(Value::as_array_mut);
            for group in groups.into_iter().flatten() {
                let Some(group) = group.as_object_mut() else {
                    continue;
                };
                if group.contains_key("subUnits") {
                    continue;
                }
                if let Some(units) = group.remove("units") {
                    group.insert("subUnits".to_string(), units);
                }
            }
        }
    }
    root.insert(
        "version".to_string(),
        Value::String(SCENARIO_FILE_VERSION.to_string()),
    );
    document
}
