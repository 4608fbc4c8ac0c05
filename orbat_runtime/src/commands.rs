use std::fmt;

use orbat_schema::TimeUnit;
use serde::{Deserialize, Serialize};

/// Supported command payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandPayload {
    SetTime {
        timestamp: i64,
    },
    AddTime {
        amount: i64,
        unit: TimeUnit,
        normalize: bool,
    },
    SubtractTime {
        amount: i64,
        unit: TimeUnit,
        normalize: bool,
    },
    /// Nearest later unit keyframe.
    NextKeyframe,
    PrevKeyframe,
    /// Next entry of the merged scenario/unit event list.
    NextEvent,
    PrevEvent,
    Undo,
    Redo,
    Show {
        target: ShowTarget,
    },
    RenameUnit {
        unit_id: String,
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowTarget {
    Units,
    Layers,
    Events,
    History,
}

impl ShowTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "units" | "unit" => Some(ShowTarget::Units),
            "layers" | "layer" | "features" => Some(ShowTarget::Layers),
            "events" | "event" => Some(ShowTarget::Events),
            "history" => Some(ShowTarget::History),
            _ => None,
        }
    }
}

impl fmt::Display for ShowTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShowTarget::Units => "units",
            ShowTarget::Layers => "layers",
            ShowTarget::Events => "events",
            ShowTarget::History => "history",
        };
        f.write_str(label)
    }
}
