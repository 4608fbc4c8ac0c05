//! Data contracts for ORBAT scenario documents.
//!
//! This crate describes the nested, denormalized document shape that scenario
//! files use on disk (sides → groups → units, layers → features, events and
//! embedded reference data). It owns timestamp parsing and the one-shot
//! `upgrade` step for older schema versions, but knows nothing about the
//! normalized store built from these types in `orbat_core`.

mod document;
mod time;
mod upgrade;

use std::{fs, io, path::Path, path::PathBuf};

use thiserror::Error;

pub use document::{
    EquipmentData, FeatureState, MapSettings, PersonnelData, RangeRing, RangeRingGroup,
    ReferenceCount, Scenario, ScenarioEvent, ScenarioFeature, ScenarioFeatureMeta,
    ScenarioLayer, ScenarioMapLayer, ScenarioMetadata, ScenarioSettings, Side, SideGroup, Unit,
    UnitState, UnitStatus, DEFAULT_BASEMAP_ID, SCENARIO_DOCUMENT_TYPE,
};
pub use time::{
    format_timestamp, parse_timestamp, shift_millis, TimeUnit, TimeValue, TimestampError,
};
pub use upgrade::{upgrade_scenario_if_necessary, SCENARIO_FILE_VERSION};

/// Opaque entity identifier, unique within one scenario.
pub type EntityId = String;

/// Geographic position as `[longitude, latitude]` in degrees.
pub type Position = [f64; 2];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to parse scenario document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read scenario document from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Scenario {
    /// Parse a document, upgrading older schema versions first.
    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, DocumentError> {
        let upgraded = upgrade_scenario_if_necessary(value);
        Ok(serde_json::from_value(upgraded)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let contents = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}
