//! Scenario state engine for ORBAT scenarios.
//!
//! Loads nested scenario documents into a flat, id-keyed [`ScenarioState`],
//! projects every unit and feature to a query timestamp, and owns the state in
//! a [`ScenarioStore`] whose transactions share unchanged subtrees and can be
//! undone.

pub mod config;
mod edits;
pub mod export;
pub mod geodesy;
mod ids;
pub mod model;
mod normalize;
pub mod projection;
mod rebase;
mod reference;
mod store;
mod time;
mod validate;

pub use config::{
    load_store_config_from_env, StoreConfig, StoreConfigError, StoreConfigMetadata,
    BUILTIN_STORE_CONFIG,
};
pub use edits::{FeatureUpdate, LayerUpdate, NewFeature, UnitUpdate};
pub use export::{strip_internal_fields, to_document, to_json_string, INTERNAL_NAMES};
pub use ids::{IdGenerator, DEFAULT_ID_LENGTH};
pub use model::{
    CurrentState, EntityId, EntityKind, EntityMap, EventSource, LookupError, NScenarioEvent,
    NScenarioFeature, NScenarioLayer, NSide, NSideGroup, NUnit, Position, ScenarioState,
    StateKeyframe, StateType,
};
pub use normalize::{
    load_scenario, load_scenario_file, load_scenario_str, normalize, normalize_value,
    ScenarioLoadError,
};
pub use projection::{project, ProjectionSummary, MAX_TIMESTAMP, MIN_TIMESTAMP};
pub use reference::{ReferenceTable, ReferenceTables};
pub use store::{ActionLabel, ApplyOptions, ScenarioStore, TransactionError, Transition};
pub use time::{parse_time_zone, ScenarioZone};
pub use validate::{validate_state, MalformedScenarioError};
