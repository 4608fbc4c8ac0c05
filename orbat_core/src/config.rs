use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_STORE_CONFIG: &str = include_str!("data/store_config.json");

/// Tunables for loading scenarios and running the transaction store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of undoable transitions kept; older ones are dropped.
    pub history_limit: usize,
    /// Length of generated entity identifiers.
    pub id_length: usize,
    pub validate_on_load: bool,
    /// Recompute derived `_state`/`_hidden` fields inside every transaction.
    pub project_on_apply: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_limit: 256,
            id_length: 21,
            validate_on_load: true,
            project_on_apply: true,
        }
    }
}

impl StoreConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_STORE_CONFIG)
                .expect("builtin store config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| StoreConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<(), StoreConfigError> {
        if self.id_length < 8 {
            return Err(StoreConfigError::IdLengthTooShort {
                length: self.id_length,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreConfigError {
    #[error("failed to parse store config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read store config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("id_length {length} is too short to stay collision-free (minimum 8)")]
    IdLengthTooShort { length: usize },
}

#[derive(Debug, Clone)]
pub struct StoreConfigMetadata {
    path: Option<PathBuf>,
}

impl StoreConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Resolve the store config from `ORBAT_STORE_CONFIG_PATH`, falling back to the builtin copy.
pub fn load_store_config_from_env() -> (Arc<StoreConfig>, StoreConfigMetadata) {
    let Some(path) = env::var("ORBAT_STORE_CONFIG_PATH").ok().map(PathBuf::from) else {
        let config = StoreConfig::builtin();
        tracing::info!(target: "orbat::config", "store_config.loaded=builtin");
        return (config, StoreConfigMetadata::new(None));
    };

    match StoreConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "orbat::config",
                path = %path.display(),
                "store_config.loaded=file"
            );
            (Arc::new(config), StoreConfigMetadata::new(Some(path)))
        }
        Err(err) => {
            tracing::warn!(
                target: "orbat::config",
                path = %path.display(),
                error = %err,
                "store_config.load_failed"
            );
            tracing::info!(target: "orbat::config", "store_config.loaded=builtin");
            (StoreConfig::builtin(), StoreConfigMetadata::new(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_default() {
        assert_eq!(*StoreConfig::builtin(), StoreConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = StoreConfig::from_json_str(r#"{ "history_limit": 3 }"#).expect("config");
        assert_eq!(config.history_limit, 3);
        assert_eq!(config.id_length, 21);
        assert!(config.project_on_apply);
    }

    #[test]
    fn short_ids_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{ "id_length": 4 }"#).expect_err("too short");
        assert!(err.to_string().contains("too short"));
    }
}
