//! Configuration module
//!
//! The persisted location list is JSON-shaped and loaded at startup. The
//! core only reads it; edits replace whole descriptors (a location's type
//! never changes in place).

use std::collections::HashSet;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::Location;

/// Environment variable pointing at the locations config file.
pub const CONFIG_ENV_VAR: &str = "TAGSPACES_CONFIG";

/// Persisted list of configured locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationsConfig {
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl LocationsConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: LocationsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `TAGSPACES_CONFIG`.
    pub fn from_env() -> CoreResult<Self> {
        let path = env::var(CONFIG_ENV_VAR)
            .map_err(|_| CoreError::Config(format!("{} not set", CONFIG_ENV_VAR)))?;
        Self::load(path)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for location in &self.locations {
            if !seen.insert(location.uuid.as_str()) {
                return Err(CoreError::Config(format!(
                    "duplicate location uuid: {}",
                    location.uuid
                )));
            }
        }
        let defaults = self.locations.iter().filter(|l| l.is_default).count();
        if defaults > 1 {
            return Err(CoreError::Config(format!(
                "{} locations marked as default, at most one allowed",
                defaults
            )));
        }
        Ok(())
    }

    /// Find a location by uuid.
    pub fn find_location(&self, uuid: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.uuid == uuid)
    }

    /// Find a location by uuid or, failing that, by name.
    pub fn find_location_by_ref(&self, loc_ref: &str) -> Option<&Location> {
        self.find_location(loc_ref)
            .or_else(|| self.locations.iter().find(|l| l.name == loc_ref))
    }

    pub fn default_location(&self) -> Option<&Location> {
        self.locations.iter().find(|l| l.is_default)
    }
}
