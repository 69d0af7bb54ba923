//! Lookup configuration.
//!
//! Loaded from a TOML file with a single `[lookup]` table:
//!
//! ```toml
//! [lookup]
//! scene = "reports"
//! index-access = false
//! ```
//!
//! Missing keys take their defaults. A missing or unreadable file is not an
//! error for [`LookupConfig::load_from`]; it logs and returns the defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Settings for a [`crate::Lookup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LookupConfig {
    /// Scene whose caches the lookup shares. Empty is the default scene.
    pub scene: String,
    /// Whether `SequenceWrapper::get` is allowed at all.
    pub index_access: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            scene: crate::DEFAULT_SCENE.to_string(),
            index_access: true,
        }
    }
}

#[derive(Deserialize, Default)]
struct LookupFile {
    #[serde(default)]
    lookup: LookupConfig,
}

impl LookupConfig {
    /// Parses a configuration document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str::<LookupFile>(contents)
            .map(|file| file.lookup)
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Reads and parses a configuration file, surfacing every failure.
    pub fn try_load_from(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Loads configuration from `path`, falling back to the defaults when
    /// the file is missing or invalid.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No lookup config found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(config) => {
                info!("Loaded lookup config from {:?}", path);
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load lookup config {:?}: {}. Falling back to defaults.",
                    path, e
                );
                Self::default()
            }
        }
    }
}
