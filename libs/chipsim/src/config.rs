//! Tool configuration.
//!
//! Configuration is read from a TOML file (by default [`CONFIG_FILE_NAME`] in
//! the working directory) and then overridden by `CHIPTOOL_*` environment
//! variables. Every field is optional.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sim::DEFAULT_MAX_CYCLES;

/// The default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "chiptool.toml";

/// The prefix of environment variables that override configuration fields.
pub const ENV_PREFIX: &str = "CHIPTOOL";

/// An error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path:?}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid.
    #[error("invalid config file {path:?}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: toml::de::Error,
    },
    /// An environment variable has an invalid value.
    #[error("invalid value `{value}` for environment variable {var}")]
    InvalidEnv {
        /// The variable name.
        var: String,
        /// The value found.
        value: String,
    },
}

/// Tool configuration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The root directory of saved chips.
    pub save_dir: PathBuf,
    /// The subdirectory of `save_dir` holding chip definitions.
    pub chips_subdir: PathBuf,
    /// The subdirectory of `save_dir` holding wire layouts.
    pub wires_subdir: PathBuf,
    /// The cycle limit used when settling a simulation.
    pub max_settle_cycles: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            chips_subdir: PathBuf::from("chips"),
            wires_subdir: PathBuf::from("wires"),
            max_settle_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads configuration from `path`, or from [`CONFIG_FILE_NAME`] if it exists,
    /// and applies environment overrides.
    ///
    /// An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_NAME).is_file() => Self::from_file(CONFIG_FILE_NAME)?,
            None => Self::default(),
        };
        config.apply_env(&std::env::vars().collect())?;
        Ok(config)
    }

    /// Applies `CHIPTOOL_<FIELD>` overrides from the given variables.
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        let var = |field: &str| {
            let name = format!("{ENV_PREFIX}_{field}");
            vars.get(&name).map(|value| (name, value))
        };
        if let Some((name, value)) = var("SAVE_DIR") {
            debug!(var = %name, value = %value, "overriding config from environment");
            self.save_dir = PathBuf::from(value);
        }
        if let Some((name, value)) = var("CHIPS_SUBDIR") {
            debug!(var = %name, value = %value, "overriding config from environment");
            self.chips_subdir = PathBuf::from(value);
        }
        if let Some((name, value)) = var("WIRES_SUBDIR") {
            debug!(var = %name, value = %value, "overriding config from environment");
            self.wires_subdir = PathBuf::from(value);
        }
        if let Some((name, value)) = var("MAX_SETTLE_CYCLES") {
            debug!(var = %name, value = %value, "overriding config from environment");
            self.max_settle_cycles = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: name,
                value: value.clone(),
            })?;
        }
        Ok(())
    }

    /// The directory holding chip definitions.
    pub fn chips_dir(&self) -> PathBuf {
        self.save_dir.join(&self.chips_subdir)
    }

    /// The directory holding wire layouts.
    pub fn wires_dir(&self) -> PathBuf {
        self.save_dir.join(&self.wires_subdir)
    }
}
