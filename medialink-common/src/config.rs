//! Engine configuration loading
//!
//! Configuration file resolution follows a fixed priority order:
//! 1. Explicit path (highest priority)
//! 2. Environment variable
//! 3. User config file (`<config dir>/medialink/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! An explicitly named file (priorities 1 and 2) must exist and parse.
//! The user config file is optional.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a configuration file
pub const CONFIG_ENV_VAR: &str = "MEDIALINK_CONFIG";

/// Default tracing filter when none is configured
pub const DEFAULT_LOG_FILTER: &str = "medialink=info";

/// Native engine implementation to install
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process engine, no native library required
    #[default]
    Memory,
    /// System libvlc (requires the `libvlc` feature of `medialink`)
    Libvlc,
}

/// Engine configuration
///
/// ```toml
/// backend = "libvlc"
/// args = ["--no-video", "--quiet"]
/// log_filter = "medialink=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    /// Arguments handed to the engine at creation time
    pub args: Vec<String>,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            args: Vec::new(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Engine arguments are passed to C, so they must be NUL-free and non-empty
    pub fn validate(&self) -> Result<()> {
        for arg in &self.args {
            if arg.is_empty() {
                return Err(Error::Config("Empty engine argument".to_string()));
            }
            if arg.contains('\0') {
                return Err(Error::Config(format!(
                    "Engine argument contains NUL byte: {:?}",
                    arg
                )));
            }
        }

        if self.log_filter.trim().is_empty() {
            return Err(Error::Config("log_filter must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Resolve and load the engine configuration
///
/// `cli_arg` is an explicit file path; `env_var_name` names the environment
/// variable consulted when no explicit path is given (normally
/// [`CONFIG_ENV_VAR`]).
pub fn load_config(cli_arg: Option<&Path>, env_var_name: &str) -> Result<EngineConfig> {
    // Priority 1: explicit path
    if let Some(path) = cli_arg {
        debug!("Loading engine config from {}", path.display());
        return EngineConfig::load_from_file(path);
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        debug!("Loading engine config from ${} = {}", env_var_name, path);
        return EngineConfig::load_from_file(Path::new(&path));
    }

    // Priority 3: user config file
    if let Some(path) = default_config_path() {
        if path.exists() {
            debug!("Loading engine config from {}", path.display());
            return EngineConfig::load_from_file(&path);
        }
    }

    // Priority 4: compiled defaults
    debug!("No engine config file found, using defaults");
    Ok(EngineConfig::default())
}

/// Platform config file location (`~/.config/medialink/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("medialink").join("config.toml"))
}
