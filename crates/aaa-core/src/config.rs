//! Loader configuration.
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! environment variables. Command-line flags are layered on top by the CLI.
//! The result is handed to the loader at construction; nothing here is
//! process-wide state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Built-in defaults.
pub mod defaults {
    /// Directory holding one JSON descriptor per plugin.
    pub const CONFIG_DIR: &str = "/etc/aaa-plugins/";
    /// Directory holding the plugin modules.
    pub const PLUGIN_DIR: &str = "/usr/lib/aaa-plugins/";
    /// File suffix appended to a descriptor name to find its module.
    pub const LIBRARY_SUFFIX: &str = ".so";
    /// File extension of descriptor files.
    pub const DESCRIPTOR_EXTENSION: &str = "json";
}

/// Environment variable names.
pub mod env_vars {
    pub const CONFIG_DIR: &str = "AAA_PLUGINS_CFG_DIR";
    pub const PLUGIN_DIR: &str = "AAA_PLUGINS_DIR";
    pub const ABI_VERSION: &str = "AAA_PLUGINS_ABI_VERSION";
    /// `true` switches the CLI to JSON log output.
    pub const LOG_JSON: &str = "AAA_LOG_JSON";
}

/// Where to find descriptors and modules, and which ABI to accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoaderConfig {
    pub config_dir: PathBuf,
    pub plugin_dir: PathBuf,
    /// The single ABI version accepted from plugins.
    pub abi_version: u32,
    pub library_suffix: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(defaults::CONFIG_DIR),
            plugin_dir: PathBuf::from(defaults::PLUGIN_DIR),
            abi_version: aaa_plugin_sdk::CURRENT_ABI_VERSION,
            library_suffix: defaults::LIBRARY_SUFFIX.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn new(config_dir: impl Into<PathBuf>, plugin_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            plugin_dir: plugin_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_abi_version(mut self, abi_version: u32) -> Self {
        self.abi_version = abi_version;
        self
    }

    pub fn with_library_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.library_suffix = suffix.into();
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// Override fields from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, keyed by the names in [`env_vars`].
    ///
    /// An unparsable ABI version is ignored with a warning.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(env_vars::CONFIG_DIR).filter(|v| !v.is_empty()) {
            self.config_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(env_vars::PLUGIN_DIR).filter(|v| !v.is_empty()) {
            self.plugin_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(env_vars::ABI_VERSION) {
            match raw.trim().parse() {
                Ok(version) => self.abi_version = version,
                Err(_) => warn!(
                    category = "config",
                    value = %raw,
                    "Ignoring invalid {}", env_vars::ABI_VERSION
                ),
            }
        }
        self
    }

    /// Parse a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Location of the module for a descriptor named `name`.
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.plugin_dir
            .join(format!("{}{}", name, self.library_suffix))
    }
}
