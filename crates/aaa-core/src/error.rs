//! Error types for the AAA plugin loader.
//!
//! Descriptor, ABI and setup errors are scoped to one plugin: the loader
//! logs them and leaves that protocol out. Only [`RegistryError`] is
//! surfaced from a load pass.

use std::fmt;
use std::path::PathBuf;

use aaa_plugin_sdk::PluginError;

/// A loader configuration file could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read loader config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse loader config{}: {source}", display_opt_path(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },
}

fn display_opt_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

/// A descriptor file could not be turned into a [`PluginDescriptor`].
///
/// [`PluginDescriptor`]: crate::protocol::PluginDescriptor
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("Failed opening plugin config file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode plugin config file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid plugin name {name:?} in {path}: {reason}")]
    InvalidName {
        path: PathBuf,
        name: String,
        reason: &'static str,
    },
}

/// A module file could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum ModuleOpenError {
    #[error("module file does not exist")]
    NotFound,

    #[error(transparent)]
    Library(#[from] libloading::Error),
}

/// A module could not be turned into a live implementation.
#[derive(Debug, thiserror::Error)]
pub enum AbiError {
    #[error("Could not load plugin {name} from {path}: {source}")]
    Open {
        name: String,
        path: PathBuf,
        #[source]
        source: ModuleOpenError,
    },

    #[error("Plugin {name} does not export {symbol}")]
    SymbolMissing { name: String, symbol: String },

    #[error("Unexpected type from {symbol} symbol in plugin {name}")]
    TypeMismatch { name: String, symbol: String },

    #[error("Unsupported ABI version for plugin {name}: plugin implements {found}, host supports {supported}")]
    VersionMismatch {
        name: String,
        found: u32,
        supported: u32,
    },

    #[error("Entry point {symbol} of plugin {name} does not satisfy the ABI {version} interface: {reason}")]
    InterfaceMismatch {
        name: String,
        symbol: String,
        version: u32,
        reason: &'static str,
    },

    #[error("Plugin {name} failed to construct its implementation")]
    CreateFailed { name: String },
}

/// Setup of a resolved implementation did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Setup of plugin {name} failed: {source}")]
    Failed {
        name: String,
        #[source]
        source: PluginError,
    },

    #[error("Setup of plugin {name} panicked: {message}")]
    Panicked { name: String, message: String },

    #[error("Could not start setup worker for plugin {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why one descriptor did not produce a protocol.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Duplicate protocol name {name}: {path} conflicts with {first}")]
    DuplicateName {
        name: String,
        path: PathBuf,
        first: PathBuf,
    },
}

/// Pipeline step at which a descriptor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Descriptor,
    Open,
    SymbolMissing,
    TypeMismatch,
    VersionMismatch,
    Interface,
    Setup,
    Duplicate,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadStage::Descriptor => "descriptor",
            LoadStage::Open => "open",
            LoadStage::SymbolMissing => "symbol-missing",
            LoadStage::TypeMismatch => "type-mismatch",
            LoadStage::VersionMismatch => "version-mismatch",
            LoadStage::Interface => "interface",
            LoadStage::Setup => "setup",
            LoadStage::Duplicate => "duplicate",
        };
        f.write_str(s)
    }
}

impl LoadError {
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::Descriptor(_) => LoadStage::Descriptor,
            LoadError::Abi(AbiError::Open { .. }) => LoadStage::Open,
            LoadError::Abi(AbiError::SymbolMissing { .. }) => LoadStage::SymbolMissing,
            LoadError::Abi(AbiError::TypeMismatch { .. }) => LoadStage::TypeMismatch,
            LoadError::Abi(AbiError::VersionMismatch { .. }) => LoadStage::VersionMismatch,
            LoadError::Abi(AbiError::InterfaceMismatch { .. } | AbiError::CreateFailed { .. }) => {
                LoadStage::Interface
            }
            LoadError::Setup(_) => LoadStage::Setup,
            LoadError::DuplicateName { .. } => LoadStage::Duplicate,
        }
    }
}

/// A load pass could not run at all.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Cannot read plugin config directory {path}: {source}")]
    ConfigDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Host cannot be configured for ABI version {version}; known versions: {known:?}")]
    UnsupportedAbi { version: u32, known: Vec<u32> },
}
