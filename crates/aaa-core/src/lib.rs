//! Host side of the AAA plugin system.
//!
//! Discovers per-plugin descriptors, negotiates the plugin ABI, runs each
//! plugin's setup behind a panic boundary and assembles the protocol
//! registry consulted for command accounting and authorization.
//!
//! ```rust,no_run
//! use aaa_core::{AaaLoader, LoaderConfig};
//!
//! let loader = AaaLoader::new(LoaderConfig::from_env())?;
//! let registry = loader.load()?;
//! for protocol in registry.authorization_protocols() {
//!     println!("{}", protocol.name());
//! }
//! # Ok::<(), aaa_core::RegistryError>(())
//! ```

pub mod config;
pub mod error;
pub mod protocol;

pub use config::LoaderConfig;
pub use error::{
    AbiError, ConfigError, DescriptorError, LoadError, LoadStage, ModuleOpenError, RegistryError,
    SetupError,
};
pub use protocol::{
    load_aaa, AaaLoader, AaaPlugin, LoadFailure, LoadReport, PluginDescriptor, Protocol,
    ProtocolRegistry, RegistryDiff, SharedRegistry,
};

// SDK types that appear in the host API.
pub use aaa_plugin_sdk::{AaaTask, Env, PathAttrs, PluginError, PluginResult, ENV_TTY};
