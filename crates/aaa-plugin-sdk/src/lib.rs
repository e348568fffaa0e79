//! AAA Plugin SDK
//!
//! Shared contract between the AAA host and independently built protocol
//! plugins (TACACS+, RADIUS, ...). A plugin is a `cdylib` that exports two
//! symbols:
//!
//! - [`abi::ABI_VERSION_SYMBOL`]: an [`abi::AbiVersionSymbol`] holding the ABI
//!   version the plugin was written against.
//! - the entry point named by [`abi::entry_symbol_name`] for that version: a
//!   [`abi::PluginEntry`] whose constructor hands the host a boxed
//!   implementation of the matching capability trait.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aaa_plugin_sdk::prelude::*;
//!
//! struct Tacplus;
//!
//! impl AaaPluginV2 for Tacplus {
//!     // ...
//! }
//!
//! export_aaa_plugin!(v2: || Tacplus);
//! ```
//!
//! Host and plugin exchange Rust trait objects, so both must be built with
//! the same toolchain and with unwinding panics.

pub mod abi;
pub mod error;
#[macro_use]
pub mod macros;
pub mod path;
pub mod plugin;

pub use abi::{
    entry_symbol_name, AbiVersionSymbol, PluginEntry, ABI_VERSION_SYMBOL, CURRENT_ABI_VERSION,
    ENTRY_SYMBOL_PREFIX,
};
pub use error::{PluginError, PluginResult};
pub use path::{PathAttrs, PathElementAttrs};
pub use plugin::{AaaPluginV1, AaaPluginV2, AaaTask, Env, TaskOutcome, ENV_TTY};

/// Prelude module with common imports
pub mod prelude {
    pub use crate::error::{PluginError, PluginResult};
    pub use crate::path::{PathAttrs, PathElementAttrs};
    pub use crate::plugin::{AaaPluginV1, AaaPluginV2, AaaTask, Env, TaskOutcome, ENV_TTY};
    pub use crate::{export_aaa_plugin, CURRENT_ABI_VERSION};
}
