//! Module loading and ABI negotiation.
//!
//! [`ModuleOpener`] turns a path into a [`PluginModule`] (a bag of exported
//! symbols); [`AbiResolver`] reads the version and entry-point symbols from
//! it and produces a [`LoadedPlugin`]. The production opener is
//! [`NativeModuleOpener`]; tests substitute in-process symbol tables.

use std::ffi::c_void;
use std::fmt;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::error::ModuleOpenError;
use crate::protocol::AaaPlugin;

mod legacy;
pub mod native;
pub mod resolver;

pub use legacy::LegacyPlugin;
pub use native::{NativeModule, NativeModuleOpener};
pub use resolver::{supported_abi_versions, AbiResolver};

/// An opened plugin module.
pub trait PluginModule: Send + Sync {
    /// Address of the exported symbol `name`, if it exists and is non-null.
    ///
    /// The address is not interpreted here; the caller decides what type
    /// lives there.
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;

    /// File the module was opened from.
    fn path(&self) -> &Path;
}

/// Opens plugin modules.
pub trait ModuleOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, ModuleOpenError>;
}

/// A live implementation together with the module its code lives in.
pub struct LoadedPlugin {
    // Declared before `module`: the implementation must be dropped while its
    // code is still mapped.
    plugin: Box<dyn AaaPlugin>,
    module: Arc<dyn PluginModule>,
    abi_version: u32,
}

impl LoadedPlugin {
    pub fn new(plugin: Box<dyn AaaPlugin>, module: Arc<dyn PluginModule>, abi_version: u32) -> Self {
        Self {
            plugin,
            module,
            abi_version,
        }
    }

    pub fn plugin(&self) -> &dyn AaaPlugin {
        self.plugin.as_ref()
    }

    pub(crate) fn plugin_mut(&mut self) -> &mut dyn AaaPlugin {
        self.plugin.as_mut()
    }

    /// Split into the implementation and its module. The caller must drop
    /// the implementation first.
    pub(crate) fn into_parts(self) -> (Box<dyn AaaPlugin>, Arc<dyn PluginModule>) {
        (self.plugin, self.module)
    }

    pub fn module_path(&self) -> &Path {
        self.module.path()
    }

    /// ABI version the module declared.
    pub fn abi_version(&self) -> u32 {
        self.abi_version
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("module", &self.module.path())
            .field("abi_version", &self.abi_version)
            .finish_non_exhaustive()
    }
}
