//! Native module opener for .so/.dylib/.dll files.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use super::{ModuleOpener, PluginModule};
use crate::error::ModuleOpenError;

/// A dynamic library kept mapped for as long as this value lives.
pub struct NativeModule {
    library: Library,
    path: PathBuf,
}

impl NativeModule {
    /// Open the library at `path`.
    ///
    /// Opening runs the library's initializers, so only trusted plugin
    /// directories should be configured.
    pub fn open(path: &Path) -> Result<Self, ModuleOpenError> {
        if !path.exists() {
            return Err(ModuleOpenError::NotFound);
        }

        // SAFETY: loading runs foreign initializers; plugin modules are
        // trusted by configuration.
        let library = unsafe { Library::new(path)? };
        debug!(category = "aaa", path = %path.display(), "Opened plugin module");

        Ok(Self {
            library,
            path: path.to_path_buf(),
        })
    }
}

impl PluginModule for NativeModule {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        let mut raw = Vec::with_capacity(name.len() + 1);
        raw.extend_from_slice(name.as_bytes());
        raw.push(0);

        // SAFETY: the symbol is only read as an address, never called or
        // dereferenced here.
        let symbol: Symbol<'_, *mut c_void> = unsafe { self.library.get(&raw) }.ok()?;
        NonNull::new(*symbol)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Opens modules with the platform dynamic loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeModuleOpener;

impl NativeModuleOpener {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleOpener for NativeModuleOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, ModuleOpenError> {
        Ok(Arc::new(NativeModule::open(path)?))
    }
}
