//! ABI version negotiation.
//!
//! A host accepts exactly one ABI version per load pass. Each known version
//! has a loader in `INTERFACE_TABLE` that checks the entry point and
//! reclaims the implementation as that version's trait object. Symbols are
//! checked for alignment and their magic tag before being read as structs.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use aaa_plugin_sdk::abi::{self, CreateFn, PluginEntry, ABI_VERSION_MAGIC, ENTRY_MAGIC};
use aaa_plugin_sdk::{entry_symbol_name, AbiVersionSymbol, ABI_VERSION_SYMBOL};
use tracing::debug;

use super::{LegacyPlugin, LoadedPlugin, ModuleOpener, PluginModule};
use crate::error::{AbiError, RegistryError};
use crate::protocol::AaaPlugin;

/// Checks an entry point for one ABI version and builds the implementation.
type InterfaceLoader = fn(&str, &str, NonNull<c_void>) -> Result<Box<dyn AaaPlugin>, AbiError>;

const INTERFACE_TABLE: &[(u32, InterfaceLoader)] = &[(1, load_v1), (2, load_v2)];

/// ABI versions a host can be configured for.
pub fn supported_abi_versions() -> Vec<u32> {
    INTERFACE_TABLE.iter().map(|(v, _)| *v).collect()
}

/// Resolves modules speaking one configured ABI version.
pub struct AbiResolver {
    version: u32,
    load_interface: InterfaceLoader,
    opener: Arc<dyn ModuleOpener>,
}

impl AbiResolver {
    pub fn new(version: u32, opener: Arc<dyn ModuleOpener>) -> Result<Self, RegistryError> {
        let load_interface = INTERFACE_TABLE
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, loader)| *loader)
            .ok_or_else(|| RegistryError::UnsupportedAbi {
                version,
                known: supported_abi_versions(),
            })?;

        Ok(Self {
            version,
            load_interface,
            opener,
        })
    }

    /// The ABI version this resolver accepts.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Open the module at `path` and resolve the plugin `name` from it.
    pub fn resolve(&self, name: &str, path: &Path) -> Result<LoadedPlugin, AbiError> {
        let module = self.opener.open(path).map_err(|source| AbiError::Open {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
        self.resolve_module(name, module)
    }

    /// Resolve the plugin `name` from an already opened module.
    pub fn resolve_module(
        &self,
        name: &str,
        module: Arc<dyn PluginModule>,
    ) -> Result<LoadedPlugin, AbiError> {
        let found = read_version(name, module.as_ref())?;
        if found != self.version {
            return Err(AbiError::VersionMismatch {
                name: name.to_string(),
                found,
                supported: self.version,
            });
        }

        let symbol = entry_symbol_name(found);
        let addr = module
            .symbol(&symbol)
            .ok_or_else(|| AbiError::SymbolMissing {
                name: name.to_string(),
                symbol: symbol.clone(),
            })?;

        let plugin = (self.load_interface)(name, &symbol, addr)?;

        debug!(
            category = "aaa",
            protocol = %name,
            abi_version = found,
            module = %module.path().display(),
            "Resolved plugin entry point"
        );
        Ok(LoadedPlugin::new(plugin, module, found))
    }
}

fn read_version(name: &str, module: &dyn PluginModule) -> Result<u32, AbiError> {
    let addr = module
        .symbol(ABI_VERSION_SYMBOL)
        .ok_or_else(|| AbiError::SymbolMissing {
            name: name.to_string(),
            symbol: ABI_VERSION_SYMBOL.to_string(),
        })?;

    let mismatch = || AbiError::TypeMismatch {
        name: name.to_string(),
        symbol: ABI_VERSION_SYMBOL.to_string(),
    };
    if !is_aligned_for::<AbiVersionSymbol>(addr) || !has_tag(addr, &ABI_VERSION_MAGIC) {
        return Err(mismatch());
    }

    // SAFETY: aligned and tagged as an `AbiVersionSymbol`.
    let symbol = unsafe { addr.cast::<AbiVersionSymbol>().as_ref() };
    Ok(symbol.version)
}

fn is_aligned_for<T>(addr: NonNull<c_void>) -> bool {
    addr.as_ptr().cast::<T>().is_aligned()
}

/// Both symbol layouts start with an 8-byte tag. Its first four bytes are
/// compared before the rest is read, so a symbol no larger than a `u32` is
/// never read past its end.
fn has_tag(addr: NonNull<c_void>, tag: &[u8; 8]) -> bool {
    // SAFETY: a symbol exported under an ABI name is at least 4 bytes; the
    // bytes are read unaligned.
    let prefix = unsafe { addr.as_ptr().cast::<[u8; 4]>().read_unaligned() };
    if prefix != tag[..4] {
        return false;
    }
    // SAFETY: the prefix matched, so the symbol has a tagged layout, which
    // is at least 8 bytes.
    let full = unsafe { addr.as_ptr().cast::<[u8; 8]>().read_unaligned() };
    full == *tag
}

fn check_entry(
    name: &str,
    symbol: &str,
    version: u32,
    addr: NonNull<c_void>,
) -> Result<CreateFn, AbiError> {
    let mismatch = |reason| AbiError::InterfaceMismatch {
        name: name.to_string(),
        symbol: symbol.to_string(),
        version,
        reason,
    };

    if !is_aligned_for::<PluginEntry>(addr) || !has_tag(addr, &ENTRY_MAGIC) {
        return Err(mismatch("entry point is not a plugin entry"));
    }
    // SAFETY: aligned and tagged as a `PluginEntry`.
    let entry = unsafe { addr.cast::<PluginEntry>().as_ref() };
    if entry.abi_version != version {
        return Err(mismatch("entry point declares a different ABI version"));
    }
    entry.create.ok_or_else(|| mismatch("entry point has no constructor"))
}

fn create(name: &str, create: CreateFn) -> Result<NonNull<c_void>, AbiError> {
    // SAFETY: `create` comes from a checked entry point.
    let raw = unsafe { create() };
    NonNull::new(raw).ok_or_else(|| AbiError::CreateFailed {
        name: name.to_string(),
    })
}

fn load_v2(
    name: &str,
    symbol: &str,
    entry: NonNull<c_void>,
) -> Result<Box<dyn AaaPlugin>, AbiError> {
    let ctor = check_entry(name, symbol, 2, entry)?;
    let raw = create(name, ctor)?;
    // SAFETY: a version 2 constructor returns the result of `into_raw_v2`.
    Ok(unsafe { abi::from_raw_v2(raw.as_ptr()) })
}

fn load_v1(
    name: &str,
    symbol: &str,
    entry: NonNull<c_void>,
) -> Result<Box<dyn AaaPlugin>, AbiError> {
    let ctor = check_entry(name, symbol, 1, entry)?;
    let raw = create(name, ctor)?;
    // SAFETY: a version 1 constructor returns the result of `into_raw_v1`.
    let legacy = unsafe { abi::from_raw_v1(raw.as_ptr()) };
    Ok(Box::new(LegacyPlugin::new(legacy)))
}
