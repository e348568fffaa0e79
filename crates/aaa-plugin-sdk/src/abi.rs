//! Exported symbol layouts.
//!
//! Every plugin module exports exactly two data symbols. Both carry a magic
//! tag so the host can tell a symbol of the right name but the wrong shape
//! from a genuine one.
//!
//! The host reads the first four bytes of whatever is exported under either
//! name, and the full 8-byte tag only once those match. A symbol under an
//! ABI name must therefore be at least 4 bytes and aligned for its layout;
//! a bare `u32` version is rejected as a type mismatch without being read
//! past its end. The two tags differ within their first four bytes.

use std::ffi::c_void;

use crate::plugin::{AaaPluginV1, AaaPluginV2};

/// ABI version the current host and SDK speak.
pub const CURRENT_ABI_VERSION: u32 = 2;

/// Name of the exported [`AbiVersionSymbol`].
pub const ABI_VERSION_SYMBOL: &str = "aaa_plugin_api_version";

/// Prefix of the versioned entry-point symbol (`aaa_plugin_v<N>`).
pub const ENTRY_SYMBOL_PREFIX: &str = "aaa_plugin_v";

/// Tag stored in every [`AbiVersionSymbol`].
pub const ABI_VERSION_MAGIC: [u8; 8] = *b"AAAVERS\0";

/// Tag stored in every [`PluginEntry`].
pub const ENTRY_MAGIC: [u8; 8] = *b"AAAENTR\0";

/// Name of the entry-point symbol for `version`.
pub fn entry_symbol_name(version: u32) -> String {
    format!("{ENTRY_SYMBOL_PREFIX}{version}")
}

/// Exported under [`ABI_VERSION_SYMBOL`].
#[repr(C)]
#[derive(Debug)]
pub struct AbiVersionSymbol {
    pub magic: [u8; 8],
    pub version: u32,
}

impl AbiVersionSymbol {
    pub const fn new(version: u32) -> Self {
        Self {
            magic: ABI_VERSION_MAGIC,
            version,
        }
    }

    /// Whether the magic tag identifies this as a version symbol.
    pub fn is_well_formed(&self) -> bool {
        self.magic == ABI_VERSION_MAGIC
    }
}

/// Constructor exported through a [`PluginEntry`].
///
/// Returns an owned, boxed trait object for the entry's ABI version (see
/// [`into_raw_v1`] / [`into_raw_v2`]), or null if the plugin could not be
/// constructed.
pub type CreateFn = unsafe extern "C" fn() -> *mut c_void;

/// Exported under [`entry_symbol_name`]`(abi_version)`.
#[repr(C)]
#[derive(Debug)]
pub struct PluginEntry {
    pub magic: [u8; 8],
    /// Must equal the version in the symbol name.
    pub abi_version: u32,
    pub create: Option<CreateFn>,
}

impl PluginEntry {
    pub const fn new(abi_version: u32, create: CreateFn) -> Self {
        Self {
            magic: ENTRY_MAGIC,
            abi_version,
            create: Some(create),
        }
    }

    /// Whether the magic tag identifies this as an entry point.
    pub fn is_well_formed(&self) -> bool {
        self.magic == ENTRY_MAGIC
    }
}

/// Hand a version-2 implementation across the boundary.
pub fn into_raw_v2(plugin: Box<dyn AaaPluginV2>) -> *mut c_void {
    Box::into_raw(Box::new(plugin)).cast()
}

/// Reclaim a version-2 implementation produced by [`into_raw_v2`].
///
/// # Safety
/// `raw` must be non-null, must come from [`into_raw_v2`] in a module built
/// with the same toolchain and SDK, and must not be reclaimed twice.
pub unsafe fn from_raw_v2(raw: *mut c_void) -> Box<dyn AaaPluginV2> {
    // SAFETY: upheld by caller
    unsafe { *Box::from_raw(raw.cast::<Box<dyn AaaPluginV2>>()) }
}

/// Hand a version-1 implementation across the boundary.
pub fn into_raw_v1(plugin: Box<dyn AaaPluginV1>) -> *mut c_void {
    Box::into_raw(Box::new(plugin)).cast()
}

/// Reclaim a version-1 implementation produced by [`into_raw_v1`].
///
/// # Safety
/// Same contract as [`from_raw_v2`].
pub unsafe fn from_raw_v1(raw: *mut c_void) -> Box<dyn AaaPluginV1> {
    // SAFETY: upheld by caller
    unsafe { *Box::from_raw(raw.cast::<Box<dyn AaaPluginV1>>()) }
}
