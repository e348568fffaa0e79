//! AAA protocol plugins: descriptors, loading, guarded setup and the
//! resulting registry.
//!
//! Data flows one way, once per load pass:
//! descriptor store → ABI resolver → lifecycle guard → registry.

pub mod descriptor;
pub mod loader;
pub mod registry;
pub mod safety;
pub mod shared;

/// The capability interface every loaded protocol exposes. Version 1
/// plugins are adapted to it.
pub use aaa_plugin_sdk::AaaPluginV2 as AaaPlugin;

pub use descriptor::{DescriptorStore, PluginDescriptor};
pub use loader::{
    supported_abi_versions, AbiResolver, LoadedPlugin, ModuleOpener, NativeModuleOpener,
    PluginModule,
};
pub use registry::{load_aaa, AaaLoader, LoadFailure, LoadReport, Protocol, ProtocolRegistry};
pub use safety::run_setup;
pub use shared::{RegistryDiff, SharedRegistry};
