//! Protocol registry assembly.
//!
//! [`AaaLoader`] drives every descriptor through decode, ABI resolution and
//! guarded setup. Per-descriptor failures are logged and recorded in the
//! [`LoadReport`]; only an unreadable config directory fails the pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::descriptor::{DescriptorStore, PluginDescriptor};
use super::loader::{AbiResolver, LoadedPlugin, ModuleOpener, NativeModuleOpener};
use super::safety::run_setup;
use super::AaaPlugin;
use crate::config::LoaderConfig;
use crate::error::{LoadError, RegistryError};

/// A configured, loaded and set-up AAA backend.
#[derive(Debug)]
pub struct Protocol {
    config: PluginDescriptor,
    plugin: LoadedPlugin,
    source: PathBuf,
    loaded_at: DateTime<Utc>,
}

impl Protocol {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PluginDescriptor {
        &self.config
    }

    pub fn plugin(&self) -> &dyn AaaPlugin {
        self.plugin.plugin()
    }

    pub fn command_accounting(&self) -> bool {
        self.config.command_accounting
    }

    pub fn command_authorization(&self) -> bool {
        self.config.command_authorization
    }

    /// ABI version the module declared.
    pub fn abi_version(&self) -> u32 {
        self.plugin.abi_version()
    }

    /// Descriptor file this protocol was configured from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn module_path(&self) -> &Path {
        self.plugin.module_path()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Read-only mapping from protocol name to [`Protocol`].
#[derive(Debug, Default)]
pub struct ProtocolRegistry {
    protocols: HashMap<String, Arc<Protocol>>,
}

impl ProtocolRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<Protocol>> {
        self.protocols.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.protocols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Protocol names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All protocols in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Protocol>> {
        self.protocols.values()
    }

    /// Protocols opted into command accounting, sorted by name.
    pub fn accounting_protocols(&self) -> Vec<&Arc<Protocol>> {
        self.sorted_where(|p| p.command_accounting())
    }

    /// Protocols opted into command authorization, sorted by name.
    pub fn authorization_protocols(&self) -> Vec<&Arc<Protocol>> {
        self.sorted_where(|p| p.command_authorization())
    }

    fn sorted_where(&self, pred: impl Fn(&Protocol) -> bool) -> Vec<&Arc<Protocol>> {
        let mut matching: Vec<_> = self.protocols.values().filter(|p| pred(p)).collect();
        matching.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        matching
    }

    fn insert(&mut self, protocol: Protocol) {
        self.protocols
            .insert(protocol.name().to_string(), Arc::new(protocol));
    }
}

/// A descriptor that did not produce a protocol.
#[derive(Debug)]
pub struct LoadFailure {
    pub source: PathBuf,
    pub error: LoadError,
}

/// Result of a load pass with the failures it absorbed.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub registry: ProtocolRegistry,
    pub failures: Vec<LoadFailure>,
}

/// Builds protocol registries from a descriptor directory.
pub struct AaaLoader {
    config: LoaderConfig,
    store: DescriptorStore,
    resolver: AbiResolver,
}

impl AaaLoader {
    /// Loader using the platform dynamic loader.
    pub fn new(config: LoaderConfig) -> Result<Self, RegistryError> {
        Self::with_opener(config, Arc::new(NativeModuleOpener::new()))
    }

    /// Fails if the configured ABI version is unknown to this host.
    pub fn with_opener(
        config: LoaderConfig,
        opener: Arc<dyn ModuleOpener>,
    ) -> Result<Self, RegistryError> {
        let resolver = AbiResolver::new(config.abi_version, opener)?;
        let store = DescriptorStore::new(config.config_dir.clone());
        Ok(Self {
            config,
            store,
            resolver,
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load all AAA protocols.
    pub fn load(&self) -> Result<ProtocolRegistry, RegistryError> {
        Ok(self.load_with_report()?.registry)
    }

    /// Load all AAA protocols, keeping the per-descriptor failures.
    pub fn load_with_report(&self) -> Result<LoadReport, RegistryError> {
        let files = self.store.list().map_err(|source| RegistryError::ConfigDir {
            path: self.store.dir().to_path_buf(),
            source,
        })?;

        let mut report = LoadReport::default();
        for path in files {
            match self.load_unique(&path, &report.registry) {
                Ok(protocol) => {
                    info!(
                        category = "aaa",
                        protocol = %protocol.name(),
                        accounting = protocol.command_accounting(),
                        authorization = protocol.command_authorization(),
                        "Loaded AAA protocol"
                    );
                    report.registry.insert(protocol);
                }
                Err(error) => {
                    warn!(
                        category = "aaa",
                        path = %path.display(),
                        stage = %error.stage(),
                        "{}", error
                    );
                    report.failures.push(LoadFailure {
                        source: path,
                        error,
                    });
                }
            }
        }

        info!(
            category = "aaa",
            loaded = report.registry.len(),
            failed = report.failures.len(),
            abi_version = self.resolver.version(),
            "AAA protocol load pass finished"
        );
        Ok(report)
    }

    /// Run one descriptor file through decode, resolution and setup.
    pub fn load_descriptor_file(&self, path: &Path) -> Result<Protocol, LoadError> {
        let config = PluginDescriptor::from_file(path)?;
        self.load_descriptor(config, path)
    }

    fn load_unique(&self, path: &Path, registry: &ProtocolRegistry) -> Result<Protocol, LoadError> {
        let config = PluginDescriptor::from_file(path)?;
        if let Some(existing) = registry.get(&config.name) {
            return Err(LoadError::DuplicateName {
                name: config.name,
                path: path.to_path_buf(),
                first: existing.source().to_path_buf(),
            });
        }
        self.load_descriptor(config, path)
    }

    fn load_descriptor(&self, config: PluginDescriptor, source: &Path) -> Result<Protocol, LoadError> {
        let module_path = self.config.module_path(&config.name);
        let loaded = self.resolver.resolve(&config.name, &module_path)?;
        let plugin = run_setup(&config.name, loaded)?;

        Ok(Protocol {
            config,
            plugin,
            source: source.to_path_buf(),
            loaded_at: Utc::now(),
        })
    }
}

/// Load all AAA protocols using configuration from the environment.
pub fn load_aaa() -> Result<ProtocolRegistry, RegistryError> {
    AaaLoader::new(LoaderConfig::from_env())?.load()
}
