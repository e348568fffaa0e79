//! Reloadable registry handle.
//!
//! Readers take a snapshot (`Arc<ProtocolRegistry>`) and keep using it for as
//! long as they like; a reload builds a complete new registry and swaps the
//! pointer. Nobody ever observes a partially replaced registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::registry::{AaaLoader, ProtocolRegistry};
use crate::error::RegistryError;

/// Protocol names that changed between two registries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub retained: Vec<String>,
}

impl RegistryDiff {
    pub fn between(old: &ProtocolRegistry, new: &ProtocolRegistry) -> Self {
        let old_names: BTreeSet<&str> = old.names().into_iter().collect();
        let new_names: BTreeSet<&str> = new.names().into_iter().collect();

        let owned = |names: Vec<&&str>| -> Vec<String> {
            names.into_iter().map(|s| s.to_string()).collect()
        };
        Self {
            added: owned(new_names.difference(&old_names).collect()),
            removed: owned(old_names.difference(&new_names).collect()),
            retained: owned(old_names.intersection(&new_names).collect()),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The current registry, replaceable as a whole.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<ProtocolRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: ProtocolRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry as of now.
    pub fn snapshot(&self) -> Arc<ProtocolRegistry> {
        self.current.read().clone()
    }

    /// Install `registry`, returning the one it replaced.
    pub fn replace(&self, registry: ProtocolRegistry) -> Arc<ProtocolRegistry> {
        let next = Arc::new(registry);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Run a load pass and install its result.
    ///
    /// On failure the current registry stays in place.
    pub fn reload(&self, loader: &AaaLoader) -> Result<RegistryDiff, RegistryError> {
        let next = match loader.load() {
            Ok(registry) => registry,
            Err(e) => {
                warn!(category = "aaa", error = %e, "Reload failed, keeping current protocols");
                return Err(e);
            }
        };

        let previous = self.snapshot();
        let diff = RegistryDiff::between(&previous, &next);
        // Drop our reference to the old registry outside the lock.
        let _old = self.replace(next);
        drop(previous);

        info!(
            category = "aaa",
            added = ?diff.added,
            removed = ?diff.removed,
            retained = diff.retained.len(),
            "AAA protocols reloaded"
        );
        Ok(diff)
    }
}
