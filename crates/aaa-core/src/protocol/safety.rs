//! Lifecycle guard.
//!
//! Plugin setup runs on a dedicated worker thread under `catch_unwind`, so a
//! panic in plugin code comes back as [`SetupError::Panicked`] instead of
//! taking the host down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use aaa_plugin_sdk::PluginError;
use tracing::{debug, error, warn};

use super::loader::LoadedPlugin;
use crate::error::SetupError;

enum SetupOutcome {
    Completed(LoadedPlugin),
    Failed(PluginError),
    Panicked(String),
}

/// Run the one-time setup of `loaded`.
///
/// Consumes the plugin and hands it back only if setup succeeded; there is
/// no retry. A plugin whose setup fails or panics is torn down on the worker
/// thread, so a panicking destructor is contained as well.
pub fn run_setup(name: &str, mut loaded: LoadedPlugin) -> Result<LoadedPlugin, SetupError> {
    let protocol = name.to_string();
    let worker = thread::Builder::new()
        .name(format!("aaa-setup-{name}"))
        .spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(|| loaded.plugin_mut().setup())) {
                Ok(Ok(())) => SetupOutcome::Completed(loaded),
                Ok(Err(source)) => {
                    teardown(&protocol, loaded);
                    SetupOutcome::Failed(source)
                }
                Err(payload) => {
                    // The payload may be owned by plugin code: release it
                    // before the module can be unmapped.
                    let message = panic_message(payload.as_ref());
                    drop(payload);
                    teardown(&protocol, loaded);
                    SetupOutcome::Panicked(message)
                }
            }
        })
        .map_err(|source| SetupError::Spawn {
            name: name.to_string(),
            source,
        })?;

    match worker.join() {
        Ok(SetupOutcome::Completed(loaded)) => {
            debug!(category = "aaa", protocol = %name, "Plugin setup completed");
            Ok(loaded)
        }
        Ok(SetupOutcome::Failed(source)) => Err(SetupError::Failed {
            name: name.to_string(),
            source,
        }),
        Ok(SetupOutcome::Panicked(message)) => {
            error!(category = "aaa", protocol = %name, panic = %message, "Plugin panicked during setup");
            Err(SetupError::Panicked {
                name: name.to_string(),
                message,
            })
        }
        Err(payload) => Err(SetupError::Panicked {
            name: name.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Drop a plugin that will not be registered.
///
/// The implementation goes first, then any panic payload its destructor
/// raised, and the module last.
fn teardown(name: &str, loaded: LoadedPlugin) {
    let (plugin, module) = loaded.into_parts();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(plugin))) {
        let message = panic_message(payload.as_ref());
        drop(payload);
        warn!(category = "aaa", protocol = %name, panic = %message, "Plugin panicked during teardown");
    }
    drop(module);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let p: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(p.as_ref()), "static str");

        let p: Box<dyn Any + Send> = Box::new(format!("formatted {}", 42));
        assert_eq!(panic_message(p.as_ref()), "formatted 42");

        let p: Box<dyn Any + Send> = Box::new(17_u8);
        assert_eq!(panic_message(p.as_ref()), "non-string panic payload");
    }
}
