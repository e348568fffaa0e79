//! Plugin descriptor files.
//!
//! One JSON file per plugin in the config directory:
//!
//! ```json
//! {"command-accounting": true, "command-authorization": false, "name": "tacplus"}
//! ```
//!
//! The file name is irrelevant; the `name` field identifies both the protocol
//! and its module.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::DESCRIPTOR_EXTENSION;
use crate::error::DescriptorError;

/// Configuration of one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    #[serde(rename = "command-accounting", default)]
    pub command_accounting: bool,

    #[serde(rename = "command-authorization", default)]
    pub command_authorization: bool,

    pub name: String,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            command_accounting: false,
            command_authorization: false,
            name: name.into(),
        }
    }

    pub fn with_accounting(mut self, enabled: bool) -> Self {
        self.command_accounting = enabled;
        self
    }

    pub fn with_authorization(mut self, enabled: bool) -> Self {
        self.command_authorization = enabled;
        self
    }

    /// Read and validate the descriptor at `path`.
    pub fn from_file(path: &Path) -> Result<Self, DescriptorError> {
        let file = File::open(path).map_err(|source| DescriptorError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let descriptor: Self = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            DescriptorError::Decode {
                path: path.to_path_buf(),
                source,
            }
        })?;
        descriptor.validate(path)?;
        Ok(descriptor)
    }

    /// The name is spliced into a module path, so it must be a plain file
    /// name component.
    fn validate(&self, path: &Path) -> Result<(), DescriptorError> {
        let reason = if self.name.is_empty() {
            Some("name is empty")
        } else if self.name == "." || self.name == ".." {
            Some("name is a relative directory")
        } else if self.name.contains(['/', '\\']) {
            Some("name contains a path separator")
        } else if self.name.contains('\0') {
            Some("name contains a NUL byte")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(DescriptorError::InvalidName {
                path: path.to_path_buf(),
                name: self.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// The directory of descriptor files.
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    dir: PathBuf,
}

impl DescriptorStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every regular `.json` file in the directory, sorted by path.
    ///
    /// Fails only if the directory cannot be opened or listed. Symlinks and
    /// subdirectories are skipped.
    pub fn list(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    debug!(category = "aaa", path = %path.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if file_type.is_file() && is_descriptor_file(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Decode every descriptor, one result per file.
    pub fn load_all(
        &self,
    ) -> std::io::Result<Vec<(PathBuf, Result<PluginDescriptor, DescriptorError>)>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|path| {
                let result = PluginDescriptor::from_file(&path);
                (path, result)
            })
            .collect())
    }
}

fn is_descriptor_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DESCRIPTOR_EXTENSION)
}
