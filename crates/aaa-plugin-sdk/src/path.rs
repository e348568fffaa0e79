//! Per-element metadata for a resolved command path.

use serde::{Deserialize, Serialize};

/// Placeholder written in place of a secret path element.
pub const REDACTED: &str = "**";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElementAttrs {
    /// The element holds a secret value (password, key).
    #[serde(default)]
    pub secret: bool,
}

/// Metadata of a path, one entry per path element.
///
/// Elements past the end of `attrs` carry no attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAttrs {
    #[serde(default)]
    pub attrs: Vec<PathElementAttrs>,
}

impl PathAttrs {
    pub fn new(attrs: Vec<PathElementAttrs>) -> Self {
        Self { attrs }
    }

    /// Attributes for a path of `len` elements with nothing marked.
    pub fn plain(len: usize) -> Self {
        Self {
            attrs: vec![PathElementAttrs::default(); len],
        }
    }

    /// Mark element `index` as secret, growing the attribute list if needed.
    pub fn with_secret(mut self, index: usize) -> Self {
        if self.attrs.len() <= index {
            self.attrs.resize(index + 1, PathElementAttrs::default());
        }
        self.attrs[index].secret = true;
        self
    }

    pub fn is_secret(&self, index: usize) -> bool {
        self.attrs.get(index).is_some_and(|a| a.secret)
    }

    pub fn has_secrets(&self) -> bool {
        self.attrs.iter().any(|a| a.secret)
    }

    /// Copy of `path` with every secret element replaced by [`REDACTED`].
    pub fn redact(&self, path: &[String]) -> Vec<String> {
        path.iter()
            .enumerate()
            .map(|(i, elem)| {
                if self.is_secret(i) {
                    REDACTED.to_string()
                } else {
                    elem.clone()
                }
            })
            .collect()
    }
}
