//! Plugin error types.

/// Error returned by plugin operations.
///
/// For `authorize`, any of these means the exchange itself failed and the
/// caller may fall through to the next protocol; a deliberate deny is
/// `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// The plugin cannot be used at all.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// The plugin's configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No backend server could be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A backend was reached but the exchange failed.
    #[error("Protocol exchange failed: {0}")]
    Exchange(String),

    #[error("{0}")]
    Custom(String),
}

/// Plugin result type
pub type PluginResult<T> = Result<T, PluginError>;
