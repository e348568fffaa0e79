//! Capability traits, one per ABI generation.
//!
//! Common parameters:
//! - `context`: the mode the command runs in (e.g. `"conf-mode"` or
//!   `"op-mode"`), so a protocol can tell `show interfaces` in one mode from
//!   the other.
//! - `uid`: the UID of the user who originally executed the path.
//! - `groups`: the groups the user is a member of.
//! - `path`: the fully resolved (no abbreviations) path.
//! - `path_attrs`: metadata of the path.
//! - `env`: available environment attributes, see [`ENV_TTY`].

use std::collections::HashMap;

use crate::error::PluginResult;
use crate::path::PathAttrs;

/// Environment attributes passed to accounting and authorization calls.
pub type Env = HashMap<String, String>;

/// `env` key holding the terminal name, e.g. `ttyS0`.
pub const ENV_TTY: &str = "tty";

/// Outcome of a guarded action reported to [`AaaTask::account_stop`]:
/// `None` on success, the failure otherwise.
pub type TaskOutcome<'a> = Option<&'a (dyn std::error::Error + 'static)>;

/// A bracketed accounting session for one user action.
pub trait AaaTask: Send {
    /// Record that the action started.
    fn account_start(&mut self) -> PluginResult<()>;

    /// Record that the action finished, with its outcome.
    fn account_stop(&mut self, outcome: TaskOutcome<'_>) -> PluginResult<()>;
}

/// ABI version 2 capability interface (task-based accounting).
pub trait AaaPluginV2: Send + Sync {
    /// Called once on startup and on every reload. Should only fail if the
    /// plugin is not usable and should be skipped.
    fn setup(&mut self) -> PluginResult<()>;

    /// Whether the user is valid for, and required to use, this protocol.
    /// Should only fail if the check could not be performed.
    fn valid_user(&self, uid: u32, groups: &[String]) -> PluginResult<bool>;

    /// Open an accounting task for `path`.
    fn new_task<'a>(
        &'a self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
        env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>>;

    /// Authorize `path`.
    ///
    /// Should only fail if the protocol hit an error that prevented the
    /// request; every decision, including deny, is `Ok`. A failure makes the
    /// caller skip this protocol and try the next configured one.
    fn authorize(
        &self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
    ) -> PluginResult<bool>;
}

/// ABI version 1 capability interface (single-call accounting).
pub trait AaaPluginV1: Send + Sync {
    fn setup(&mut self) -> PluginResult<()>;

    fn valid_user(&self, uid: u32, groups: &[String]) -> PluginResult<bool>;

    /// Account a completed `path`.
    fn account(
        &self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
        env: &Env,
    ) -> PluginResult<()>;

    fn authorize(
        &self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
    ) -> PluginResult<bool>;
}
