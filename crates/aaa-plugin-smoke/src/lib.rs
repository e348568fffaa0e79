//! Local-log AAA protocol.
//!
//! Appends one JSON line per accounting event to a local file and authorizes
//! from group membership alone. It needs no server, which makes it the
//! module of choice for checking a plugin directory end to end.
//!
//! Environment:
//! - `AAA_LOCAL_LOG_PATH`: log file (default `/var/log/aaa-local.log`)
//! - `AAA_LOCAL_LOG_ADMIN_GROUP`: group allowed every path (default `secadmin`)

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use aaa_plugin_sdk::prelude::*;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

pub const LOG_PATH_ENV: &str = "AAA_LOCAL_LOG_PATH";
pub const ADMIN_GROUP_ENV: &str = "AAA_LOCAL_LOG_ADMIN_GROUP";

const DEFAULT_LOG_PATH: &str = "/var/log/aaa-local.log";
const DEFAULT_ADMIN_GROUP: &str = "secadmin";

/// Lowest UID of a regular login user.
const FIRST_LOGIN_UID: u32 = 1000;

/// One line of the accounting log.
#[derive(Debug, Serialize)]
struct Record<'a> {
    timestamp: DateTime<Utc>,
    event: &'static str,
    context: &'a str,
    uid: u32,
    path: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    tty: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub struct LocalLog {
    log_path: PathBuf,
    admin_group: String,
    log: Mutex<Option<File>>,
}

impl LocalLog {
    pub fn new(log_path: impl Into<PathBuf>, admin_group: impl Into<String>) -> Self {
        Self {
            log_path: log_path.into(),
            admin_group: admin_group.into(),
            log: Mutex::new(None),
        }
    }

    pub fn from_env() -> Self {
        let log_path = std::env::var(LOG_PATH_ENV).unwrap_or_else(|_| DEFAULT_LOG_PATH.to_string());
        let admin_group =
            std::env::var(ADMIN_GROUP_ENV).unwrap_or_else(|_| DEFAULT_ADMIN_GROUP.to_string());
        Self::new(log_path, admin_group)
    }

    fn write(&self, record: &Record<'_>) -> PluginResult<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| PluginError::Exchange(e.to_string()))?;
        line.push('\n');

        let mut guard = self.log.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| PluginError::Unavailable("accounting log is not open".to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| PluginError::Exchange(format!("{}: {}", self.log_path.display(), e)))
    }
}

impl AaaPluginV2 for LocalLog {
    fn setup(&mut self) -> PluginResult<()> {
        if self.admin_group.is_empty() {
            return Err(PluginError::InvalidConfig("admin group is empty".to_string()));
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| PluginError::Setup(format!("{}: {}", self.log_path.display(), e)))?;
        *self.log.get_mut() = Some(file);
        tracing::debug!(path = %self.log_path.display(), "Local accounting log opened");
        Ok(())
    }

    fn valid_user(&self, uid: u32, _groups: &[String]) -> PluginResult<bool> {
        Ok(uid >= FIRST_LOGIN_UID)
    }

    fn new_task<'a>(
        &'a self,
        context: &str,
        uid: u32,
        _groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
        env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>> {
        Ok(Box::new(LogTask {
            plugin: self,
            context: context.to_string(),
            uid,
            path: path_attrs.redact(path),
            tty: env.get(ENV_TTY).cloned(),
            started: false,
        }))
    }

    fn authorize(
        &self,
        context: &str,
        _uid: u32,
        groups: &[String],
        path: &[String],
        _path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        if groups.iter().any(|g| *g == self.admin_group) {
            return Ok(true);
        }
        Ok(context == "op-mode" && path.first().is_some_and(|p| p == "show"))
    }
}

struct LogTask<'a> {
    plugin: &'a LocalLog,
    context: String,
    uid: u32,
    path: Vec<String>,
    tty: Option<String>,
    started: bool,
}

impl LogTask<'_> {
    fn record(&self, event: &'static str, error: Option<String>) -> PluginResult<()> {
        self.plugin.write(&Record {
            timestamp: Utc::now(),
            event,
            context: &self.context,
            uid: self.uid,
            path: &self.path,
            tty: self.tty.as_deref(),
            error,
        })
    }
}

impl AaaTask for LogTask<'_> {
    fn account_start(&mut self) -> PluginResult<()> {
        self.record("start", None)?;
        self.started = true;
        Ok(())
    }

    fn account_stop(&mut self, outcome: TaskOutcome<'_>) -> PluginResult<()> {
        if !self.started {
            return Err(PluginError::Custom("task was never started".to_string()));
        }
        match outcome {
            None => self.record("stop", None),
            Some(e) => self.record("failed", Some(e.to_string())),
        }
    }
}

export_aaa_plugin!(v2: LocalLog::from_env);
