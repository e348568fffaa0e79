//! ABI version 1 adapter.
//!
//! A version 1 plugin accounts a finished action in one call. Wrapped here,
//! its task records nothing on start and performs that single call on stop.

use aaa_plugin_sdk::{
    AaaPluginV1, AaaPluginV2, AaaTask, Env, PathAttrs, PluginResult, TaskOutcome,
};

pub struct LegacyPlugin {
    inner: Box<dyn AaaPluginV1>,
}

impl LegacyPlugin {
    pub fn new(inner: Box<dyn AaaPluginV1>) -> Self {
        Self { inner }
    }
}

impl AaaPluginV2 for LegacyPlugin {
    fn setup(&mut self) -> PluginResult<()> {
        self.inner.setup()
    }

    fn valid_user(&self, uid: u32, groups: &[String]) -> PluginResult<bool> {
        self.inner.valid_user(uid, groups)
    }

    fn new_task<'a>(
        &'a self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
        env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>> {
        Ok(Box::new(LegacyTask {
            plugin: self.inner.as_ref(),
            context: context.to_string(),
            uid,
            groups: groups.to_vec(),
            path: path.to_vec(),
            path_attrs: path_attrs.clone(),
            env: env.clone(),
            accounted: false,
        }))
    }

    fn authorize(
        &self,
        context: &str,
        uid: u32,
        groups: &[String],
        path: &[String],
        path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        self.inner.authorize(context, uid, groups, path, path_attrs)
    }
}

struct LegacyTask<'a> {
    plugin: &'a dyn AaaPluginV1,
    context: String,
    uid: u32,
    groups: Vec<String>,
    path: Vec<String>,
    path_attrs: PathAttrs,
    env: Env,
    accounted: bool,
}

impl AaaTask for LegacyTask<'_> {
    fn account_start(&mut self) -> PluginResult<()> {
        Ok(())
    }

    fn account_stop(&mut self, _outcome: TaskOutcome<'_>) -> PluginResult<()> {
        // Version 1 has no notion of outcome; account once.
        if self.accounted {
            return Ok(());
        }
        self.accounted = true;
        self.plugin.account(
            &self.context,
            self.uid,
            &self.groups,
            &self.path,
            &self.path_attrs,
            &self.env,
        )
    }
}
