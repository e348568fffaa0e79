//! In-process plugin modules for loader tests.
//!
//! A [`FixtureModule`] is a symbol table pointing at statics in this test
//! binary, so ABI negotiation and setup isolation run without building any
//! shared object.

#![allow(dead_code)]

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aaa_core::error::ModuleOpenError;
use aaa_core::protocol::{ModuleOpener, PluginModule};
use aaa_core::{AaaLoader, LoaderConfig};
use aaa_plugin_sdk::abi::{into_raw_v1, into_raw_v2, ENTRY_MAGIC};
use aaa_plugin_sdk::{
    AaaPluginV1, AaaPluginV2, AaaTask, AbiVersionSymbol, Env, PathAttrs, PluginEntry,
    PluginError, PluginResult, TaskOutcome, ABI_VERSION_SYMBOL,
};
use parking_lot::Mutex;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Exported symbol stand-ins
// ---------------------------------------------------------------------------

pub static VERSION_1: AbiVersionSymbol = AbiVersionSymbol::new(1);
pub static VERSION_2: AbiVersionSymbol = AbiVersionSymbol::new(2);
pub static VERSION_3: AbiVersionSymbol = AbiVersionSymbol::new(3);

/// A bare integer where a version symbol should be: same value, no tag.
pub static UNTAGGED_VERSION: [u32; 4] = [2, 0, 0, 0];

/// A version exported as a plain `u32`, shorter than any tagged symbol.
pub static BARE_VERSION: u32 = 2;

pub static ENTRY_GOOD: PluginEntry = PluginEntry::new(2, create_good);
pub static ENTRY_FAILING_SETUP: PluginEntry = PluginEntry::new(2, create_failing_setup);
pub static ENTRY_PANICKING_SETUP: PluginEntry = PluginEntry::new(2, create_panicking_setup);
pub static ENTRY_PANICKING_DROP: PluginEntry = PluginEntry::new(2, create_panicking_drop);
pub static ENTRY_FAILING_SETUP_PANICKING_DROP: PluginEntry =
    PluginEntry::new(2, create_failing_setup_panicking_drop);
pub static ENTRY_RECORDED_PANIC: PluginEntry = PluginEntry::new(2, create_recorded_panic);
pub static ENTRY_RECORDED_FAILURE: PluginEntry = PluginEntry::new(2, create_recorded_failure);
pub static ENTRY_COUNTED: PluginEntry = PluginEntry::new(2, create_counted);
pub static ENTRY_NULL_CREATE: PluginEntry = PluginEntry::new(2, create_null);
pub static ENTRY_NO_CONSTRUCTOR: PluginEntry = PluginEntry {
    magic: ENTRY_MAGIC,
    abi_version: 2,
    create: None,
};
/// Exported as `aaa_plugin_v2` but declaring version 1.
pub static ENTRY_WRONG_VERSION: PluginEntry = PluginEntry::new(1, create_good);
pub static ENTRY_LEGACY: PluginEntry = PluginEntry::new(1, create_legacy);

/// Setups performed by plugins built from [`ENTRY_COUNTED`].
pub static COUNTED_SETUPS: AtomicUsize = AtomicUsize::new(0);

/// Accounting calls made by plugins built from [`ENTRY_LEGACY`].
pub static LEGACY_ACCOUNTED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn create_good() -> *mut c_void {
    into_raw_v2(Box::new(FixturePlugin::new(SetupBehavior::Succeed)))
}

unsafe extern "C" fn create_failing_setup() -> *mut c_void {
    into_raw_v2(Box::new(FixturePlugin::new(SetupBehavior::Fail)))
}

unsafe extern "C" fn create_panicking_setup() -> *mut c_void {
    into_raw_v2(Box::new(FixturePlugin::new(SetupBehavior::Panic)))
}

unsafe extern "C" fn create_panicking_drop() -> *mut c_void {
    into_raw_v2(Box::new(PanicOnDrop { fail_setup: false }))
}

unsafe extern "C" fn create_failing_setup_panicking_drop() -> *mut c_void {
    into_raw_v2(Box::new(PanicOnDrop { fail_setup: true }))
}

unsafe extern "C" fn create_recorded_panic() -> *mut c_void {
    into_raw_v2(Box::new(TeardownRecorder { fail_setup: false }))
}

unsafe extern "C" fn create_recorded_failure() -> *mut c_void {
    into_raw_v2(Box::new(TeardownRecorder { fail_setup: true }))
}

unsafe extern "C" fn create_counted() -> *mut c_void {
    into_raw_v2(Box::new(FixturePlugin::new(SetupBehavior::Count)))
}

unsafe extern "C" fn create_null() -> *mut c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn create_legacy() -> *mut c_void {
    into_raw_v1(Box::new(LegacyFixture))
}

// ---------------------------------------------------------------------------
// Plugin implementations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum SetupBehavior {
    Succeed,
    Fail,
    Panic,
    Count,
}

pub struct FixturePlugin {
    behavior: SetupBehavior,
    ready: bool,
}

impl FixturePlugin {
    pub fn new(behavior: SetupBehavior) -> Self {
        Self {
            behavior,
            ready: false,
        }
    }
}

impl AaaPluginV2 for FixturePlugin {
    fn setup(&mut self) -> PluginResult<()> {
        match self.behavior {
            SetupBehavior::Succeed => {}
            SetupBehavior::Fail => {
                return Err(PluginError::Setup("no servers configured".to_string()))
            }
            SetupBehavior::Panic => panic!("fixture plugin exploded during setup"),
            SetupBehavior::Count => {
                COUNTED_SETUPS.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.ready = true;
        Ok(())
    }

    fn valid_user(&self, uid: u32, _groups: &[String]) -> PluginResult<bool> {
        if !self.ready {
            return Err(PluginError::Custom("setup not run".to_string()));
        }
        Ok(uid != 0)
    }

    fn new_task<'a>(
        &'a self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        path: &[String],
        _path_attrs: &PathAttrs,
        _env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>> {
        Ok(Box::new(FixtureTask {
            path: path.to_vec(),
            events: Vec::new(),
        }))
    }

    fn authorize(
        &self,
        _context: &str,
        _uid: u32,
        groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        Ok(groups.iter().any(|g| g == "secadmin"))
    }
}

pub struct FixtureTask {
    path: Vec<String>,
    events: Vec<&'static str>,
}

impl AaaTask for FixtureTask {
    fn account_start(&mut self) -> PluginResult<()> {
        self.events.push("start");
        Ok(())
    }

    fn account_stop(&mut self, outcome: TaskOutcome<'_>) -> PluginResult<()> {
        if self.events.last() != Some(&"start") {
            return Err(PluginError::Custom(format!(
                "stop without start for {:?}",
                self.path
            )));
        }
        self.events.push(if outcome.is_some() { "failed" } else { "stop" });
        Ok(())
    }
}

/// Setup panics (or fails, with `fail_setup`), and so does the destructor.
pub struct PanicOnDrop {
    fail_setup: bool,
}

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            panic!("fixture plugin exploded during drop");
        }
    }
}

impl AaaPluginV2 for PanicOnDrop {
    fn setup(&mut self) -> PluginResult<()> {
        if self.fail_setup {
            return Err(PluginError::Setup("unusable".to_string()));
        }
        panic!("fixture plugin exploded during setup");
    }

    fn valid_user(&self, _uid: u32, _groups: &[String]) -> PluginResult<bool> {
        Ok(true)
    }

    fn new_task<'a>(
        &'a self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
        _env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>> {
        Err(PluginError::Custom("unused".to_string()))
    }

    fn authorize(
        &self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        Ok(false)
    }
}

/// Teardown order of [`TeardownRecorder`] plugins and [`RecordingModule`]s.
pub static TEARDOWN_LOG: Mutex<Vec<&'static str>> = parking_lot::const_mutex(Vec::new());

/// Panic payload that records when it is released.
pub struct RecordedPayload;

impl Drop for RecordedPayload {
    fn drop(&mut self) {
        TEARDOWN_LOG.lock().push("payload");
    }
}

/// Setup panics or fails; the destructor panics with a [`RecordedPayload`].
pub struct TeardownRecorder {
    fail_setup: bool,
}

impl Drop for TeardownRecorder {
    fn drop(&mut self) {
        TEARDOWN_LOG.lock().push("plugin");
        if !std::thread::panicking() {
            std::panic::panic_any(RecordedPayload);
        }
    }
}

impl AaaPluginV2 for TeardownRecorder {
    fn setup(&mut self) -> PluginResult<()> {
        if self.fail_setup {
            return Err(PluginError::Setup("unusable".to_string()));
        }
        panic!("fixture plugin exploded during setup");
    }

    fn valid_user(&self, _uid: u32, _groups: &[String]) -> PluginResult<bool> {
        Ok(true)
    }

    fn new_task<'a>(
        &'a self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
        _env: &Env,
    ) -> PluginResult<Box<dyn AaaTask + 'a>> {
        Err(PluginError::Custom("unused".to_string()))
    }

    fn authorize(
        &self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        Ok(false)
    }
}

pub struct LegacyFixture;

impl AaaPluginV1 for LegacyFixture {
    fn setup(&mut self) -> PluginResult<()> {
        Ok(())
    }

    fn valid_user(&self, _uid: u32, _groups: &[String]) -> PluginResult<bool> {
        Ok(true)
    }

    fn account(
        &self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
        _env: &Env,
    ) -> PluginResult<()> {
        LEGACY_ACCOUNTED.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn authorize(
        &self,
        _context: &str,
        _uid: u32,
        _groups: &[String],
        _path: &[String],
        _path_attrs: &PathAttrs,
    ) -> PluginResult<bool> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Module table and opener
// ---------------------------------------------------------------------------

pub struct FixtureModule {
    path: PathBuf,
    symbols: HashMap<String, usize>,
}

impl FixtureModule {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            symbols: HashMap::new(),
        }
    }

    pub fn with_symbol<T>(mut self, name: &str, value: &'static T) -> Self {
        self.symbols
            .insert(name.to_string(), value as *const T as usize);
        self
    }

    pub fn with_version(self, version: &'static AbiVersionSymbol) -> Self {
        self.with_symbol(ABI_VERSION_SYMBOL, version)
    }

    /// A well-formed version 2 module whose plugin is built by `entry`.
    pub fn v2(path: impl Into<PathBuf>, entry: &'static PluginEntry) -> Self {
        Self::new(path)
            .with_version(&VERSION_2)
            .with_symbol("aaa_plugin_v2", entry)
    }
}

impl PluginModule for FixtureModule {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.symbols
            .get(name)
            .and_then(|addr| NonNull::new(*addr as *mut c_void))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// A module that records when it is released, like a library being unmapped.
pub struct RecordingModule(pub FixtureModule);

impl Drop for RecordingModule {
    fn drop(&mut self) {
        TEARDOWN_LOG.lock().push("module");
    }
}

impl PluginModule for RecordingModule {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.0.symbol(name)
    }

    fn path(&self) -> &Path {
        self.0.path()
    }
}

/// Serves registered fixture modules by path.
#[derive(Default)]
pub struct FixtureOpener {
    modules: Mutex<HashMap<PathBuf, Arc<FixtureModule>>>,
    opened: AtomicUsize,
}

impl FixtureOpener {
    pub fn install(&self, module: FixtureModule) {
        self.modules
            .lock()
            .insert(module.path.clone(), Arc::new(module));
    }

    pub fn remove(&self, path: &Path) {
        self.modules.lock().remove(path);
    }

    /// Number of successful opens so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ModuleOpener for FixtureOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn PluginModule>, ModuleOpenError> {
        let module = self
            .modules
            .lock()
            .get(path)
            .cloned()
            .ok_or(ModuleOpenError::NotFound)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(module)
    }
}

// ---------------------------------------------------------------------------
// Directory fixture
// ---------------------------------------------------------------------------

/// A temporary config directory wired to a [`FixtureOpener`].
pub struct Fixture {
    pub dir: TempDir,
    pub config: LoaderConfig,
    pub opener: Arc<FixtureOpener>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig::new(dir.path().join("conf"), dir.path().join("lib"));
        std::fs::create_dir_all(&config.config_dir).unwrap();
        Self {
            dir,
            config,
            opener: Arc::new(FixtureOpener::default()),
        }
    }

    /// Write a descriptor to `<config_dir>/<file>`.
    pub fn descriptor(&self, file: &str, name: &str, accounting: bool, authorization: bool) -> PathBuf {
        let content = serde_json::json!({
            "command-accounting": accounting,
            "command-authorization": authorization,
            "name": name,
        });
        self.raw_descriptor(file, &content.to_string())
    }

    pub fn raw_descriptor(&self, file: &str, content: &str) -> PathBuf {
        let path = self.config.config_dir.join(file);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Where the loader will look for the module of `name`.
    pub fn module_path(&self, name: &str) -> PathBuf {
        self.config.module_path(name)
    }

    pub fn install(&self, module: FixtureModule) {
        self.opener.install(module);
    }

    /// Install a well-formed version 2 module for `name`.
    pub fn install_v2(&self, name: &str, entry: &'static PluginEntry) {
        self.install(FixtureModule::v2(self.module_path(name), entry));
    }

    pub fn loader(&self) -> AaaLoader {
        self.loader_with(self.config.clone())
    }

    pub fn loader_with(&self, config: LoaderConfig) -> AaaLoader {
        AaaLoader::with_opener(config, self.opener.clone()).unwrap()
    }
}
