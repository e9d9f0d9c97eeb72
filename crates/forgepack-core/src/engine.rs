use crate::driver::{BuildDriver, Stats};
use crate::environment::{EnvironmentSetup, InfrastructureLogger};
use crate::lifecycle::{LifecycleHooks, Phase};
use crate::plugin::{Plugin, PluginRegistry};
use crate::CoreError;
use forgepack_schema::{LogLevel, NormalizedConfig, WatchOptions};
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Engine-local state owned by plugins, keyed by plugin-chosen names.
pub type PluginState = BTreeMap<String, Value>;

/// One constructed build engine for one configuration.
///
/// Created by [`instantiate`]; once that returns, every lifecycle phase has
/// fired and the engine is idle, ready to run or watch.
pub struct BuildEngine {
    context: PathBuf,
    options: NormalizedConfig,
    hooks: LifecycleHooks,
    state: PluginState,
    applied: Vec<String>,
    logger: Option<InfrastructureLogger>,
    driver: Rc<dyn BuildDriver>,
    running: Cell<bool>,
    closed: Cell<bool>,
}

impl std::fmt::Debug for BuildEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEngine")
            .field("name", &self.options.name)
            .field("context", &self.context)
            .field("driver", &self.driver.name())
            .field("hooks", &self.hooks)
            .field("applied", &self.applied)
            .field("closed", &self.closed.get())
            .finish_non_exhaustive()
    }
}

/// Clears the running flag however a run ends.
struct RunGuard<'a>(&'a Cell<bool>);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl BuildEngine {
    /// Bind a bare engine to the configuration's context. No setup runs here.
    pub fn new(options: NormalizedConfig, driver: Rc<dyn BuildDriver>) -> Self {
        let mut engine = Self {
            context: options.context.clone(),
            options: NormalizedConfig::new(options.context.clone()),
            hooks: LifecycleHooks::default(),
            state: PluginState::new(),
            applied: Vec::new(),
            logger: None,
            driver,
            running: Cell::new(false),
            closed: Cell::new(false),
        };
        engine.attach(options);
        engine
    }

    fn attach(&mut self, options: NormalizedConfig) {
        self.options = options;
    }

    pub fn name(&self) -> Option<&str> {
        self.options.name.as_deref()
    }

    /// Name for log lines and error messages.
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("<unnamed>")
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    pub fn options(&self) -> &NormalizedConfig {
        &self.options
    }

    /// Plugins may override options before the full default pass runs.
    pub fn options_mut(&mut self) -> &mut NormalizedConfig {
        &mut self.options
    }

    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut LifecycleHooks {
        &mut self.hooks
    }

    pub fn state(&self) -> &PluginState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PluginState {
        &mut self.state
    }

    /// Names of applied plugins, in application order, sub-plugins included.
    pub fn applied_plugins(&self) -> &[String] {
        &self.applied
    }

    pub fn fired_phases(&self) -> &[Phase] {
        self.hooks.fired()
    }

    pub fn is_initialized(&self) -> bool {
        self.hooks.has_fired(Phase::Initialize)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub fn infrastructure_logger(&self) -> Option<&InfrastructureLogger> {
        self.logger.as_ref()
    }

    pub fn set_infrastructure_logger(&mut self, logger: InfrastructureLogger) {
        self.logger = Some(logger);
    }

    /// Log through the infrastructure logger, if environment setup installed one.
    pub fn log(&self, logger: &str, level: LogLevel, message: &str) {
        if let Some(l) = &self.logger {
            l.log(logger, level, message);
        }
    }

    pub fn driver(&self) -> &dyn BuildDriver {
        self.driver.as_ref()
    }

    /// Apply a plugin to this engine. Plugins may call this to apply sub-plugins.
    pub fn apply_plugin(&mut self, plugin: &Plugin) -> Result<(), CoreError> {
        debug!(engine = self.display_name(), plugin = plugin.name(), "applying plugin");
        self.applied.push(plugin.name().to_owned());
        plugin.apply(self)
    }

    fn fire(&mut self, phase: Phase) -> Result<(), CoreError> {
        let taps = self.hooks.begin(phase)?;
        debug!(
            engine = self.display_name(),
            %phase,
            taps = taps.len(),
            "firing lifecycle phase"
        );
        if phase == Phase::ProcessOptions {
            let driver = Rc::clone(&self.driver);
            driver.process_options(self)?;
        }
        for (name, hook) in taps {
            debug!(engine = self.display_name(), %phase, hook = %name, "running hook");
            hook(self)?;
        }
        Ok(())
    }

    fn begin_run(&self) -> Result<RunGuard<'_>, CoreError> {
        if self.closed.get() {
            return Err(CoreError::Closed(self.display_name().to_owned()));
        }
        if self.running.replace(true) {
            return Err(CoreError::ConcurrentRun(self.display_name().to_owned()));
        }
        Ok(RunGuard(&self.running))
    }

    /// Perform one build.
    pub async fn run(&self) -> Result<Stats, CoreError> {
        let _guard = self.begin_run()?;
        info!(engine = self.display_name(), driver = self.driver.name(), "build started");
        let stats = self.driver.run(self).await?;
        info!(
            engine = self.display_name(),
            duration_ms = stats.duration_ms,
            "build finished"
        );
        Ok(stats)
    }

    /// Release driver resources. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), CoreError> {
        if self.closed.replace(true) {
            return Ok(());
        }
        debug!(engine = self.display_name(), "closing engine");
        self.driver.close(self).await.map_err(|e| {
            warn!(engine = self.display_name(), "close failed: {e}");
            CoreError::from(e)
        })
    }

    /// Rebuild continuously, reporting each completed cycle to `on_cycle`.
    pub async fn watch(
        &self,
        options: &WatchOptions,
        on_cycle: &mut dyn FnMut(Result<Stats, CoreError>),
    ) -> Result<(), CoreError> {
        let _guard = self.begin_run()?;
        info!(engine = self.display_name(), driver = self.driver.name(), "watch started");
        self.driver
            .watch(self, options, &mut |cycle| on_cycle(cycle.map_err(CoreError::from)))
            .await?;
        debug!(engine = self.display_name(), "watch stopped");
        Ok(())
    }
}

/// Build one engine from a normalized configuration.
///
/// The order is fixed: bind to `context`, attach the configuration, environment
/// setup, user plugins in declared order, the full default pass, then the
/// `environment`, `afterEnvironment`, `processOptions`, and `initialize` phases.
pub fn instantiate(
    config: NormalizedConfig,
    driver: Rc<dyn BuildDriver>,
    registry: &PluginRegistry,
) -> Result<BuildEngine, CoreError> {
    let plugins = config.plugins.clone();
    let mut engine = BuildEngine::new(config, driver);
    info!(
        engine = engine.display_name(),
        context = %engine.context().display(),
        "instantiating build engine"
    );

    engine.apply_plugin(&Plugin::object(EnvironmentSetup))?;
    for entry in &plugins {
        let plugin = registry.resolve(entry)?;
        engine.apply_plugin(&plugin)?;
    }

    engine.options.apply_defaults();

    for phase in Phase::ORDER {
        engine.fire(phase)?;
    }
    Ok(engine)
}
