use crate::driver::{BuildDriver, MultiStats, RunOutput};
use crate::engine::{instantiate, BuildEngine};
use crate::multi::{instantiate_many, MultiEngine, SharedCallback};
use crate::plugin::PluginRegistry;
use crate::CoreError;
use forgepack_schema::{normalize_all, validate, ConfigError, NormalizedConfig, RawInput, WatchOptions};
use serde::Serialize;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// A non-fatal notice surfaced instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    pub code: &'static str,
    pub message: &'static str,
}

pub const WATCH_WITHOUT_CALLBACK: Deprecation = Deprecation {
    code: "FORGEPACK_WATCH_WITHOUT_CALLBACK",
    message: "watch was requested but no completion callback was given; \
              engines were created idle and nothing will be watched",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSelection {
    Single(WatchOptions),
    /// One entry per sibling, in input order.
    Multi(Vec<WatchOptions>),
}

/// Whether to watch, and with which options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionDecision {
    pub watch: bool,
    pub watch_options: WatchSelection,
}

impl ExecutionDecision {
    /// A single configuration watches when it asks to. A multi configuration
    /// watches as a whole when any sibling asks to.
    pub fn from_configs<'a>(
        configs: impl IntoIterator<Item = &'a NormalizedConfig>,
        multi: bool,
    ) -> Self {
        let configs: Vec<&NormalizedConfig> = configs.into_iter().collect();
        let options_of = |c: &NormalizedConfig| c.watch_options.clone().unwrap_or_default();
        if multi {
            Self {
                watch: configs.iter().any(|c| c.is_watch()),
                watch_options: WatchSelection::Multi(configs.iter().map(|c| options_of(c)).collect()),
            }
        } else {
            let first = configs.first();
            Self {
                watch: first.is_some_and(|c| c.is_watch()),
                watch_options: WatchSelection::Single(first.map(|c| options_of(c)).unwrap_or_default()),
            }
        }
    }

    fn per_engine(&self, count: usize) -> Vec<WatchOptions> {
        match &self.watch_options {
            WatchSelection::Single(o) => vec![o.clone(); count],
            WatchSelection::Multi(v) => v.clone(),
        }
    }
}

/// The engine or engines handed back to the caller.
#[derive(Debug, Clone)]
pub enum Forged {
    Single(Rc<BuildEngine>),
    Multi(Rc<MultiEngine>),
}

impl Forged {
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    pub fn single(&self) -> Option<&BuildEngine> {
        match self {
            Self::Single(e) => Some(e),
            Self::Multi(_) => None,
        }
    }

    pub fn multi(&self) -> Option<&MultiEngine> {
        match self {
            Self::Single(_) => None,
            Self::Multi(m) => Some(m),
        }
    }

    pub fn engines(&self) -> Vec<&BuildEngine> {
        match self {
            Self::Single(e) => vec![e.as_ref()],
            Self::Multi(m) => m.engines().iter().collect(),
        }
    }

    pub async fn run(&self) -> Result<RunOutput, CoreError> {
        match self {
            Self::Single(e) => e.run().await.map(RunOutput::Single),
            Self::Multi(m) => m.run().await.map(RunOutput::Multi),
        }
    }

    pub async fn close(&self) -> Result<(), CoreError> {
        match self {
            Self::Single(e) => e.close().await,
            Self::Multi(m) => m.close().await,
        }
    }

    pub async fn watch(
        &self,
        decision: &ExecutionDecision,
        callback: SharedCallback<RunOutput>,
    ) -> Result<(), CoreError> {
        match self {
            Self::Single(e) => {
                let options = decision.per_engine(1).into_iter().next().unwrap_or_default();
                e.watch(&options, &mut |cycle| {
                    (&mut *callback.borrow_mut())(cycle.map(RunOutput::Single));
                })
                .await
            }
            Self::Multi(m) => {
                let options = decision.per_engine(m.len());
                let forward: SharedCallback<MultiStats> =
                    Rc::new(RefCell::new(move |cycle: Result<MultiStats, CoreError>| {
                        (&mut *callback.borrow_mut())(cycle.map(RunOutput::Multi));
                    }));
                Rc::clone(m).watch(&options, forward).await
            }
        }
    }
}

/// Result of [`Forge::create`]: initialized, idle engines.
#[derive(Debug)]
pub struct Created {
    pub engines: Forged,
    pub decision: ExecutionDecision,
    pub deprecations: Vec<Deprecation>,
}

/// Entry point: validates, normalizes, instantiates, and drives engines.
pub struct Forge {
    driver: Rc<dyn BuildDriver>,
    registry: PluginRegistry,
    base_dir: PathBuf,
}

impl Forge {
    /// A forge with the builtin plugins, resolving relative contexts against
    /// the current directory.
    pub fn new(driver: Rc<dyn BuildDriver>) -> Self {
        Self {
            driver,
            registry: PluginRegistry::with_builtins(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    #[must_use]
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn instantiate(&self, config: NormalizedConfig) -> Result<BuildEngine, CoreError> {
        instantiate(config, Rc::clone(&self.driver), &self.registry)
    }

    pub fn instantiate_many(&self, configs: Vec<NormalizedConfig>) -> Result<MultiEngine, CoreError> {
        instantiate_many(configs, Rc::clone(&self.driver), &self.registry)
    }

    /// The execution decision reads the user's configuration as normalized,
    /// before plugins or the full default pass can change it.
    fn construct(&self, input: &RawInput) -> Result<(Forged, ExecutionDecision), CoreError> {
        validate(input).map_err(ConfigError::from)?;
        let mut configs = normalize_all(input, &self.base_dir)?;
        let decision = ExecutionDecision::from_configs(&configs, input.is_multi());
        if input.is_multi() {
            let multi = self.instantiate_many(configs)?;
            Ok((Forged::Multi(Rc::new(multi)), decision))
        } else {
            let config = configs
                .pop()
                .ok_or_else(|| CoreError::Config(ConfigError::InvalidValue {
                    path: "configuration".to_owned(),
                    reason: "no configuration given".to_owned(),
                }))?;
            let engine = self.instantiate(config)?;
            Ok((Forged::Single(Rc::new(engine)), decision))
        }
    }

    /// Build engines without starting any work. Errors are returned directly.
    pub fn create(&self, input: &RawInput) -> Result<Created, CoreError> {
        let (engines, decision) = self.construct(input)?;
        let mut deprecations = Vec::new();
        if decision.watch {
            warn!(code = WATCH_WITHOUT_CALLBACK.code, "{}", WATCH_WITHOUT_CALLBACK.message);
            deprecations.push(WATCH_WITHOUT_CALLBACK);
        }
        Ok(Created { engines, decision, deprecations })
    }

    /// Build engines and start them, reporting through `callback`.
    ///
    /// Must be called inside a `tokio::task::LocalSet`. The callback never runs
    /// before this returns. On a configuration failure it receives the error
    /// once and `None` is returned. In run-once mode it receives exactly one
    /// result, after the engines have been closed. In watch mode it receives
    /// one result per completed cycle.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`, since every outcome is
    /// delivered from a task spawned with `tokio::task::spawn_local`.
    pub fn run<F>(&self, input: &RawInput, callback: F) -> Option<Forged>
    where
        F: FnMut(Result<RunOutput, CoreError>) + 'static,
    {
        let callback: SharedCallback<RunOutput> = Rc::new(RefCell::new(callback));
        let (forged, decision) = match self.construct(input) {
            Ok(built) => built,
            Err(e) => {
                debug!("construction failed, deferring error to callback: {e}");
                tokio::task::spawn_local(async move {
                    (&mut *callback.borrow_mut())(Err(e));
                });
                return None;
            }
        };

        let task = forged.clone();
        if decision.watch {
            info!(engines = forged.engines().len(), "starting watch");
            tokio::task::spawn_local(async move {
                let watched = task.watch(&decision, Rc::clone(&callback)).await;
                let closed = task.close().await;
                if let Err(e) = merge(watched, closed) {
                    (&mut *callback.borrow_mut())(Err(e));
                }
            });
        } else {
            tokio::task::spawn_local(async move {
                let built = task.run().await;
                let closed = task.close().await;
                let result = merge(built, closed);
                (&mut *callback.borrow_mut())(result);
            });
        }
        Some(forged)
    }
}

/// A build failure takes precedence over a close failure.
fn merge<T>(built: Result<T, CoreError>, closed: Result<(), CoreError>) -> Result<T, CoreError> {
    match (built, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close)) => Err(close),
        (Err(build), Ok(())) => Err(build),
        (Err(build), Err(close)) => {
            debug!("close error superseded by build error: {close}");
            Err(build)
        }
    }
}
