//! Build-engine bootstrap and multi-instance orchestration for forgepack.
//!
//! This crate turns normalized configurations into initialized `BuildEngine`
//! instances: environment setup, user plugins, the full default pass, and the
//! fixed one-shot lifecycle phases. It links sibling configurations into a
//! `MultiEngine` with a validated dependency graph, and `Forge` selects and
//! drives run-once or watch execution with guaranteed close on every path.
//! The bundling work itself sits behind the `BuildDriver` trait.

pub mod builtin;
pub mod concurrency;
pub mod driver;
pub mod engine;
pub mod environment;
pub mod forge;
pub mod inspect;
pub mod lifecycle;
pub mod mock;
pub mod multi;
pub mod plugin;

pub use concurrency::{install_signal_handler, request_shutdown, shutdown_requested};
pub use driver::{select_driver, BuildDriver, BuildError, CloseError, MultiStats, RunOutput, Stats};
pub use engine::{instantiate, BuildEngine, PluginState};
pub use environment::{EnvironmentSetup, InfrastructureLogger};
pub use forge::{
    Created, Deprecation, ExecutionDecision, Forge, Forged, WatchSelection,
    WATCH_WITHOUT_CALLBACK,
};
pub use lifecycle::{validate_transition, LifecycleHooks, LifecycleState, Phase};
pub use multi::{instantiate_many, DependencyGraph, MultiEngine, SharedCallback};
pub use plugin::{ApplyPlugin, Plugin, PluginRegistry};

use forgepack_schema::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("configuration error: unknown plugin '{0}'")]
    UnknownPlugin(String),
    #[error("configuration error: plugin '{name}' failed to apply: {reason}")]
    PluginFailed { name: String, reason: String },
    #[error("configuration error: unknown build driver '{0}'")]
    UnknownDriver(String),
    #[error("configuration error: '{0}' depends on itself")]
    SelfDependency(String),
    #[error("configuration error: '{from}' depends on unknown configuration '{name}'")]
    UnknownDependency { from: String, name: String },
    #[error("configuration error: dependency target '{0}' names more than one configuration")]
    DuplicateName(String),
    #[error("configuration error: dependency cycle between configurations: {0}")]
    DependencyCycle(String),
    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidPhase { from: String, to: String },
    #[error("configuration error: hook '{hook}' tapped on phase '{phase}' after it fired")]
    PhaseAlreadyFired { phase: String, hook: String },
    #[error("build error: {0}")]
    Build(#[from] BuildError),
    #[error("close error: {0}")]
    Close(#[from] CloseError),
    #[error("build error: engine '{0}' is already running")]
    ConcurrentRun(String),
    #[error("build error: engine '{0}' has been closed")]
    Closed(String),
}

/// Failure classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed raw configuration, caught before any engine exists.
    Validation,
    /// Well-typed but semantically invalid configuration.
    Configuration,
    Build,
    Close,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) if e.is_validation() => ErrorKind::Validation,
            Self::Config(_)
            | Self::UnknownPlugin(_)
            | Self::PluginFailed { .. }
            | Self::UnknownDriver(_)
            | Self::SelfDependency(_)
            | Self::UnknownDependency { .. }
            | Self::DuplicateName(_)
            | Self::DependencyCycle(_)
            | Self::InvalidPhase { .. }
            | Self::PhaseAlreadyFired { .. } => ErrorKind::Configuration,
            Self::Build(_) | Self::ConcurrentRun(_) | Self::Closed(_) => ErrorKind::Build,
            Self::Close(_) => ErrorKind::Close,
        }
    }
}
