use crate::engine::BuildEngine;
use crate::CoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgepack_schema::{fingerprint, ConfigHash, Mode, WatchOptions};
use serde::Serialize;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

/// Failure reported by the build driver during a run or watch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BuildError {
    pub message: String,
}

impl BuildError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported while releasing engine resources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CloseError {
    pub message: String,
}

impl CloseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Statistics for one completed build of one engine.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Stats {
    pub name: Option<String>,
    pub hash: ConfigHash,
    pub mode: Option<Mode>,
    pub assets: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
}

impl Stats {
    /// Stats for `engine`, for a build that started at `started` and finishes now.
    pub fn for_engine(engine: &BuildEngine, started: DateTime<Utc>) -> Self {
        let finished = Utc::now();
        let hash = fingerprint(engine.options())
            .map(|f| f.hash)
            .unwrap_or_else(|e| {
                warn!(engine = engine.display_name(), "failed to fingerprint options: {e}");
                ConfigHash::new("")
            });
        Self {
            name: engine.name().map(str::to_owned),
            hash,
            mode: engine.options().mode,
            assets: Vec::new(),
            warnings: Vec::new(),
            started_at: started.to_rfc3339(),
            finished_at: finished.to_rfc3339(),
            duration_ms: u64::try_from((finished - started).num_milliseconds()).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn with_assets(mut self, assets: Vec<String>) -> Self {
        self.assets = assets;
        self
    }
}

/// Per-engine statistics of a multi-configuration build, in input order.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct MultiStats {
    pub children: Vec<Stats>,
}

impl MultiStats {
    pub fn hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for child in &self.children {
            hasher.update(child.hash.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Successful result delivered to a completion callback.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RunOutput {
    Single(Stats),
    Multi(MultiStats),
}

impl RunOutput {
    pub fn stats(&self) -> Vec<&Stats> {
        match self {
            Self::Single(s) => vec![s],
            Self::Multi(m) => m.children.iter().collect(),
        }
    }
}

/// The build engine proper: module graph, code generation, file watching.
///
/// This layer only sequences calls into a driver; it never inspects how a
/// driver compiles. All suspension happens inside `run`, `close`, and `watch`.
#[async_trait(?Send)]
pub trait BuildDriver {
    fn name(&self) -> &str;

    /// Wire the normalized options into the engine. Runs once, between the
    /// `afterEnvironment` and `initialize` phases.
    fn process_options(&self, engine: &mut BuildEngine) -> Result<(), BuildError>;

    async fn run(&self, engine: &BuildEngine) -> Result<Stats, BuildError>;

    async fn close(&self, engine: &BuildEngine) -> Result<(), CloseError>;

    /// Rebuild continuously, reporting every completed cycle, until stopped
    /// from outside this layer.
    async fn watch(
        &self,
        engine: &BuildEngine,
        options: &WatchOptions,
        on_cycle: &mut dyn FnMut(Result<Stats, BuildError>),
    ) -> Result<(), BuildError>;
}

pub fn select_driver(name: &str) -> Result<Rc<dyn BuildDriver>, CoreError> {
    match name {
        "inspect" => Ok(Rc::new(crate::inspect::InspectDriver::new())),
        "mock" => Ok(Rc::new(crate::mock::MockDriver::new())),
        other => Err(CoreError::UnknownDriver(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_drivers() {
        assert_eq!(select_driver("inspect").unwrap().name(), "inspect");
        assert_eq!(select_driver("mock").unwrap().name(), "mock");
    }

    #[test]
    fn select_invalid_driver_fails() {
        assert!(matches!(
            select_driver("webpack"),
            Err(CoreError::UnknownDriver(_))
        ));
    }

    #[test]
    fn multi_stats_hash_depends_on_children() {
        let stats = |h: &str| Stats {
            name: None,
            hash: ConfigHash::new(h),
            mode: None,
            assets: Vec::new(),
            warnings: Vec::new(),
            started_at: String::new(),
            finished_at: String::new(),
            duration_ms: 0,
        };
        let a = MultiStats { children: vec![stats("a"), stats("b")] };
        let b = MultiStats { children: vec![stats("b"), stats("a")] };
        assert_ne!(a.hash(), b.hash());
    }

    #[cfg(unix)]
    #[test]
    fn unfingerprintable_options_fall_back_to_empty_hash() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let context = OsStr::from_bytes(b"/app/\xff");
        let engine = BuildEngine::new(
            forgepack_schema::NormalizedConfig::new(context),
            Rc::new(crate::mock::MockDriver::new()),
        );
        let stats = Stats::for_engine(&engine, Utc::now());
        assert_eq!(stats.hash.as_str(), "");
        assert_eq!(stats.name, None);
    }
}
