//! Default passes.
//!
//! The baseline pass runs during normalization and only touches options that
//! must be settled before any plugin can be applied. The full pass runs after
//! plugins and never overwrites a value that is already set.

use crate::normalize::NormalizedConfig;
use crate::types::{Devtool, LogLevel, Mode};
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_ENTRY: &str = "./src";
pub const DEFAULT_OUTPUT_DIR: &str = "dist";
pub const DEFAULT_FILENAME: &str = "[name].js";
pub const DEVELOPMENT_DEVTOOL: &str = "eval";

/// Resolve the build context to an absolute, lexically clean path.
pub fn resolve_context(context: Option<&str>, base_dir: &Path) -> PathBuf {
    let joined = match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) if Path::new(c).is_absolute() => PathBuf::from(c),
        Some(c) => base_dir.join(c),
        None => base_dir.to_path_buf(),
    };
    clean_path(&joined)
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem. `..` at the root stays at the root.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn apply_base_defaults(config: &mut NormalizedConfig) {
    let logging = &mut config.infrastructure_logging;
    logging.level.get_or_insert(LogLevel::Info);
    logging.colors.get_or_insert(false);
    logging.append_only.get_or_insert(false);
}

impl NormalizedConfig {
    /// Full default pass. Fills every option still unset after plugins ran.
    pub fn apply_defaults(&mut self) {
        let mode = *self.mode.get_or_insert(Mode::Production);
        let development = mode == Mode::Development;

        if !self.entry.as_ref().is_some_and(|e| !e.is_empty()) {
            self.entry = Some(vec![DEFAULT_ENTRY.to_owned()]);
        }

        let output_path = match self.output.path.take() {
            Some(p) if p.is_absolute() => p,
            Some(p) => clean_path(&self.context.join(p)),
            None => self.context.join(DEFAULT_OUTPUT_DIR),
        };
        self.output.path = Some(output_path);
        self.output
            .filename
            .get_or_insert_with(|| DEFAULT_FILENAME.to_owned());

        self.devtool.get_or_insert_with(|| {
            if development {
                Devtool::Source(DEVELOPMENT_DEVTOOL.to_owned())
            } else {
                Devtool::Off
            }
        });
        self.cache.get_or_insert(development);
        self.bail.get_or_insert(false);
        self.watch.get_or_insert(false);
    }
}
