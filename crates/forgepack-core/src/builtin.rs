//! Plugins available by name in every configuration file.

use crate::engine::BuildEngine;
use crate::lifecycle::Phase;
use crate::plugin::{ApplyPlugin, Plugin, PluginRegistry};
use crate::CoreError;
use forgepack_schema::{LogLevel, Mode};
use serde_json::{Map, Value};

pub fn register_all(registry: &mut PluginRegistry) {
    registry.register("banner", |options| Ok(Plugin::object(BannerPlugin::from_options(options)?)));
    registry.register_fn("define", apply_define);
    registry.register_fn("mode-preset", apply_mode_preset);
}

/// Records a banner to prepend to emitted chunks. Options: a string, or `{ "banner": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerPlugin {
    banner: String,
}

impl BannerPlugin {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }

    fn from_options(options: &Value) -> Result<Self, CoreError> {
        let banner = match options {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("banner") {
                Some(Value::String(s)) => s.clone(),
                _ => return Err(failed("banner", "options.banner must be a string")),
            },
            _ => return Err(failed("banner", "expected a string or { banner }")),
        };
        Ok(Self::new(banner))
    }
}

impl ApplyPlugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn apply(&self, engine: &mut BuildEngine) -> Result<(), CoreError> {
        engine
            .state_mut()
            .insert("banner".to_owned(), Value::String(self.banner.clone()));
        engine.hooks_mut().tap(Phase::Initialize, "banner", |e| {
            e.log("forgepack.banner", LogLevel::Log, "banner registered");
            Ok(())
        })
    }
}

/// Merges compile-time constants into the engine's `define` table.
fn apply_define(engine: &mut BuildEngine, options: &Value) -> Result<(), CoreError> {
    let Value::Object(entries) = options else {
        return Err(failed("define", "options must be an object of constants"));
    };
    let table = engine
        .state_mut()
        .entry("define".to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(existing) = table {
        for (k, v) in entries {
            existing.insert(k.clone(), v.clone());
        }
    }
    Ok(())
}

/// Chooses a mode when the user left it unset. Options: `{ "mode": "development" }`.
fn apply_mode_preset(engine: &mut BuildEngine, options: &Value) -> Result<(), CoreError> {
    let mode: Mode = match options.get("mode") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| failed("mode-preset", &format!("invalid mode: {e}")))?,
        None => Mode::Development,
    };
    if engine.options().mode.is_none() {
        engine.options_mut().mode = Some(mode);
    }
    Ok(())
}

fn failed(name: &str, reason: &str) -> CoreError {
    CoreError::PluginFailed {
        name: name.to_owned(),
        reason: reason.to_owned(),
    }
}
