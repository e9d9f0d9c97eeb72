use crate::config::{ConfigError, RawConfig, RawInput};
use crate::defaults::{apply_base_defaults, resolve_context};
use crate::schema::{lookup, Field, Kind, ROOT_FIELDS};
use crate::types::{Devtool, LogLevel, Mode, Poll};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Canonical form of one raw configuration.
///
/// Every recognized option sits under its canonical name. Baseline defaults
/// (`context`, infrastructure logging) are applied during normalization; all
/// other unset options stay `None` until [`NormalizedConfig::apply_defaults`]
/// runs after plugins, so plugins observe what the user actually wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedConfig {
    pub name: Option<String>,
    pub mode: Option<Mode>,
    pub context: PathBuf,
    pub entry: Option<Vec<String>>,
    pub output: OutputOptions,
    pub devtool: Option<Devtool>,
    pub cache: Option<bool>,
    pub bail: Option<bool>,
    pub watch: Option<bool>,
    pub watch_options: Option<WatchOptions>,
    pub plugins: Vec<PluginEntry>,
    /// Names of sibling configurations this one depends on; deduplicated, in declared order.
    pub dependencies: Vec<String>,
    pub infrastructure_logging: InfrastructureLogging,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputOptions {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
}

/// Per-engine watch tuning. The default value is the empty options set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    pub aggregate_timeout: Option<u64>,
    pub poll: Option<Poll>,
    pub ignored: Vec<String>,
    pub stdin: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureLogging {
    pub level: Option<LogLevel>,
    /// Logger name patterns forced to verbose output. `*` matches every logger.
    pub debug: Vec<String>,
    pub colors: Option<bool>,
    pub append_only: Option<bool>,
}

/// A plugin reference: registry name plus free-form options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    #[serde(default)]
    pub options: Value,
}

impl PluginEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Value::Null,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

impl NormalizedConfig {
    /// A configuration with only baseline defaults, rooted at `context`.
    pub fn new(context: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            name: None,
            mode: None,
            context: context.into(),
            entry: None,
            output: OutputOptions::default(),
            devtool: None,
            cache: None,
            bail: None,
            watch: None,
            watch_options: None,
            plugins: Vec::new(),
            dependencies: Vec::new(),
            infrastructure_logging: InfrastructureLogging::default(),
        };
        apply_base_defaults(&mut config);
        config
    }

    pub fn is_watch(&self) -> bool {
        self.watch.unwrap_or(false)
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawOptions {
    name: Option<String>,
    mode: Option<Mode>,
    context: Option<String>,
    entry: Option<OneOrMany>,
    #[serde(default)]
    output: OutputOptions,
    devtool: Option<RawDevtool>,
    cache: Option<bool>,
    bail: Option<bool>,
    watch: Option<bool>,
    watch_options: Option<RawWatchOptions>,
    #[serde(default)]
    plugins: Vec<Value>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    infrastructure_logging: RawInfrastructureLogging,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawWatchOptions {
    aggregate_timeout: Option<u64>,
    poll: Option<Poll>,
    ignored: Option<OneOrMany>,
    stdin: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawInfrastructureLogging {
    level: Option<LogLevel>,
    debug: Option<DebugFilter>,
    colors: Option<bool>,
    append_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DebugFilter {
    Flag(bool),
    Patterns(OneOrMany),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDevtool {
    Flag(bool),
    Name(String),
}

/// Normalize one raw configuration. Relative `context` values resolve against `base_dir`.
pub fn normalize(raw: &RawConfig, base_dir: &Path) -> Result<NormalizedConfig, ConfigError> {
    let canonical = canonicalize(raw.as_value(), ROOT_FIELDS, "configuration")?;
    let options: RawOptions = serde_json::from_value(canonical)?;

    let devtool = match options.devtool {
        None => None,
        Some(RawDevtool::Flag(false)) => Some(Devtool::Off),
        Some(RawDevtool::Name(name)) => Some(Devtool::Source(name)),
        Some(RawDevtool::Flag(true)) => {
            return Err(ConfigError::InvalidValue {
                path: "configuration.devtool".to_owned(),
                reason: "expected a string or false".to_owned(),
            })
        }
    };

    let plugins = options
        .plugins
        .into_iter()
        .enumerate()
        .map(|(index, value)| plugin_entry(index, value))
        .collect::<Result<Vec<_>, _>>()?;

    let watch_options = options.watch_options.map(|w| WatchOptions {
        aggregate_timeout: w.aggregate_timeout,
        poll: w.poll,
        ignored: w.ignored.map(OneOrMany::into_vec).unwrap_or_default(),
        stdin: w.stdin,
    });

    let logging = options.infrastructure_logging;
    let debug = match logging.debug {
        None | Some(DebugFilter::Flag(false)) => Vec::new(),
        Some(DebugFilter::Flag(true)) => vec!["*".to_owned()],
        Some(DebugFilter::Patterns(p)) => p.into_vec(),
    };

    let mut config = NormalizedConfig {
        name: options.name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty()),
        mode: options.mode,
        context: resolve_context(options.context.as_deref(), base_dir),
        entry: options.entry.map(OneOrMany::into_vec),
        output: options.output,
        devtool,
        cache: options.cache,
        bail: options.bail,
        watch: options.watch,
        watch_options,
        plugins,
        dependencies: dedup_in_order(options.dependencies),
        infrastructure_logging: InfrastructureLogging {
            level: logging.level,
            debug,
            colors: logging.colors,
            append_only: logging.append_only,
        },
    };
    apply_base_defaults(&mut config);
    Ok(config)
}

/// Normalize every configuration of `input`, in order.
pub fn normalize_all(input: &RawInput, base_dir: &Path) -> Result<Vec<NormalizedConfig>, ConfigError> {
    input
        .configs()
        .iter()
        .map(|raw| normalize(raw, base_dir))
        .collect()
}

/// Rename alias keys to their canonical option name, recursing into nested
/// option objects. Unknown keys are kept so deserialization can reject them.
fn canonicalize(value: &Value, fields: &[Field], path: &str) -> Result<Value, ConfigError> {
    let Some(map) = value.as_object() else {
        return Ok(value.clone());
    };
    let mut out = Map::with_capacity(map.len());
    for (key, v) in map {
        let Some(field) = lookup(fields, key) else {
            out.insert(key.clone(), v.clone());
            continue;
        };
        if field.name != key && map.contains_key(field.name) {
            return Err(ConfigError::ConflictingAlias {
                path: path.to_owned(),
                canonical: field.name.to_owned(),
                alias: key.clone(),
            });
        }
        let v = match field.kind {
            Kind::Object(nested) => canonicalize(v, nested, &format!("{path}.{}", field.name))?,
            _ => v.clone(),
        };
        out.insert(field.name.to_owned(), v);
    }
    Ok(Value::Object(out))
}

fn plugin_entry(index: usize, value: Value) -> Result<PluginEntry, ConfigError> {
    match value {
        Value::String(name) if !name.trim().is_empty() => Ok(PluginEntry::new(name.trim())),
        Value::Object(mut map) => {
            let name = match map.remove("name") {
                Some(Value::String(n)) if !n.trim().is_empty() => n.trim().to_owned(),
                _ => return Err(ConfigError::InvalidPluginShape { index }),
            };
            let options = map.remove("options").unwrap_or(Value::Null);
            if !map.is_empty() {
                return Err(ConfigError::InvalidPluginShape { index });
            }
            Ok(PluginEntry { name, options })
        }
        _ => Err(ConfigError::InvalidPluginShape { index }),
    }
}

fn dedup_in_order(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim().to_owned();
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}
