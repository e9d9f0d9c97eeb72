use crate::validate::ValidationError;
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to parse configuration: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("configuration error: '{canonical}' and its alias '{alias}' are both set at {path}")]
    ConflictingAlias {
        path: String,
        canonical: String,
        alias: String,
    },
    #[error("configuration error: plugins[{index}] must be a plugin name or an object with a 'name'")]
    InvalidPluginShape { index: usize },
    #[error("configuration error: {path} has an unsupported value: {reason}")]
    InvalidValue { path: String, reason: String },
}

impl ConfigError {
    /// Whether this error came from the validation gate rather than from
    /// normalizing an already well-typed configuration.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ParseToml(_) | Self::ParseJson(_) | Self::Invalid(_)
        )
    }
}

/// One raw, loosely shaped configuration object as supplied by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfig(Value);

impl RawConfig {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for RawConfig {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A single configuration, or an ordered sequence of sibling configurations.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    Single(RawConfig),
    Multi(Vec<RawConfig>),
}

impl RawInput {
    /// A JSON array is multi-configuration mode; anything else is a single one.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Multi(items.into_iter().map(RawConfig::new).collect()),
            other => Self::Single(RawConfig::new(other)),
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    pub fn configs(&self) -> &[RawConfig] {
        match self {
            Self::Single(c) => std::slice::from_ref(c),
            Self::Multi(cs) => cs,
        }
    }
}

impl From<Value> for RawInput {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Key under which a TOML document lists sibling configurations.
pub const MULTI_KEY: &str = "configurations";

pub fn parse_config_str(input: &str, format: ConfigFormat) -> Result<RawInput, ConfigError> {
    match format {
        ConfigFormat::Json => Ok(RawInput::from_value(serde_json::from_str(input)?)),
        ConfigFormat::Toml => {
            let doc: toml::Table = toml::from_str(input)?;
            let value = serde_json::to_value(doc)?;
            // TOML has no top-level arrays; a lone `configurations` array stands in for one.
            if let Value::Object(map) = &value {
                if map.len() == 1 {
                    if let Some(Value::Array(items)) = map.get(MULTI_KEY) {
                        return Ok(RawInput::Multi(
                            items.iter().cloned().map(RawConfig::new).collect(),
                        ));
                    }
                }
            }
            Ok(RawInput::Single(RawConfig::new(value)))
        }
    }
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<RawInput, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_config_str(&content, ConfigFormat::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_single_toml() {
        let input = r#"
name = "app"
mode = "development"
watch = true

[watchOptions]
aggregateTimeout = 300
"#;
        let raw = parse_config_str(input, ConfigFormat::Toml).unwrap();
        let RawInput::Single(cfg) = raw else {
            panic!("expected single configuration");
        };
        assert_eq!(cfg.as_value()["name"], "app");
        assert_eq!(cfg.as_value()["watchOptions"]["aggregateTimeout"], 300);
    }

    #[test]
    fn parses_multi_toml() {
        let input = r#"
[[configurations]]
name = "client"

[[configurations]]
name = "server"
dependencies = ["client"]
"#;
        let raw = parse_config_str(input, ConfigFormat::Toml).unwrap();
        assert!(raw.is_multi());
        assert_eq!(raw.configs().len(), 2);
        assert_eq!(raw.configs()[1].as_value()["dependencies"], json!(["client"]));
    }

    #[test]
    fn configurations_key_next_to_other_keys_stays_single() {
        let input = r#"
name = "app"
configurations = [{ name = "x" }]
"#;
        let raw = parse_config_str(input, ConfigFormat::Toml).unwrap();
        assert!(!raw.is_multi());
    }

    #[test]
    fn parses_json_array_as_multi() {
        let raw = parse_config_str(r#"[{"name":"a"},{"name":"b"}]"#, ConfigFormat::Json).unwrap();
        assert!(raw.is_multi());
        assert_eq!(raw.configs().len(), 2);
    }

    #[test]
    fn reads_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forgepack.json");
        std::fs::write(&path, r#"{"name":"app"}"#).unwrap();
        let raw = parse_config_file(&path).unwrap();
        assert_eq!(raw.configs()[0].as_value()["name"], "app");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            parse_config_str("name = ", ConfigFormat::Toml),
            Err(ConfigError::ParseToml(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = parse_config_file("/nonexistent/forgepack.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert!(err.is_validation());
    }
}
