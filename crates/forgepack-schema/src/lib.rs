//! Configuration loading, validation, normalization, and defaults for forgepack.
//!
//! This crate is the schema layer: raw configuration parsing from TOML or JSON
//! (`RawInput`), the validation gate (`validate`), canonicalization of alias
//! spellings into a `NormalizedConfig`, the baseline and full default passes,
//! and deterministic configuration fingerprints.

pub mod config;
pub mod defaults;
pub mod identity;
pub mod normalize;
pub mod schema;
pub mod types;
pub mod validate;

pub use config::{
    parse_config_file, parse_config_str, ConfigError, ConfigFormat, RawConfig, RawInput,
};
pub use identity::{fingerprint, ConfigFingerprint};
pub use normalize::{
    normalize, normalize_all, InfrastructureLogging, NormalizedConfig, OutputOptions,
    PluginEntry, WatchOptions,
};
pub use types::{ConfigHash, Devtool, LogLevel, Mode, Poll, ShortHash};
pub use validate::{validate, ValidationError, Violation};
