use crate::normalize::NormalizedConfig;
use crate::types::{ConfigHash, ShortHash};
use serde::Serialize;

/// Deterministic fingerprint of a configuration, derived from its canonical JSON.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigFingerprint {
    pub hash: ConfigHash,
    pub short: ShortHash,
}

pub fn fingerprint(config: &NormalizedConfig) -> Result<ConfigFingerprint, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config.canonical_json()?.as_bytes());
    for plugin in &config.plugins {
        hasher.update(format!("plugin:{}", plugin.name).as_bytes());
    }
    for dep in &config.dependencies {
        hasher.update(format!("dep:{dep}").as_bytes());
    }

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();
    Ok(ConfigFingerprint {
        hash: ConfigHash::new(hex),
        short: ShortHash::new(short),
    })
}
