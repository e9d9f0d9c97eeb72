use super::{json_pretty, EXIT_SUCCESS};
use forgepack_schema::{fingerprint, normalize_all, validate, ConfigError, RawInput};
use std::path::Path;

/// Run the validation gate and the normalizer. No engine is created and no
/// plugin runs, so plugin and dependency problems surface only at build time.
pub fn run(input: &RawInput, base_dir: &Path, json: bool) -> Result<u8, String> {
    validate(input).map_err(|e| ConfigError::from(e).to_string())?;
    let configs = normalize_all(input, base_dir).map_err(|e| e.to_string())?;

    if json {
        let mut hashes = Vec::with_capacity(configs.len());
        for config in &configs {
            let fp = fingerprint(config).map_err(|e| format!("JSON serialization failed: {e}"))?;
            hashes.push(serde_json::json!({ "name": config.name, "hash": fp.hash }));
        }
        let payload = serde_json::json!({
            "valid": true,
            "configurations": hashes,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{} {} configuration(s) valid",
            console::style("✓").green(),
            configs.len()
        );
    }
    Ok(EXIT_SUCCESS)
}
