use super::drive;
use forgepack_core::Forge;
use forgepack_schema::{RawConfig, RawInput};
use serde_json::Value;

pub fn run(forge: &Forge, input: RawInput, json: bool) -> Result<u8, String> {
    if !json {
        eprintln!("watching, press Ctrl-C to stop");
    }
    drive(forge, &force_watch(input), json, "initial build...")
}

/// Turn watch on for every configuration, whatever the files say.
fn force_watch(input: RawInput) -> RawInput {
    let enable = |config: RawConfig| {
        let mut value = config.into_value();
        if let Some(map) = value.as_object_mut() {
            map.insert("watch".to_owned(), Value::Bool(true));
        }
        RawConfig::new(value)
    };
    match input {
        RawInput::Single(config) => RawInput::Single(enable(config)),
        RawInput::Multi(configs) => RawInput::Multi(configs.into_iter().map(enable).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn watch_is_forced_on_every_configuration() {
        let input = force_watch(RawInput::from_value(json!([{ "watch": false }, { "name": "b" }])));
        for config in input.configs() {
            assert_eq!(config.as_value()["watch"], json!(true));
        }
    }

    #[test]
    fn non_objects_are_left_for_validation() {
        let input = force_watch(RawInput::from_value(json!("oops")));
        assert_eq!(input.configs()[0].as_value(), &json!("oops"));
    }
}
