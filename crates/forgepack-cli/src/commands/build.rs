use super::drive;
use forgepack_core::Forge;
use forgepack_schema::RawInput;

pub fn run(forge: &Forge, input: &RawInput, json: bool) -> Result<u8, String> {
    tracing::debug!(configurations = input.configs().len(), "build requested");
    drive(forge, input, json, "building...")
}
