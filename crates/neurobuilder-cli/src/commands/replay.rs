use super::EXIT_SUCCESS;
use neurobuilder_core::{CoreError, Engine};

pub fn run(engine: &Engine, name: &str, version: &str) -> Result<u8, CoreError> {
    engine.replay(name, version)?;
    Ok(EXIT_SUCCESS)
}
