use super::{json_pretty, EXIT_SUCCESS};
use neurobuilder_core::{CoreError, Engine};

pub fn run(engine: &Engine, json: bool) -> Result<u8, CoreError> {
    let versions = engine.list()?;
    if json {
        println!("{}", json_pretty(&versions)?);
    } else {
        for v in &versions {
            println!("{} {}", v.name, v.version);
        }
    }
    Ok(EXIT_SUCCESS)
}
