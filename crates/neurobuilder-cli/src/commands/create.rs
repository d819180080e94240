use super::{json_pretty, print_failure, print_step, EXIT_SUCCESS};
use neurobuilder_core::{BuildEvent, BuildOptions, BuildRequest, CoreError, Engine};

pub fn run(
    engine: &Engine,
    request: &BuildRequest,
    options: BuildOptions,
    json: bool,
) -> Result<u8, CoreError> {
    let outcome = engine.create_with_observer(request, options, |event| {
        if json {
            return;
        }
        match event {
            BuildEvent::Entered(stage) => print_step(&stage.to_string(), ""),
            BuildEvent::Failed { stage, .. } => print_failure(&stage.to_string(), "failed"),
            BuildEvent::RolledBack(path) => {
                print_step("rolled back", &path.display().to_string());
            }
            BuildEvent::RecordingKept(path) => {
                print_step("kept recording", &path.display().to_string());
            }
        }
    })?;

    if json {
        println!("{}", json_pretty(&outcome)?);
    } else {
        println!("created {} {}", outcome.name, outcome.version);
        println!("  image:     {}", outcome.image_path.display());
        println!("  recording: {}", outcome.recording_path.display());
    }
    Ok(EXIT_SUCCESS)
}
