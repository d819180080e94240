use crate::mock::{MockEngine, MockRecorder};
use crate::process::ChildStdout;
use crate::recorder::{AsciinemaRecorder, SessionRecorder};
use crate::singularity::SingularityEngine;
use crate::RuntimeError;
use std::path::Path;

/// The container build engine: turns a definition into a writable sandbox,
/// freezes a sandbox into an image, and runs images.
///
/// Every operation is a synchronous child process; success is exit status 0.
pub trait BuildEngine {
    fn name(&self) -> &str;

    fn build_sandbox(&self, definition: &Path, sandbox: &Path) -> Result<(), RuntimeError>;

    /// Command line that opens an interactive, writable shell in `sandbox`.
    fn shell_command(&self, sandbox: &Path) -> Vec<String>;

    fn build_image(&self, sandbox: &Path, image: &Path) -> Result<(), RuntimeError>;

    fn run_image(&self, image: &Path) -> Result<(), RuntimeError>;

    /// Remove a directory tree the engine may have populated with files the
    /// current user cannot delete directly.
    fn remove_tree(&self, path: &Path) -> Result<(), RuntimeError>;
}

/// Settings for the real external tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub engine_binary: String,
    pub sudo: bool,
    pub recorder_binary: String,
    pub child_stdout: ChildStdout,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            engine_binary: "singularity".to_owned(),
            sudo: true,
            recorder_binary: "asciinema".to_owned(),
            child_stdout: ChildStdout::Inherit,
        }
    }
}

/// The pair of external collaborators a build needs.
pub struct Toolchain {
    pub engine: Box<dyn BuildEngine>,
    pub recorder: Box<dyn SessionRecorder>,
}

impl Toolchain {
    pub fn new(engine: Box<dyn BuildEngine>, recorder: Box<dyn SessionRecorder>) -> Self {
        Self { engine, recorder }
    }

    pub fn is_mock(&self) -> bool {
        self.engine.name() == "mock"
    }
}

pub fn select_toolchain(backend: &str, settings: &ToolSettings) -> Result<Toolchain, RuntimeError> {
    match backend {
        "singularity" => Ok(Toolchain::new(
            Box::new(
                SingularityEngine::new(&settings.engine_binary, settings.sudo)
                    .with_stdout(settings.child_stdout),
            ),
            Box::new(
                AsciinemaRecorder::new(&settings.recorder_binary)
                    .with_stdout(settings.child_stdout),
            ),
        )),
        "mock" => Ok(Toolchain::new(
            Box::new(MockEngine::new()),
            Box::new(MockRecorder::new()),
        )),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_valid_backends() {
        let settings = ToolSettings::default();
        let real = select_toolchain("singularity", &settings).unwrap();
        assert_eq!(real.engine.name(), "singularity");
        assert_eq!(real.recorder.name(), "asciinema");
        assert!(!real.is_mock());

        let mock = select_toolchain("mock", &settings).unwrap();
        assert!(mock.is_mock());
    }

    #[test]
    fn select_invalid_backend_fails() {
        assert!(matches!(
            select_toolchain("docker", &ToolSettings::default()),
            Err(RuntimeError::BackendUnavailable(_))
        ));
    }
}
