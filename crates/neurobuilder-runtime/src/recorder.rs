use crate::process::{run_tool, shell_join, ChildStdout};
use crate::RuntimeError;
use std::path::Path;

/// Captures an interactive terminal session to a file and plays it back.
pub trait SessionRecorder {
    fn name(&self) -> &str;

    /// Run `command` interactively and capture input, output and timing to
    /// `output`. Blocks until the command exits.
    fn record(&self, output: &Path, command: &[String], title: &str) -> Result<(), RuntimeError>;

    fn play(&self, recording: &Path) -> Result<(), RuntimeError>;
}

/// asciinema CLI (`rec` / `play`), writing asciicast files.
pub struct AsciinemaRecorder {
    binary: String,
    stdout: ChildStdout,
}

impl AsciinemaRecorder {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_owned(),
            stdout: ChildStdout::Inherit,
        }
    }

    pub fn with_stdout(mut self, stdout: ChildStdout) -> Self {
        self.stdout = stdout;
        self
    }

    pub(crate) fn record_argv(&self, output: &Path, command: &[String], title: &str) -> Vec<String> {
        vec![
            self.binary.clone(),
            "rec".to_owned(),
            "--title".to_owned(),
            title.to_owned(),
            "--command".to_owned(),
            shell_join(command),
            output.to_string_lossy().into_owned(),
        ]
    }

    pub(crate) fn play_argv(&self, recording: &Path) -> Vec<String> {
        vec![
            self.binary.clone(),
            "play".to_owned(),
            recording.to_string_lossy().into_owned(),
        ]
    }
}

impl SessionRecorder for AsciinemaRecorder {
    fn name(&self) -> &str {
        "asciinema"
    }

    fn record(&self, output: &Path, command: &[String], title: &str) -> Result<(), RuntimeError> {
        run_tool(&self.binary, &self.record_argv(output, command, title), self.stdout)
    }

    fn play(&self, recording: &Path) -> Result<(), RuntimeError> {
        run_tool(&self.binary, &self.play_argv(recording), self.stdout)
    }
}
