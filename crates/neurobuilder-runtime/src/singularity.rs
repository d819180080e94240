use crate::backend::BuildEngine;
use crate::process::{run_tool, ChildStdout};
use crate::RuntimeError;
use std::path::Path;

/// Singularity/Apptainer CLI. Builds and the writable shell need root, so
/// they are prefixed with `sudo` unless disabled; `run` never is.
pub struct SingularityEngine {
    binary: String,
    sudo: bool,
    stdout: ChildStdout,
}

impl SingularityEngine {
    pub fn new(binary: &str, sudo: bool) -> Self {
        Self {
            binary: binary.to_owned(),
            sudo,
            stdout: ChildStdout::Inherit,
        }
    }

    pub fn with_stdout(mut self, stdout: ChildStdout) -> Self {
        self.stdout = stdout;
        self
    }

    fn privileged(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::new();
        if self.sudo {
            argv.push("sudo".to_owned());
        }
        argv.push(self.binary.clone());
        argv.extend(args.iter().map(|a| (*a).to_owned()));
        argv
    }

    pub(crate) fn sandbox_argv(&self, definition: &Path, sandbox: &Path) -> Vec<String> {
        self.privileged(&[
            "build",
            "--sandbox",
            &sandbox.to_string_lossy(),
            &definition.to_string_lossy(),
        ])
    }

    pub(crate) fn image_argv(&self, sandbox: &Path, image: &Path) -> Vec<String> {
        self.privileged(&["build", &image.to_string_lossy(), &sandbox.to_string_lossy()])
    }

    pub(crate) fn run_argv(&self, image: &Path) -> Vec<String> {
        vec![
            self.binary.clone(),
            "run".to_owned(),
            image.to_string_lossy().into_owned(),
        ]
    }
}

impl BuildEngine for SingularityEngine {
    fn name(&self) -> &str {
        "singularity"
    }

    fn build_sandbox(&self, definition: &Path, sandbox: &Path) -> Result<(), RuntimeError> {
        run_tool(&self.binary, &self.sandbox_argv(definition, sandbox), self.stdout)
    }

    fn shell_command(&self, sandbox: &Path) -> Vec<String> {
        self.privileged(&["shell", "--writable", &sandbox.to_string_lossy()])
    }

    fn build_image(&self, sandbox: &Path, image: &Path) -> Result<(), RuntimeError> {
        run_tool(&self.binary, &self.image_argv(sandbox, image), self.stdout)
    }

    fn run_image(&self, image: &Path) -> Result<(), RuntimeError> {
        run_tool(&self.binary, &self.run_argv(image), self.stdout)
    }

    fn remove_tree(&self, path: &Path) -> Result<(), RuntimeError> {
        if !path.exists() {
            return Ok(());
        }
        if self.sudo {
            let argv = vec![
                "sudo".to_owned(),
                "rm".to_owned(),
                "-rf".to_owned(),
                path.to_string_lossy().into_owned(),
            ];
            run_tool("rm", &argv, self.stdout)
        } else {
            std::fs::remove_dir_all(path)?;
            Ok(())
        }
    }
}
