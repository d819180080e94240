//! Filesystem-only stand-ins for the build engine and recorder.
//!
//! They produce the same files the real tools would (sandbox directory,
//! image file, asciicast recording) so the pipeline and listing logic run
//! unchanged, and can be told to fail at a chosen step.

use crate::backend::BuildEngine;
use crate::recorder::SessionRecorder;
use crate::RuntimeError;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Operation at which a mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStep {
    BuildSandbox,
    BuildImage,
    RunImage,
    RemoveTree,
    Record,
    Play,
}

const MARKER_FILE: &str = ".neurobuilder-mock";

fn injected(step: MockStep) -> RuntimeError {
    RuntimeError::ToolFailed {
        tool: "mock".to_owned(),
        status: format!("injected failure at {step:?}"),
    }
}

fn log_call(calls: &Mutex<Vec<String>>, entry: String) -> Result<(), RuntimeError> {
    calls
        .lock()
        .map_err(|e| RuntimeError::ToolFailed {
            tool: "mock".to_owned(),
            status: format!("mutex poisoned: {e}"),
        })?
        .push(entry);
    Ok(())
}

#[derive(Default)]
pub struct MockEngine {
    fail_at: Option<MockStep>,
    calls: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(step: MockStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    /// Calls made so far, as `"<op> <path>"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn enter(&self, step: MockStep, entry: String) -> Result<(), RuntimeError> {
        log_call(&self.calls, entry)?;
        if self.fail_at == Some(step) {
            return Err(injected(step));
        }
        Ok(())
    }
}

impl BuildEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn build_sandbox(&self, definition: &Path, sandbox: &Path) -> Result<(), RuntimeError> {
        self.enter(
            MockStep::BuildSandbox,
            format!("build_sandbox {}", sandbox.display()),
        )?;
        let def = fs::read_to_string(definition)?;
        fs::create_dir_all(sandbox)?;
        fs::write(sandbox.join(MARKER_FILE), def)?;
        Ok(())
    }

    fn shell_command(&self, sandbox: &Path) -> Vec<String> {
        vec!["mock-shell".to_owned(), sandbox.to_string_lossy().into_owned()]
    }

    fn build_image(&self, sandbox: &Path, image: &Path) -> Result<(), RuntimeError> {
        self.enter(MockStep::BuildImage, format!("build_image {}", image.display()))?;
        let def = fs::read_to_string(sandbox.join(MARKER_FILE))?;
        fs::write(image, format!("mock-sif\n{def}"))?;
        Ok(())
    }

    fn run_image(&self, image: &Path) -> Result<(), RuntimeError> {
        self.enter(MockStep::RunImage, format!("run_image {}", image.display()))?;
        if !image.is_file() {
            return Err(RuntimeError::ToolFailed {
                tool: "mock".to_owned(),
                status: format!("image not found: {}", image.display()),
            });
        }
        println!("mock-run: {}", image.display());
        Ok(())
    }

    fn remove_tree(&self, path: &Path) -> Result<(), RuntimeError> {
        self.enter(MockStep::RemoveTree, format!("remove_tree {}", path.display()))?;
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockRecorder {
    fail_at: Option<MockStep>,
    calls: Mutex<Vec<String>>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(step: MockStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn enter(&self, step: MockStep, entry: String) -> Result<(), RuntimeError> {
        log_call(&self.calls, entry)?;
        if self.fail_at == Some(step) {
            return Err(injected(step));
        }
        Ok(())
    }
}

impl SessionRecorder for MockRecorder {
    fn name(&self) -> &str {
        "mock"
    }

    fn record(&self, output: &Path, command: &[String], title: &str) -> Result<(), RuntimeError> {
        self.enter(MockStep::Record, format!("record {}", output.display()))?;
        let header = serde_json::json!({
            "version": 2,
            "width": 80,
            "height": 24,
            "title": title,
        });
        let event = serde_json::json!([0.1, "o", format!("mock-session: {}\r\n", command.join(" "))]);
        fs::write(output, format!("{header}\n{event}\n"))?;
        Ok(())
    }

    fn play(&self, recording: &Path) -> Result<(), RuntimeError> {
        self.enter(MockStep::Play, format!("play {}", recording.display()))?;
        let cast = fs::read_to_string(recording)?;
        for line in cast.lines().skip(1) {
            if let Ok(serde_json::Value::Array(event)) = serde_json::from_str(line) {
                if let Some(text) = event.get(2).and_then(serde_json::Value::as_str) {
                    print!("{text}");
                }
            }
        }
        Ok(())
    }
}
