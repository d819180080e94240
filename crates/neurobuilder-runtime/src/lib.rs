//! External tool backends and build-definition generation for neurobuilder.
//!
//! This crate implements the execution layer: the pluggable `BuildEngine`
//! (Singularity sandbox/image builds) and `SessionRecorder` (asciinema
//! capture and playback) traits with real and mock implementations, package
//! manager detection, Singularity definition templating, prerequisite
//! checking, and terminal banners around the interactive session.

pub mod backend;
pub mod mock;
pub mod package;
pub mod prereq;
mod process;
pub mod recorder;
pub mod singularity;
pub mod template;
pub mod terminal;

pub use backend::{select_toolchain, BuildEngine, ToolSettings, Toolchain};
pub use mock::{MockEngine, MockRecorder, MockStep};
pub use package::PackageManager;
pub use prereq::{check_prereqs, format_missing, MissingPrereq};
pub use process::{foreground_child_running, ChildStdout};
pub use recorder::{AsciinemaRecorder, SessionRecorder};
pub use singularity::SingularityEngine;
pub use template::{render_definition, TemplateOptions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available")]
    BackendUnavailable(String),
    #[error("could not detect a package manager for base image '{0}'; pass --pkg")]
    UnknownPackageManager(String),
    #[error("unsupported package manager '{0}' (expected apt or yum)")]
    UnsupportedPackageManager(String),
    #[error("{tool} not found or failed to start: {source}")]
    ToolNotFound {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed: {status}")]
    ToolFailed { tool: String, status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failed_names_tool() {
        let e = RuntimeError::ToolFailed {
            tool: "singularity".to_owned(),
            status: "exit status: 255".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("singularity"));
        assert!(msg.contains("255"));
    }

    #[test]
    fn unknown_package_manager_hints_flag() {
        let e = RuntimeError::UnknownPackageManager("alpine:3".to_owned());
        let msg = e.to_string();
        assert!(msg.contains("alpine:3"));
        assert!(msg.contains("--pkg"));
    }
}
