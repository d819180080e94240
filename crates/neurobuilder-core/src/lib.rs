//! Core orchestration for neurobuilder container builds.
//!
//! This crate ties the store and the external tool backends together into the
//! `Engine`, the API behind the `create`, `run`, `list` and `replay` commands.
//! It also holds the build pipeline state machine, environment configuration,
//! the advisory store lock, and interrupt handling.

pub mod build;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod lifecycle;

pub use build::{BuildEvent, BuildOptions, BuildOutcome, BuildPipeline, BuildPlan, BuildRequest};
pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use config::Config;
pub use engine::{Engine, ListedVersion, MissingContainer};
pub use lifecycle::{validate_transition, BuildStage};

use neurobuilder_runtime::RuntimeError;
use neurobuilder_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error("config error: {0}")]
    Config(String),
    #[error("store lock: {0}")]
    Lock(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid build transition: {from} -> {to}")]
    InvalidTransition { from: BuildStage, to: BuildStage },
    #[error("interrupted before {stage}")]
    Interrupted { stage: BuildStage },
    #[error("build failed during {stage}: {source}")]
    BuildFailed {
        stage: BuildStage,
        #[source]
        source: Box<CoreError>,
    },
}

/// Failure classes callers can act on (the CLI maps them to exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnknownPackageManager,
    DuplicateVersion,
    VersionNotFound,
    CorruptRegistry,
    ExternalToolFailure,
    Interrupted,
    Other,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Store(e) => match e {
                StoreError::InvalidName(_) | StoreError::InvalidVersion(_) => {
                    ErrorKind::InvalidInput
                }
                StoreError::DuplicateVersion { .. } => ErrorKind::DuplicateVersion,
                StoreError::VersionNotFound { .. } => ErrorKind::VersionNotFound,
                StoreError::CorruptRegistry { .. }
                | StoreError::UnsupportedRegistryVersion { .. } => ErrorKind::CorruptRegistry,
                StoreError::Io(_) | StoreError::Serialization(_) | StoreError::NoDataDir => {
                    ErrorKind::Other
                }
            },
            CoreError::Runtime(e) => match e {
                RuntimeError::UnknownPackageManager(_)
                | RuntimeError::UnsupportedPackageManager(_) => ErrorKind::UnknownPackageManager,
                RuntimeError::ToolNotFound { .. } | RuntimeError::ToolFailed { .. } => {
                    ErrorKind::ExternalToolFailure
                }
                RuntimeError::BackendUnavailable(_) => ErrorKind::InvalidInput,
                RuntimeError::Io(_) => ErrorKind::Other,
            },
            CoreError::Config(_) => ErrorKind::InvalidInput,
            CoreError::Interrupted { .. } => ErrorKind::Interrupted,
            CoreError::BuildFailed { source, .. } => source.kind(),
            CoreError::Lock(_) | CoreError::Io(_) | CoreError::InvalidTransition { .. } => {
                ErrorKind::Other
            }
        }
    }

    /// The innermost error, looking through build-stage wrappers.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::BuildFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The stage a build failed in, if this error came out of the pipeline.
    pub fn failed_stage(&self) -> Option<BuildStage> {
        match self {
            CoreError::BuildFailed { stage, .. } | CoreError::Interrupted { stage } => Some(*stage),
            _ => None,
        }
    }
}
