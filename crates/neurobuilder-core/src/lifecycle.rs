use crate::CoreError;
use serde::Serialize;
use std::fmt;

/// Stages of a single container-version build, in execution order.
///
/// A build only ever moves to the immediate successor of its current stage;
/// a failure ends it in whatever stage was active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
    Init,
    ResolveVersion,
    AllocateVersion,
    GenerateSpec,
    BuildSandbox,
    RecordSession,
    ConvertImage,
    Cleanup,
    Done,
}

impl BuildStage {
    pub const SEQUENCE: [BuildStage; 9] = [
        BuildStage::Init,
        BuildStage::ResolveVersion,
        BuildStage::AllocateVersion,
        BuildStage::GenerateSpec,
        BuildStage::BuildSandbox,
        BuildStage::RecordSession,
        BuildStage::ConvertImage,
        BuildStage::Cleanup,
        BuildStage::Done,
    ];

    pub fn next(self) -> Option<BuildStage> {
        match self {
            BuildStage::Init => Some(BuildStage::ResolveVersion),
            BuildStage::ResolveVersion => Some(BuildStage::AllocateVersion),
            BuildStage::AllocateVersion => Some(BuildStage::GenerateSpec),
            BuildStage::GenerateSpec => Some(BuildStage::BuildSandbox),
            BuildStage::BuildSandbox => Some(BuildStage::RecordSession),
            BuildStage::RecordSession => Some(BuildStage::ConvertImage),
            BuildStage::ConvertImage => Some(BuildStage::Cleanup),
            BuildStage::Cleanup => Some(BuildStage::Done),
            BuildStage::Done => None,
        }
    }

    /// Whether a pending interrupt may still abort the build when entering
    /// this stage. Once the image exists the build runs to completion.
    pub fn interruptible(self) -> bool {
        !matches!(self, BuildStage::Cleanup | BuildStage::Done)
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Init => "init",
            BuildStage::ResolveVersion => "resolve-version",
            BuildStage::AllocateVersion => "allocate-version",
            BuildStage::GenerateSpec => "generate-spec",
            BuildStage::BuildSandbox => "build-sandbox",
            BuildStage::RecordSession => "record-session",
            BuildStage::ConvertImage => "convert-image",
            BuildStage::Cleanup => "cleanup",
            BuildStage::Done => "done",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: BuildStage, to: BuildStage) -> Result<(), CoreError> {
    if from.next() == Some(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}
