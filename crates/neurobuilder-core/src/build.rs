use crate::concurrency::shutdown_requested;
use crate::lifecycle::{validate_transition, BuildStage};
use crate::CoreError;
use neurobuilder_runtime::{render_definition, terminal, PackageManager, TemplateOptions, Toolchain};
use neurobuilder_store::{
    validate_container_name, validate_version, version_from_time, BuildWorkspace, EnvLayout,
    VersionDir, VersionSpace,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the caller asked to build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub name: String,
    pub base: String,
    /// Version name; derived from the current local time when absent.
    pub version: Option<String>,
    /// `apt` or `yum`; detected from `base` when absent or empty.
    pub package_manager: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Leave the workspace and version directory behind when a build fails.
    pub keep_failed: bool,
}

/// A request that passed input validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub name: String,
    pub base: String,
    pub version: Option<String>,
    pub package_manager: PackageManager,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub name: String,
    pub version: String,
    pub base: String,
    pub package_manager: PackageManager,
    pub container_path: PathBuf,
    pub version_path: PathBuf,
    pub image_path: PathBuf,
    pub recording_path: PathBuf,
}

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug)]
pub enum BuildEvent<'e> {
    Entered(BuildStage),
    Failed {
        stage: BuildStage,
        error: &'e CoreError,
    },
    RolledBack(&'e Path),
    /// The session recording of a rolled-back build was moved out of the
    /// version directory instead of being deleted.
    RecordingKept(&'e Path),
}

/// Validate a request before anything on disk is touched.
pub fn preflight(request: &BuildRequest) -> Result<BuildPlan, CoreError> {
    validate_container_name(&request.name)?;
    if let Some(version) = &request.version {
        validate_version(version)?;
    }
    let package_manager =
        PackageManager::resolve(&request.base, request.package_manager.as_deref())?;
    debug!(
        "preflight ok: {} from {} ({package_manager})",
        request.name, request.base
    );
    Ok(BuildPlan {
        name: request.name.clone(),
        base: request.base.clone(),
        version: request.version.clone(),
        package_manager,
    })
}

/// Drives one build from `Init` to `Done`, undoing its own side effects if a
/// stage fails.
pub struct BuildPipeline<'a, F> {
    layout: &'a EnvLayout,
    toolchain: &'a Toolchain,
    template: TemplateOptions,
    options: BuildOptions,
    stage: BuildStage,
    workspace: Option<BuildWorkspace>,
    allocated: Option<VersionDir>,
    interrupted: Box<dyn Fn() -> bool + 'a>,
    observer: F,
}

impl<'a, F> BuildPipeline<'a, F>
where
    F: FnMut(BuildEvent<'_>),
{
    pub fn new(
        layout: &'a EnvLayout,
        toolchain: &'a Toolchain,
        template: TemplateOptions,
        options: BuildOptions,
        observer: F,
    ) -> Self {
        Self {
            layout,
            toolchain,
            template,
            options,
            stage: BuildStage::Init,
            workspace: None,
            allocated: None,
            interrupted: Box::new(shutdown_requested),
            observer,
        }
    }

    /// Replace the process-wide Ctrl-C flag as the source of interrupts.
    #[must_use]
    pub fn with_interrupt_check(mut self, check: impl Fn() -> bool + 'a) -> Self {
        self.interrupted = Box::new(check);
        self
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Build a new version of `plan.name` inside `container_path`.
    ///
    /// On failure the returned error names the stage that failed. An
    /// interrupt is returned as `Interrupted` rather than wrapped.
    pub fn execute(
        mut self,
        plan: &BuildPlan,
        container_path: &Path,
    ) -> Result<BuildOutcome, CoreError> {
        (self.observer)(BuildEvent::Entered(BuildStage::Init));
        match self.run_stages(plan, container_path) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let stage = self.stage;
                let err = match err {
                    CoreError::Runtime(_) if (self.interrupted)() => {
                        CoreError::Interrupted { stage }
                    }
                    other => other,
                };
                warn!("build of '{}' failed during {stage}: {err}", plan.name);
                (self.observer)(BuildEvent::Failed { stage, error: &err });
                self.rollback();
                match err {
                    CoreError::Interrupted { .. } => Err(err),
                    other => Err(CoreError::BuildFailed {
                        stage,
                        source: Box::new(other),
                    }),
                }
            }
        }
    }

    fn advance(&mut self, next: BuildStage) -> Result<(), CoreError> {
        validate_transition(self.stage, next)?;
        if next.interruptible() && (self.interrupted)() {
            return Err(CoreError::Interrupted { stage: next });
        }
        info!("{} -> {next}", self.stage);
        self.stage = next;
        (self.observer)(BuildEvent::Entered(next));
        Ok(())
    }

    fn run_stages(
        &mut self,
        plan: &BuildPlan,
        container_path: &Path,
    ) -> Result<BuildOutcome, CoreError> {
        let toolchain = self.toolchain;
        let engine = &*toolchain.engine;

        self.advance(BuildStage::ResolveVersion)?;
        let version = match &plan.version {
            Some(v) => v.clone(),
            None => version_from_time(&chrono::Local::now()),
        };

        self.advance(BuildStage::AllocateVersion)?;
        let version_dir = VersionSpace::new(&plan.name, container_path).allocate(&version)?;
        self.allocated = Some(version_dir.clone());
        info!("allocated {} {version} at {}", plan.name, version_dir.path().display());

        self.advance(BuildStage::GenerateSpec)?;
        let definition = render_definition(&plan.base, plan.package_manager, &self.template);

        self.advance(BuildStage::BuildSandbox)?;
        let workspace = self.layout.create_build_workspace()?;
        self.workspace = Some(workspace.clone());
        let template_file = workspace.template_file();
        let sandbox = workspace.sandbox_dir();
        std::fs::write(&template_file, definition)?;
        engine.build_sandbox(&template_file, &sandbox)?;

        self.advance(BuildStage::RecordSession)?;
        let shell = engine.shell_command(&sandbox);
        terminal::print_recording_banner(&plan.name, &version);
        toolchain.recorder.record(
            &version_dir.recording_path(),
            &shell,
            &format!("{} {version}", plan.name),
        )?;
        terminal::print_recording_exit(&plan.name, &version);

        self.advance(BuildStage::ConvertImage)?;
        engine.build_image(&sandbox, &version_dir.image_path())?;

        self.advance(BuildStage::Cleanup)?;
        if let Some(workspace) = self.workspace.take() {
            if let Err(e) = engine.remove_tree(workspace.dir()) {
                warn!(
                    "could not remove build workspace {}: {e}",
                    workspace.dir().display()
                );
            }
        }

        self.advance(BuildStage::Done)?;
        self.allocated = None;
        Ok(BuildOutcome {
            name: plan.name.clone(),
            version,
            base: plan.base.clone(),
            package_manager: plan.package_manager,
            container_path: container_path.to_path_buf(),
            version_path: version_dir.path().to_path_buf(),
            image_path: version_dir.image_path(),
            recording_path: version_dir.recording_path(),
        })
    }

    fn rollback(&mut self) {
        let workspace = self.workspace.take();
        let allocated = self.allocated.take();
        let leftovers: Vec<PathBuf> = workspace
            .map(|w| w.dir().to_path_buf())
            .into_iter()
            .chain(allocated.as_ref().map(|v| v.path().to_path_buf()))
            .collect();

        if self.options.keep_failed {
            for path in &leftovers {
                warn!("keeping failed build state at {}", path.display());
            }
            return;
        }

        if let Some(version_dir) = &allocated {
            self.keep_recording(version_dir);
        }
        for path in leftovers {
            match self.toolchain.engine.remove_tree(&path) {
                Ok(()) => {
                    info!("rolled back {}", path.display());
                    (self.observer)(BuildEvent::RolledBack(&path));
                }
                Err(e) => warn!("rollback could not remove {}: {e}", path.display()),
            }
        }
    }

    /// A finished session cannot be recorded again, so it survives rollback
    /// next to the version directory.
    fn keep_recording(&mut self, version_dir: &VersionDir) {
        let recording = version_dir.recording_path();
        if !recording.is_file() {
            return;
        }
        let kept = version_dir.failed_recording_path();
        match std::fs::rename(&recording, &kept) {
            Ok(()) => {
                warn!("kept recording of the failed build at {}", kept.display());
                (self.observer)(BuildEvent::RecordingKept(&kept));
            }
            Err(e) => warn!(
                "could not keep recording {}, it will be removed: {e}",
                recording.display()
            ),
        }
    }
}
