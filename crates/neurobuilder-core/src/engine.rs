use crate::build::{preflight, BuildEvent, BuildOptions, BuildOutcome, BuildPipeline, BuildRequest};
use crate::concurrency::StoreLock;
use crate::config::Config;
use crate::CoreError;
use neurobuilder_runtime::{select_toolchain, terminal, Toolchain};
use neurobuilder_store::{
    validate_container_name, EnvLayout, Registry, StoreError, VersionDir, VersionSpace,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A built version as reported by [`Engine::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedVersion {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

/// A registry entry whose container directory no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingContainer {
    pub name: String,
    pub path: PathBuf,
}

/// Entry point for the lifecycle commands of one environment root.
///
/// `create` is the only operation that writes to the registry; `run`,
/// `list` and `replay` only read it.
pub struct Engine {
    layout: EnvLayout,
    registry: Registry,
    config: Config,
    toolchain: Toolchain,
}

impl Engine {
    /// Build an engine with the toolchain named by `config.backend`.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Result<Self, CoreError> {
        let toolchain = select_toolchain(&config.backend, &config.tool_settings())?;
        Ok(Self::with_toolchain(root, config, toolchain))
    }

    pub fn with_toolchain(root: impl Into<PathBuf>, config: Config, toolchain: Toolchain) -> Self {
        let layout = EnvLayout::new(root);
        debug!(
            "engine at {} using {}/{}",
            layout.root().display(),
            toolchain.engine.name(),
            toolchain.recorder.name()
        );
        Self {
            registry: Registry::new(layout.clone()),
            layout,
            config,
            toolchain,
        }
    }

    pub fn layout(&self) -> &EnvLayout {
        &self.layout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn create(
        &self,
        request: &BuildRequest,
        options: BuildOptions,
    ) -> Result<BuildOutcome, CoreError> {
        self.create_with_observer(request, options, |_| {})
    }

    /// Build a new version, reporting stage changes to `observer`.
    ///
    /// The request is validated before the registry is touched, so a
    /// rejected request leaves the environment unchanged.
    pub fn create_with_observer<F>(
        &self,
        request: &BuildRequest,
        options: BuildOptions,
        observer: F,
    ) -> Result<BuildOutcome, CoreError>
    where
        F: FnMut(BuildEvent<'_>),
    {
        let plan = preflight(request)?;
        info!("creating {} from {}", plan.name, plan.base);

        let container = {
            let _lock = StoreLock::acquire(&self.layout.lock_file())?;
            self.registry.resolve_container_path(&plan.name)?
        };

        BuildPipeline::new(
            &self.layout,
            &self.toolchain,
            self.config.template_options(),
            options,
            observer,
        )
        .execute(&plan, &container.path)
    }

    /// Execute the image of an existing version.
    pub fn run(&self, name: &str, version: &str) -> Result<(), CoreError> {
        let version_dir = self.locate(name, version)?;
        if !version_dir.is_built() {
            return Err(not_found(name, version));
        }
        info!("running {name} {version}");
        self.toolchain
            .engine
            .run_image(&version_dir.image_path())?;
        Ok(())
    }

    /// Every built version of every registered container, sorted by name and
    /// then by version.
    pub fn list(&self) -> Result<Vec<ListedVersion>, CoreError> {
        let record = self.registry.load()?;
        let mut listed = Vec::new();
        for (name, path) in &record.containers {
            if !path.is_dir() {
                warn!(
                    "skipping container '{name}': directory {} is missing",
                    path.display()
                );
                continue;
            }
            for version in VersionSpace::new(name, path).built_versions()? {
                listed.push(ListedVersion {
                    path: path.join(&version),
                    name: name.clone(),
                    version,
                });
            }
        }
        Ok(listed)
    }

    /// Play back the recorded build session of an existing version.
    pub fn replay(&self, name: &str, version: &str) -> Result<(), CoreError> {
        let version_dir = self.locate(name, version)?;
        let recording = version_dir.recording_path();
        if !recording.is_file() {
            return Err(not_found(name, version));
        }
        terminal::print_replay_banner(name, version);
        self.toolchain.recorder.play(&recording)?;
        Ok(())
    }

    /// Registry entries pointing at directories that no longer exist.
    pub fn check_registry(&self) -> Result<Vec<MissingContainer>, CoreError> {
        let record = self.registry.load()?;
        Ok(record
            .containers
            .into_iter()
            .filter(|(_, path)| !path.is_dir())
            .map(|(name, path)| MissingContainer { name, path })
            .collect())
    }

    /// Find an existing version without creating anything.
    fn locate(&self, name: &str, version: &str) -> Result<VersionDir, CoreError> {
        validate_container_name(name)?;
        let Some(container_path) = self.registry.lookup(name)? else {
            return Err(not_found(name, version));
        };
        Ok(VersionSpace::new(name, container_path).locate(version)?)
    }
}

fn not_found(name: &str, version: &str) -> CoreError {
    CoreError::Store(StoreError::VersionNotFound {
        name: name.to_owned(),
        version: version.to_owned(),
    })
}
