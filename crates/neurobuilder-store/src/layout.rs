use crate::StoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory.
pub const APP_DIR_NAME: &str = "neurobuilder";

const REGISTRY_FILE: &str = "registry.json";
const CONFIG_FILE: &str = "config.toml";
const LOCK_FILE: &str = ".lock";
const TEMP_DIR: &str = "temp";

/// Resolve the environment root for this invocation.
///
/// An explicit, non-empty path wins (with a leading `~/` expanded against
/// `$HOME`, and made absolute so registry entries stay valid from any
/// working directory); otherwise the platform user-data directory is used.
pub fn resolve_environment_root(explicit: &str) -> Result<PathBuf, StoreError> {
    if !explicit.is_empty() {
        return Ok(std::path::absolute(expand_tilde(explicit))?);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .ok_or(StoreError::NoDataDir)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Fresh random identifier for container directories and build workspaces.
pub fn new_identifier() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Join `container_dir/version`, optionally creating it.
///
/// Returns the path and whether it already existed. Creation is a single
/// non-recursive `mkdir`: the container directory must already exist.
pub fn container_version_path(
    container_dir: &Path,
    version: &str,
    create: bool,
) -> Result<(PathBuf, bool), StoreError> {
    let path = container_dir.join(version);
    if path.exists() {
        return Ok((path, true));
    }
    if create {
        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok((path, true)),
            Err(e) => return Err(e.into()),
        }
    }
    Ok((path, false))
}

/// Directory layout of a neurobuilder environment root.
///
/// ```text
/// <root>/registry.json
/// <root>/config.toml
/// <root>/<container-id>/<version>/{recording.cast,container.sif}
/// <root>/temp/<workspace-id>/{template,sandbox}
/// ```
#[derive(Debug, Clone)]
pub struct EnvLayout {
    root: PathBuf,
}

impl EnvLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    #[inline]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    #[inline]
    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    #[inline]
    pub fn container_dir(&self, container_id: &str) -> PathBuf {
        self.root.join(container_id)
    }

    #[inline]
    pub fn build_workspace(&self, workspace_id: &str) -> BuildWorkspace {
        BuildWorkspace {
            dir: self.temp_dir().join(workspace_id),
        }
    }

    /// Create a new, uniquely named build workspace under `temp/`.
    pub fn create_build_workspace(&self) -> Result<BuildWorkspace, StoreError> {
        let workspace = self.build_workspace(&new_identifier());
        fs::create_dir_all(workspace.dir())?;
        Ok(workspace)
    }
}

/// Transient directory holding the build definition and the writable sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWorkspace {
    dir: PathBuf,
}

impl BuildWorkspace {
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[inline]
    pub fn template_file(&self) -> PathBuf {
        self.dir.join("template")
    }

    #[inline]
    pub fn sandbox_dir(&self) -> PathBuf {
        self.dir.join("sandbox")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = EnvLayout::new("/tmp/nb-test");
        assert_eq!(
            layout.registry_file(),
            PathBuf::from("/tmp/nb-test/registry.json")
        );
        assert_eq!(layout.config_file(), PathBuf::from("/tmp/nb-test/config.toml"));
        assert_eq!(layout.lock_file(), PathBuf::from("/tmp/nb-test/.lock"));
        assert_eq!(layout.temp_dir(), PathBuf::from("/tmp/nb-test/temp"));
        assert_eq!(
            layout.container_dir("abc"),
            PathBuf::from("/tmp/nb-test/abc")
        );

        let ws = layout.build_workspace("w1");
        assert_eq!(ws.dir(), Path::new("/tmp/nb-test/temp/w1"));
        assert_eq!(
            ws.template_file(),
            PathBuf::from("/tmp/nb-test/temp/w1/template")
        );
        assert_eq!(
            ws.sandbox_dir(),
            PathBuf::from("/tmp/nb-test/temp/w1/sandbox")
        );
    }

    #[test]
    fn explicit_root_wins() {
        let root = resolve_environment_root("/srv/containers").unwrap();
        assert_eq!(root, PathBuf::from("/srv/containers"));
    }

    #[test]
    fn explicit_relative_root_is_made_absolute() {
        let a = resolve_environment_root("relative/env").unwrap();
        let b = resolve_environment_root("relative/env").unwrap();
        assert_eq!(a, b);
        assert!(a.is_absolute());
        assert!(a.ends_with("relative/env"));
    }

    #[test]
    fn empty_root_uses_app_dir() {
        if let Ok(root) = resolve_environment_root("") {
            assert!(root.ends_with(APP_DIR_NAME));
        }
    }

    #[test]
    fn tilde_is_expanded() {
        if let Some(home) = dirs::home_dir() {
            let root = resolve_environment_root("~/nb").unwrap();
            assert_eq!(root, home.join("nb"));
        }
    }

    #[test]
    fn identifiers_are_unique() {
        assert_ne!(new_identifier(), new_identifier());
    }

    #[test]
    fn version_path_without_create_has_no_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let (path, existed) = container_version_path(dir.path(), "v1", false).unwrap();
        assert!(!existed);
        assert!(!path.exists());
    }

    #[test]
    fn version_path_create_then_exists() {
        let dir = tempfile::tempdir().unwrap();
        let (path, existed) = container_version_path(dir.path(), "v1", true).unwrap();
        assert!(!existed);
        assert!(path.is_dir());

        let (again, existed) = container_version_path(dir.path(), "v1", true).unwrap();
        assert!(existed);
        assert_eq!(path, again);
    }

    #[test]
    fn create_build_workspace_makes_unique_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = EnvLayout::new(dir.path());
        let a = layout.create_build_workspace().unwrap();
        let b = layout.create_build_workspace().unwrap();
        assert_ne!(a, b);
        assert!(a.dir().is_dir());
        assert!(a.dir().starts_with(layout.temp_dir()));
    }
}
