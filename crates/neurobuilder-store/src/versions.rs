use crate::layout::container_version_path;
use crate::StoreError;
use chrono::{DateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

/// Captured terminal session inside a version directory.
pub const RECORDING_FILE: &str = "recording.cast";
/// Finalized, immutable image inside a version directory.
pub const IMAGE_FILE: &str = "container.sif";
/// Appended to the version name for the recording kept from a failed build.
pub const FAILED_RECORDING_SUFFIX: &str = ".failed.cast";

/// Derive a version name from wall-clock time at minute granularity.
///
/// Two builds of one container started within the same minute map to the
/// same name; the second one then fails as a duplicate.
pub fn version_from_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%Y%m%d_%H%M").to_string()
}

pub fn validate_version(version: &str) -> Result<(), StoreError> {
    if version.is_empty() || version.len() > 64 {
        return Err(StoreError::InvalidVersion(
            "version must be 1-64 characters".to_owned(),
        ));
    }
    if version == "." || version == ".." {
        return Err(StoreError::InvalidVersion(format!(
            "'{version}' is not a valid version"
        )));
    }
    if !version
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(StoreError::InvalidVersion(
            "version must match [a-zA-Z0-9_.-]".to_owned(),
        ));
    }
    Ok(())
}

/// One version directory of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDir {
    path: PathBuf,
}

impl VersionDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn recording_path(&self) -> PathBuf {
        self.path.join(RECORDING_FILE)
    }

    #[inline]
    pub fn image_path(&self) -> PathBuf {
        self.path.join(IMAGE_FILE)
    }

    /// Sibling of the version directory where the recording of a failed
    /// build is kept, e.g. `<container>/v1.failed.cast`.
    pub fn failed_recording_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(FAILED_RECORDING_SUFFIX);
        self.path.with_file_name(name)
    }

    /// A version counts as built once its image file exists.
    pub fn is_built(&self) -> bool {
        self.image_path().is_file()
    }
}

/// The version subdirectories of a single container.
pub struct VersionSpace {
    name: String,
    container_path: PathBuf,
}

impl VersionSpace {
    pub fn new(name: impl Into<String>, container_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            container_path: container_path.into(),
        }
    }

    #[inline]
    pub fn container_path(&self) -> &Path {
        &self.container_path
    }

    pub fn allocate_or_locate(
        &self,
        version: &str,
        mkdir: bool,
    ) -> Result<(PathBuf, bool), StoreError> {
        validate_version(version)?;
        container_version_path(&self.container_path, version, mkdir)
    }

    /// Create a new version directory. Existing versions are never reused.
    pub fn allocate(&self, version: &str) -> Result<VersionDir, StoreError> {
        let (path, existed) = self.allocate_or_locate(version, true)?;
        if existed {
            return Err(StoreError::DuplicateVersion {
                name: self.name.clone(),
                version: version.to_owned(),
            });
        }
        Ok(VersionDir::new(path))
    }

    /// Locate an existing version directory without creating anything.
    pub fn locate(&self, version: &str) -> Result<VersionDir, StoreError> {
        let (path, existed) = self.allocate_or_locate(version, false)?;
        if !existed {
            return Err(StoreError::VersionNotFound {
                name: self.name.clone(),
                version: version.to_owned(),
            });
        }
        Ok(VersionDir::new(path))
    }

    /// Names of versions holding a finalized image, sorted.
    ///
    /// Partially built versions are skipped, as is anything that is not a
    /// directory.
    pub fn built_versions(&self) -> Result<Vec<String>, StoreError> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.container_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if VersionDir::new(entry.path()).is_built() {
                versions.push(name);
            }
        }
        versions.sort();
        Ok(versions)
    }
}
