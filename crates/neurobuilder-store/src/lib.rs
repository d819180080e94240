//! On-disk state for neurobuilder: environment layout, container registry, and version directories.
//!
//! This crate provides the storage layer: `EnvLayout` resolves the environment
//! root and every path beneath it, `Registry` persists the name → container
//! directory mapping with atomic writes, and `VersionSpace` allocates and
//! locates the per-container version directories holding recordings and images.

pub mod layout;
pub mod registry;
pub mod versions;

pub use layout::{
    container_version_path, new_identifier, resolve_environment_root, BuildWorkspace, EnvLayout,
    APP_DIR_NAME,
};
pub use registry::{
    validate_container_name, Registry, RegistryRecord, ResolvedContainer, REGISTRY_VERSION,
};
pub use versions::{
    validate_version, version_from_time, VersionDir, VersionSpace, FAILED_RECORDING_SUFFIX,
    IMAGE_FILE, RECORDING_FILE,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` inside it is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("registry at {path} is corrupt: {reason}")]
    CorruptRegistry { path: PathBuf, reason: String },
    #[error("registry format version {found} is newer than supported version {supported}")]
    UnsupportedRegistryVersion { found: u32, supported: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid container name: {0}")]
    InvalidName(String),
    #[error("invalid version: {0}")]
    InvalidVersion(String),
    #[error("container '{name}' already has version '{version}'")]
    DuplicateVersion { name: String, version: String },
    #[error("container '{name}' has no version '{version}'")]
    VersionNotFound { name: String, version: String },
    #[error("no platform data directory; pass --env explicitly")]
    NoDataDir,
}
