use crate::layout::{new_identifier, EnvLayout};
use crate::{fsync_dir, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Current registry schema version. Incremented on incompatible format changes.
pub const REGISTRY_VERSION: u32 = 1;

/// Persisted mapping from container name to container directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub version: u32,
    pub containers: BTreeMap<String, PathBuf>,
}

impl Default for RegistryRecord {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            containers: BTreeMap::new(),
        }
    }
}

/// Result of [`Registry::resolve_container_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContainer {
    pub path: PathBuf,
    /// True when this call allocated the container and wrote the registry.
    pub created: bool,
}

pub fn validate_container_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.len() > 64 {
        return Err(StoreError::InvalidName(
            "container name must be 1-64 characters".to_owned(),
        ));
    }
    if name.starts_with('.') {
        return Err(StoreError::InvalidName(
            "container name must not start with '.'".to_owned(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(StoreError::InvalidName(
            "container name must match [a-zA-Z0-9_.-]".to_owned(),
        ));
    }
    Ok(())
}

/// The environment's container registry, stored at `<root>/registry.json`.
///
/// Every mutation loads the whole record, changes it in memory, and replaces
/// the file atomically. Callers that mutate concurrently must serialize
/// through the store lock.
pub struct Registry {
    layout: EnvLayout,
}

impl Registry {
    pub fn new(layout: EnvLayout) -> Self {
        Self { layout }
    }

    pub fn load(&self) -> Result<RegistryRecord, StoreError> {
        match self.read()? {
            Some(record) => Ok(record),
            None => {
                fs::create_dir_all(self.layout.root())?;
                Ok(RegistryRecord::default())
            }
        }
    }

    /// Parse the registry file if there is one, without side effects.
    fn read(&self) -> Result<Option<RegistryRecord>, StoreError> {
        let path = self.layout.registry_file();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let record: RegistryRecord =
            serde_json::from_str(&content).map_err(|e| StoreError::CorruptRegistry {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if record.version > REGISTRY_VERSION {
            return Err(StoreError::UnsupportedRegistryVersion {
                found: record.version,
                supported: REGISTRY_VERSION,
            });
        }
        Ok(Some(record))
    }

    pub fn save(&self, record: &RegistryRecord) -> Result<(), StoreError> {
        let root = self.layout.root();
        fs::create_dir_all(root)?;

        let content = serde_json::to_string_pretty(record)?;
        let mut tmp = NamedTempFile::new_in(root)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.layout.registry_file())
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(root)?;

        debug!("registry saved ({} containers)", record.containers.len());
        Ok(())
    }

    /// Return the container directory for `name`, allocating one if needed.
    ///
    /// Existing names are returned unchanged without touching the registry
    /// file. New names get a fresh random directory under the root and the
    /// registry is rewritten once.
    pub fn resolve_container_path(&self, name: &str) -> Result<ResolvedContainer, StoreError> {
        validate_container_name(name)?;
        let mut record = self.load()?;

        if let Some(path) = record.containers.get(name) {
            if !path.is_dir() {
                warn!(
                    "container directory for '{name}' is missing, recreating {}",
                    path.display()
                );
                fs::create_dir_all(path)?;
            }
            return Ok(ResolvedContainer {
                path: path.clone(),
                created: false,
            });
        }

        let path = self.layout.container_dir(&new_identifier());
        fs::create_dir_all(&path)?;
        record.containers.insert(name.to_owned(), path.clone());
        self.save(&record)?;

        info!("registered container '{name}' at {}", path.display());
        Ok(ResolvedContainer {
            path,
            created: true,
        })
    }

    /// Read-only lookup. Never writes the registry or creates directories.
    pub fn lookup(&self, name: &str) -> Result<Option<PathBuf>, StoreError> {
        Ok(self
            .read()?
            .and_then(|record| record.containers.get(name).cloned()))
    }
}
