use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Package manager family of a base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Yum,
}

/// Substring of the base image name → package manager, checked in order.
const DETECTION_TABLE: &[(&str, PackageManager)] = &[
    ("ubuntu", PackageManager::Apt),
    ("debian", PackageManager::Apt),
    ("centos", PackageManager::Yum),
    ("fedora", PackageManager::Yum),
];

/// Whether a base image reference names `distro`, ignoring ASCII case.
pub(crate) fn base_mentions(base: &str, distro: &str) -> bool {
    base.to_ascii_lowercase().contains(distro)
}

impl PackageManager {
    /// Guess the package manager from a base image reference.
    pub fn detect(base: &str) -> Option<Self> {
        DETECTION_TABLE
            .iter()
            .find(|(needle, _)| base_mentions(base, needle))
            .map(|(_, pm)| *pm)
    }

    pub fn parse(name: &str) -> Result<Self, RuntimeError> {
        match name {
            "apt" => Ok(Self::Apt),
            "yum" => Ok(Self::Yum),
            other => Err(RuntimeError::UnsupportedPackageManager(other.to_owned())),
        }
    }

    /// An explicit choice wins; otherwise detect from `base` and refuse to guess.
    pub fn resolve(base: &str, explicit: Option<&str>) -> Result<Self, RuntimeError> {
        match explicit {
            Some(name) if !name.is_empty() => Self::parse(name),
            _ => Self::detect(base)
                .ok_or_else(|| RuntimeError::UnknownPackageManager(base.to_owned())),
        }
    }

    /// Index refresh command run at the end of `%post`.
    pub fn update_command(self) -> &'static str {
        match self {
            Self::Apt => "apt update -y",
            Self::Yum => "yum update -y",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Yum => write!(f, "yum"),
        }
    }
}
