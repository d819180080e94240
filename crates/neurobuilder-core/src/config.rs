use crate::CoreError;
use neurobuilder_runtime::template::DEFAULT_UBUNTU_MIRROR;
use neurobuilder_runtime::{TemplateOptions, ToolSettings};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Environment settings read from `<root>/config.toml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: String,
    pub engine: EngineSection,
    pub recorder: RecorderSection,
    pub template: TemplateSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub binary: String,
    pub sudo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderSection {
    pub binary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSection {
    /// Empty string keeps the base image's package sources.
    pub ubuntu_mirror: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "singularity".to_owned(),
            engine: EngineSection::default(),
            recorder: RecorderSection::default(),
            template: TemplateSection::default(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        let tools = ToolSettings::default();
        Self {
            binary: tools.engine_binary,
            sudo: tools.sudo,
        }
    }
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            binary: ToolSettings::default().recorder_binary,
        }
    }
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            ubuntu_mirror: DEFAULT_UBUNTU_MIRROR.to_owned(),
        }
    }
}

impl Config {
    /// Load the config file, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            engine_binary: self.engine.binary.clone(),
            sudo: self.engine.sudo,
            recorder_binary: self.recorder.binary.clone(),
            ..ToolSettings::default()
        }
    }

    pub fn template_options(&self) -> TemplateOptions {
        let mirror = self.template.ubuntu_mirror.trim();
        TemplateOptions {
            ubuntu_mirror: (!mirror.is_empty()).then(|| mirror.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backend, "singularity");
        assert_eq!(config.tool_settings(), ToolSettings::default());
        assert_eq!(config.template_options(), TemplateOptions::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse("backend = \"mock\"\n[engine]\nsudo = false\n").unwrap();
        assert_eq!(config.backend, "mock");
        assert!(!config.engine.sudo);
        assert_eq!(config.engine.binary, "singularity");
        assert_eq!(config.recorder.binary, "asciinema");
    }

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
backend = "singularity"

[engine]
binary = "apptainer"
sudo = true

[recorder]
binary = "/opt/bin/asciinema"

[template]
ubuntu_mirror = "mirror.example.org/ubuntu"
"#,
        )
        .unwrap();
        let tools = config.tool_settings();
        assert_eq!(tools.engine_binary, "apptainer");
        assert_eq!(tools.recorder_binary, "/opt/bin/asciinema");
        assert_eq!(
            config.template_options().ubuntu_mirror.as_deref(),
            Some("mirror.example.org/ubuntu")
        );
    }

    #[test]
    fn empty_mirror_disables_rewrite() {
        let config = Config::parse("[template]\nubuntu_mirror = \"\"\n").unwrap();
        assert_eq!(config.template_options().ubuntu_mirror, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("backnd = \"mock\"\n").is_err());
        assert!(Config::parse("[engine]\nbinry = \"x\"\n").is_err());
    }

    #[test]
    fn invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = [").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("config.toml"));
    }
}
