use crate::backend::ToolSettings;
use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the external tools the real backend shells out to.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_prereqs(settings: &ToolSettings) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(&settings.engine_binary) {
        missing.push(MissingPrereq {
            name: settings.engine_binary.clone(),
            purpose: "building sandboxes and SIF images",
            install_hint: "https://docs.sylabs.io/guides/latest/admin-guide/installation.html | apt install apptainer",
        });
    }

    if !command_exists(&settings.recorder_binary) {
        missing.push(MissingPrereq {
            name: settings.recorder_binary.clone(),
            purpose: "recording and replaying build sessions",
            install_hint: "pipx install asciinema | apt install asciinema | dnf install asciinema",
        });
    }

    if settings.sudo && !command_exists("sudo") {
        missing.push(MissingPrereq {
            name: "sudo".to_owned(),
            purpose: "privileged sandbox builds",
            install_hint: "apt install sudo | dnf install sudo, or set engine.sudo = false",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nneurobuilder drives these tools to build and record containers.");
    msg
}
