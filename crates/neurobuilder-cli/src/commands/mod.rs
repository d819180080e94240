pub mod completions;
pub mod create;
pub mod doctor;
pub mod list;
pub mod replay;
pub mod run;

use neurobuilder_core::{CoreError, ErrorKind};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INVALID_INPUT: u8 = 2;
pub const EXIT_UNKNOWN_PACKAGE_MANAGER: u8 = 3;
pub const EXIT_DUPLICATE_VERSION: u8 = 4;
pub const EXIT_VERSION_NOT_FOUND: u8 = 5;
pub const EXIT_CORRUPT_REGISTRY: u8 = 6;
pub const EXIT_TOOL_FAILURE: u8 = 7;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::InvalidInput => EXIT_INVALID_INPUT,
        ErrorKind::UnknownPackageManager => EXIT_UNKNOWN_PACKAGE_MANAGER,
        ErrorKind::DuplicateVersion => EXIT_DUPLICATE_VERSION,
        ErrorKind::VersionNotFound => EXIT_VERSION_NOT_FOUND,
        ErrorKind::CorruptRegistry => EXIT_CORRUPT_REGISTRY,
        ErrorKind::ExternalToolFailure => EXIT_TOOL_FAILURE,
        ErrorKind::Interrupted => EXIT_INTERRUPTED,
        ErrorKind::Other => EXIT_FAILURE,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| CoreError::Io(e.into()))
}

/// `==> stage` progress line on stderr, so stdout stays clean for `--json`.
pub fn print_step(label: &str, detail: &str) {
    use console::style;
    if detail.is_empty() {
        eprintln!("{} {label}", style("==>").cyan().bold());
    } else {
        eprintln!("{} {label} {}", style("==>").cyan().bold(), style(detail).dim());
    }
}

pub fn print_failure(label: &str, detail: &str) {
    use console::style;
    eprintln!("{} {label} {detail}", style("==>").red().bold());
}
