use crate::RuntimeError;
use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Where a tool's standard output goes. Stdin and stderr are always
/// inherited so interactive sessions keep the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildStdout {
    #[default]
    Inherit,
    /// Send it to our stderr, keeping stdout free for machine-readable output.
    Stderr,
}

static FOREGROUND_CHILDREN: AtomicUsize = AtomicUsize::new(0);

/// Counts a tool as running in the foreground for as long as it is alive.
struct ForegroundChild;

impl ForegroundChild {
    fn enter() -> Self {
        FOREGROUND_CHILDREN.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for ForegroundChild {
    fn drop(&mut self) {
        FOREGROUND_CHILDREN.fetch_sub(1, Ordering::SeqCst);
    }
}

/// True while a tool started through this crate is still running.
pub fn foreground_child_running() -> bool {
    FOREGROUND_CHILDREN.load(Ordering::SeqCst) > 0
}

/// Quote a word for a POSIX shell, leaving plain words untouched.
pub(crate) fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=@+,".contains(&b));
    if plain {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

pub(crate) fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `argv` in the foreground and wait for it.
///
/// `tool` names the collaborator in errors. Only a zero exit status counts
/// as success.
pub(crate) fn run_tool(
    tool: &str,
    argv: &[String],
    stdout: ChildStdout,
) -> Result<(), RuntimeError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(RuntimeError::ToolFailed {
            tool: tool.to_owned(),
            status: "empty command line".to_owned(),
        });
    };
    debug!("run_tool: {}", shell_join(argv));

    let mut command = Command::new(program);
    command.args(args);
    if stdout == ChildStdout::Stderr {
        command.stdout(Stdio::from(std::io::stderr()));
    }

    let _foreground = ForegroundChild::enter();
    let status = command.status().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            RuntimeError::ToolNotFound {
                tool: program.clone(),
                source: e,
            }
        } else {
            RuntimeError::Io(e)
        }
    })?;

    if !status.success() {
        return Err(RuntimeError::ToolFailed {
            tool: tool.to_owned(),
            status: status.to_string(),
        });
    }
    Ok(())
}
