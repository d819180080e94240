use crate::CoreError;
use fs2::FileExt;
use neurobuilder_runtime::foreground_child_running;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exclusive advisory lock on the environment root, released on drop.
pub struct StoreLock {
    lock_file: File,
}

impl StoreLock {
    fn open(lock_path: &Path) -> Result<File, CoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?)
    }

    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = Self::open(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Lock(format!("{}: {e}", lock_path.display())))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = Self::open(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C asks the running build to stop at the next stage boundary;
/// a second one exits immediately, unless a foreground tool is still
/// running. The tool shares our terminal and gets the interrupt itself, and
/// we keep waiting for it.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        let repeated = SHUTDOWN_REQUESTED.swap(true, Ordering::SeqCst);
        if exit_on_interrupt(repeated, foreground_child_running()) {
            std::process::exit(130);
        }
        if repeated {
            eprintln!("\ninterrupt received, waiting for the running tool to exit...");
        } else {
            eprintln!("\ninterrupt received, stopping after the current step...");
        }
    });
}

fn exit_on_interrupt(repeated: bool, child_running: bool) -> bool {
    repeated && !child_running
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_exits_only_without_a_child() {
        assert!(!exit_on_interrupt(false, false));
        assert!(!exit_on_interrupt(false, true));
        assert!(!exit_on_interrupt(true, true));
        assert!(exit_on_interrupt(true, false));
    }

    #[test]
    fn lock_acquire_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("env").join(".lock");
        let _lock = StoreLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        let _lock = StoreLock::acquire(&lock_path).unwrap();
        assert!(StoreLock::try_acquire(&lock_path).unwrap().is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".lock");

        {
            let _lock = StoreLock::acquire(&lock_path).unwrap();
        }

        assert!(StoreLock::try_acquire(&lock_path).unwrap().is_some());
    }
}
