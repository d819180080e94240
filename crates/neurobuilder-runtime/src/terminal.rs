pub fn print_recording_banner(name: &str, version: &str) {
    if is_interactive_terminal() {
        eprintln!(
            "\x1b[1;36m[neurobuilder]\x1b[0m recording \x1b[1m{name}\x1b[0m version \x1b[1m{version}\x1b[0m; exit the shell to finish the build"
        );
    }
}

pub fn print_recording_exit(name: &str, version: &str) {
    if is_interactive_terminal() {
        eprintln!("\x1b[1;36m[neurobuilder]\x1b[0m session for {name} {version} ended");
    }
}

pub fn print_replay_banner(name: &str, version: &str) {
    if is_interactive_terminal() {
        eprintln!("\x1b[1;36m[neurobuilder]\x1b[0m replaying {name} {version}");
    }
}

#[allow(unsafe_code)]
pub fn is_interactive_terminal() -> bool {
    // SAFETY: isatty() only inspects the descriptor, no side effects.
    unsafe { libc::isatty(libc::STDERR_FILENO) != 0 }
}
