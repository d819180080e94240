//! CLI subprocess integration tests.
//!
//! These tests invoke the `neurobuilder` binary against a temporary
//! environment root with the mock backend and check exit codes, stdout, and
//! JSON output.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn neurobuilder_bin(env_root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_neurobuilder"));
    cmd.env("NEUROBUILDER_BACKEND", "mock")
        .env("NEUROBUILDER_SKIP_PREREQS", "1")
        .env_remove("NEUROBUILDER_ENV")
        .env_remove("NEUROBUILDER_LOG")
        .arg("--env")
        .arg(env_root);
    cmd
}

fn run(env_root: &Path, args: &[&str]) -> Output {
    neurobuilder_bin(env_root).args(args).output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn create(env_root: &Path, name: &str, version: &str) -> Output {
    run(env_root, &["create", name, "--version", version])
}

/// Write an executable shell script standing in for an external tool.
#[cfg(unix)]
fn write_tool(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Point the singularity backend at stand-in tools, without sudo.
#[cfg(unix)]
fn use_tools(env_root: &Path, engine: &Path, recorder: &Path) {
    let config = format!(
        "backend = \"singularity\"\n\n[engine]\nbinary = \"{}\"\nsudo = false\n\n[recorder]\nbinary = \"{}\"\n",
        engine.display(),
        recorder.display()
    );
    std::fs::write(env_root.join("config.toml"), config).unwrap();
}

#[cfg(unix)]
fn wait_for(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(Instant::now() < deadline, "{} never appeared", path.display());
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_neurobuilder"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("neurobuilder"));
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_neurobuilder"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let out = stdout(&output);
    for command in ["create", "run", "list", "replay"] {
        assert!(out.contains(command), "help must list '{command}': {out}");
    }
}

#[test]
fn create_then_list_prints_single_line() {
    let env = tempfile::tempdir().unwrap();

    let created = create(env.path(), "alpha", "20240101_0000");
    assert!(
        created.status.success(),
        "create must exit 0. stderr: {}",
        stderr(&created)
    );
    assert!(stdout(&created).contains("created alpha 20240101_0000"));

    let listed = run(env.path(), &["list"]);
    assert!(listed.status.success());
    assert_eq!(stdout(&listed), "alpha 20240101_0000\n");
}

#[test]
fn list_empty_environment_prints_nothing() {
    let env = tempfile::tempdir().unwrap();
    let listed = run(env.path(), &["list"]);
    assert!(listed.status.success());
    assert!(stdout(&listed).is_empty());
}

#[test]
fn duplicate_version_exits_4() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "alpha", "v1").status.success());

    let again = create(env.path(), "alpha", "v1");
    assert_eq!(again.status.code(), Some(4));
    let err = stderr(&again);
    assert!(err.contains("error:"), "{err}");
    assert!(err.contains("v1"), "{err}");
}

#[test]
fn replay_unknown_exits_5_without_creating_anything() {
    let env = tempfile::tempdir().unwrap();
    let root = env.path().join("fresh");

    let output = run(&root, &["replay", "alpha", "v1"]);
    assert_eq!(output.status.code(), Some(5));
    assert!(!root.exists());
}

#[test]
fn run_and_replay_built_version() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "alpha", "v1").status.success());

    let ran = run(env.path(), &["run", "alpha", "v1"]);
    assert!(ran.status.success(), "stderr: {}", stderr(&ran));
    assert!(stdout(&ran).contains("mock-run:"));

    let replayed = run(env.path(), &["replay", "alpha", "v1"]);
    assert!(replayed.status.success(), "stderr: {}", stderr(&replayed));
    assert!(stdout(&replayed).contains("mock-session:"));
}

#[test]
fn run_unknown_version_exits_5() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "alpha", "v1").status.success());
    assert_eq!(run(env.path(), &["run", "alpha", "v2"]).status.code(), Some(5));
}

#[test]
fn unknown_package_manager_exits_3() {
    let env = tempfile::tempdir().unwrap();
    let root = env.path().join("fresh");

    let output = run(&root, &["create", "alpha", "--base", "alpine:3"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("--pkg"));
    assert!(!root.join("registry.json").exists());
}

#[test]
fn explicit_package_manager_is_accepted() {
    let env = tempfile::tempdir().unwrap();
    let output = run(
        env.path(),
        &["create", "alpha", "--base", "alpine:3", "--pkg", "apt", "--version", "v1"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn invalid_name_exits_2() {
    let env = tempfile::tempdir().unwrap();
    let output = run(env.path(), &["create", "bad/name", "--version", "v1"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn corrupt_registry_exits_6() {
    let env = tempfile::tempdir().unwrap();
    std::fs::write(env.path().join("registry.json"), "garbage").unwrap();
    assert_eq!(run(env.path(), &["list"]).status.code(), Some(6));
}

#[test]
fn list_json_is_stable() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "beta", "v1").status.success());
    assert!(create(env.path(), "alpha", "v2").status.success());

    let output = run(env.path(), &["--json", "list"]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let entries = value.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "alpha");
    assert_eq!(entries[0]["version"], "v2");
    assert_eq!(entries[1]["name"], "beta");
    assert!(entries[1]["path"].as_str().unwrap().ends_with("v1"));
}

#[test]
fn create_json_reports_paths() {
    let env = tempfile::tempdir().unwrap();
    let output = run(env.path(), &["--json", "create", "alpha", "--version", "v1"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["name"], "alpha");
    assert_eq!(value["version"], "v1");
    assert_eq!(value["package_manager"], "apt");
    let image = value["image_path"].as_str().unwrap();
    assert!(Path::new(image).is_file());
}

#[test]
fn config_file_backend_is_used() {
    let env = tempfile::tempdir().unwrap();
    std::fs::write(env.path().join("config.toml"), "backend = \"mock\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_neurobuilder"))
        .env_remove("NEUROBUILDER_BACKEND")
        .env_remove("NEUROBUILDER_ENV")
        .arg("--env")
        .arg(env.path())
        .args(["create", "alpha", "--version", "v1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn unknown_backend_exits_2() {
    let env = tempfile::tempdir().unwrap();
    let output = neurobuilder_bin(env.path())
        .env("NEUROBUILDER_BACKEND", "docker")
        .arg("list")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn doctor_reports_health_as_json() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "alpha", "v1").status.success());

    let output = run(env.path(), &["--json", "doctor"]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["healthy"], true);
    assert!(value["checks"].as_array().unwrap().len() >= 3);
}

#[test]
fn completions_generate_script() {
    let output = Command::new(env!("CARGO_BIN_EXE_neurobuilder"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains("neurobuilder"));
}

#[cfg(unix)]
#[test]
fn repeated_interrupt_waits_for_running_tool() {
    let env = tempfile::tempdir().unwrap();
    assert!(create(env.path(), "alpha", "v1").status.success());

    let tools = tempfile::tempdir().unwrap();
    let started = tools.path().join("started");
    let finished = tools.path().join("finished");
    let engine = tools.path().join("engine");
    write_tool(
        &engine,
        &format!(
            "trap '' INT\ntouch '{}'\nsleep 2\ntouch '{}'\n",
            started.display(),
            finished.display()
        ),
    );
    use_tools(env.path(), &engine, &tools.path().join("recorder"));

    let mut child = neurobuilder_bin(env.path())
        .env_remove("NEUROBUILDER_BACKEND")
        .args(["run", "alpha", "v1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    wait_for(&started);

    for _ in 0..2 {
        let sent = Command::new("kill")
            .args(["-INT", &child.id().to_string()])
            .status()
            .unwrap();
        assert!(sent.success());
        thread::sleep(Duration::from_millis(100));
    }

    let status = child.wait().unwrap();
    assert!(
        finished.exists(),
        "neurobuilder exited while the tool was still running"
    );
    assert!(status.success(), "{status}");
}

#[cfg(unix)]
#[test]
fn json_create_keeps_tool_output_off_stdout() {
    let env = tempfile::tempdir().unwrap();
    let tools = tempfile::tempdir().unwrap();
    let engine = tools.path().join("engine");
    let recorder = tools.path().join("recorder");
    write_tool(
        &engine,
        "echo engine-noise\n\
         if [ \"$1\" = build ] && [ \"$2\" = --sandbox ]; then mkdir -p \"$3\"\n\
         elif [ \"$1\" = build ]; then touch \"$2\"\n\
         fi\n",
    );
    write_tool(
        &recorder,
        "echo recorder-noise\nfor last; do :; done\ntouch \"$last\"\n",
    );
    use_tools(env.path(), &engine, &recorder);

    let output = neurobuilder_bin(env.path())
        .env_remove("NEUROBUILDER_BACKEND")
        .args(["--json", "create", "alpha", "--version", "v1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["version"], "v1");
    assert!(Path::new(value["image_path"].as_str().unwrap()).is_file());
    let err = stderr(&output);
    assert!(err.contains("engine-noise"), "{err}");
    assert!(err.contains("recorder-noise"), "{err}");
}
