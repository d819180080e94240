use super::{EXIT_FAILURE, EXIT_SUCCESS};
use neurobuilder_core::{CoreError, Engine, StoreLock};
use neurobuilder_runtime::{check_prereqs, format_missing};
use serde::Serialize;

pub fn run(engine: &Engine, json_output: bool) -> Result<u8, CoreError> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    check_tools(engine, &mut checks, &mut all_pass);

    let root = engine.layout().root();
    if root.is_dir() {
        checks.push(Check::pass(
            "env_root",
            &format!("Environment root {}", root.display()),
        ));
        check_registry(engine, &mut checks, &mut all_pass);
        check_lock(engine, &mut checks, &mut all_pass);
    } else {
        checks.push(Check::info(
            "env_root",
            &format!(
                "Environment root {} does not exist yet (created on first create)",
                root.display()
            ),
        ));
    }

    print_results(&checks, all_pass, json_output)
}

fn check_tools(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if engine.toolchain().is_mock() {
        checks.push(Check::info(
            "prereqs",
            "Mock backend selected, external tools not required",
        ));
        return;
    }
    let missing = check_prereqs(&engine.config().tool_settings());
    if missing.is_empty() {
        checks.push(Check::pass("prereqs", "Build engine and recorder found"));
    } else {
        *all_pass = false;
        checks.push(Check::fail("prereqs", &format_missing(&missing)));
    }
}

fn check_registry(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match engine.check_registry() {
        Ok(missing) if missing.is_empty() => {
            checks.push(Check::pass("registry", "Registry readable, all containers present"));
        }
        Ok(missing) => {
            for m in &missing {
                checks.push(Check::warn(
                    "registry",
                    &format!(
                        "Container '{}' is registered but {} is missing",
                        m.name,
                        m.path.display()
                    ),
                ));
            }
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("registry", &format!("Registry unusable: {e}")));
        }
    }
}

fn check_lock(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match StoreLock::try_acquire(&engine.layout().lock_file()) {
        Ok(Some(_)) => checks.push(Check::pass("lock", "Environment lock is free")),
        Ok(None) => checks.push(Check::warn(
            "lock",
            "Environment lock is held by another process",
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("lock", &format!("Cannot check lock: {e}")));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, CoreError> {
    if json_output {
        let report = serde_json::json!({
            "healthy": all_pass,
            "checks": checks,
        });
        println!("{}", super::json_pretty(&report)?);
    } else {
        println!("neurobuilder doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
