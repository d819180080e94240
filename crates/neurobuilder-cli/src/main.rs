mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{exit_code, EXIT_TOOL_FAILURE};
use neurobuilder_core::{
    install_signal_handler, BuildOptions, BuildRequest, Config, CoreError, Engine,
};
use neurobuilder_runtime::{check_prereqs, format_missing, select_toolchain, ChildStdout};
use neurobuilder_store::{resolve_environment_root, EnvLayout};
use std::process::ExitCode;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "neurobuilder",
    version,
    about = "Build, version and replay containers through recorded interactive sessions"
)]
struct Cli {
    /// Environment root holding the registry and containers
    /// (defaults to the platform data directory).
    #[arg(long, env = "NEUROBUILDER_ENV", default_value = "", global = true)]
    env: String,

    /// Tool backend: singularity or mock (overrides config.toml).
    #[arg(long, env = "NEUROBUILDER_BACKEND", global = true)]
    backend: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a new container version through a recorded interactive session.
    Create {
        /// Container name.
        name: String,
        /// Base image reference passed to the build engine.
        #[arg(long, default_value = "ubuntu:22.04")]
        base: String,
        /// Package manager of the base image (apt or yum); detected when omitted.
        #[arg(long = "pkg")]
        package_manager: Option<String>,
        /// Version name; defaults to the current time as YYYYMMDD_HHMM.
        #[arg(long)]
        version: Option<String>,
        /// Keep the workspace and version directory if the build fails.
        #[arg(long, default_value_t = false)]
        keep_failed: bool,
    },
    /// Run the image of a built version.
    Run {
        /// Container name.
        name: String,
        /// Version name.
        version: String,
    },
    /// List every built container version.
    List,
    /// Replay the recorded build session of a version.
    Replay {
        /// Container name.
        name: String,
        /// Version name.
        version: String,
    },
    /// Check external tools and environment health.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Commands {
    fn needs_tools(&self) -> bool {
        matches!(
            self,
            Commands::Create { .. } | Commands::Run { .. } | Commands::Replay { .. }
        )
    }
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NEUROBUILDER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    if let Commands::Completions { shell } = cli.command {
        return ExitCode::from(commands::completions::run::<Cli>(shell));
    }

    install_signal_handler();

    match dispatch(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

fn open_engine(cli: &Cli) -> Result<Engine, CoreError> {
    let root = resolve_environment_root(&cli.env)?;
    debug!("environment root: {}", root.display());
    let mut config = Config::load(&EnvLayout::new(&root).config_file())?;
    if let Some(backend) = cli.backend.as_deref().filter(|b| !b.is_empty()) {
        config.backend = backend.to_owned();
    }
    let mut tools = config.tool_settings();
    if cli.json {
        // Keep stdout for the JSON document.
        tools.child_stdout = ChildStdout::Stderr;
    }
    let toolchain = select_toolchain(&config.backend, &tools)?;
    Ok(Engine::with_toolchain(root, config, toolchain))
}

fn dispatch(cli: Cli) -> Result<u8, CoreError> {
    let engine = open_engine(&cli)?;
    let json_output = cli.json;

    if cli.command.needs_tools()
        && !engine.toolchain().is_mock()
        && std::env::var("NEUROBUILDER_SKIP_PREREQS").as_deref() != Ok("1")
    {
        let missing = check_prereqs(&engine.config().tool_settings());
        if !missing.is_empty() {
            eprintln!("error: {}", format_missing(&missing));
            return Ok(EXIT_TOOL_FAILURE);
        }
    }

    match cli.command {
        Commands::Create {
            name,
            base,
            package_manager,
            version,
            keep_failed,
        } => commands::create::run(
            &engine,
            &BuildRequest {
                name,
                base,
                version,
                package_manager,
            },
            BuildOptions { keep_failed },
            json_output,
        ),
        Commands::Run { name, version } => commands::run::run(&engine, &name, &version),
        Commands::List => commands::list::run(&engine, json_output),
        Commands::Replay { name, version } => commands::replay::run(&engine, &name, &version),
        Commands::Doctor => commands::doctor::run(&engine, json_output),
        Commands::Completions { shell } => Ok(commands::completions::run::<Cli>(shell)),
    }
}
