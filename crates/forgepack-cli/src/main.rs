mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_BUILD_ERROR, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use forgepack_core::{install_signal_handler, select_driver, Forge};
use forgepack_schema::{parse_config_file, RawInput};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "forgepack",
    version,
    about = "Bootstrap and drive forgepack build engines"
)]
struct Cli {
    /// Configuration file (TOML or JSON). Repeat to build several configurations together.
    #[arg(short, long = "config", default_value = "forgepack.toml", global = true)]
    config: Vec<PathBuf>,

    /// Build driver: `inspect` reports the build plan, `mock` simulates builds.
    #[arg(long, default_value = "inspect", global = true)]
    driver: String,

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
    /// Build once, or keep rebuilding if the configuration asks to watch.
    Build,
    /// Rebuild on every change until interrupted.
    Watch,
    /// Create the engines without building and show what they resolved to.
    Inspect,
    /// Check configuration files without creating any engine.
    Validate,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
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
            tracing_subscriber::EnvFilter::try_from_env("FORGEPACK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let result = match &cli.command {
        Commands::Completions { shell } => commands::completions::run::<Cli>(*shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(dir),
        Commands::Validate => load_input(&cli.config)
            .and_then(|input| commands::validate::run(&input, &base_dir(&cli.config), cli.json)),
        Commands::Build => forge(&cli).and_then(|(forge, input)| {
            commands::build::run(&forge, &input, cli.json)
        }),
        Commands::Watch => forge(&cli).and_then(|(forge, input)| {
            commands::watch::run(&forge, input, cli.json)
        }),
        Commands::Inspect => forge(&cli).and_then(|(forge, input)| {
            commands::inspect::run(&forge, &input, cli.json)
        }),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("configuration error:")
        || msg.starts_with("invalid configuration")
        || msg.starts_with("failed to parse configuration")
        || msg.starts_with("failed to read configuration")
    {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("build error:") || msg.starts_with("close error:") {
        EXIT_BUILD_ERROR
    } else {
        EXIT_FAILURE
    }
}

fn forge(cli: &Cli) -> Result<(Forge, RawInput), String> {
    let driver = select_driver(&cli.driver).map_err(|e| e.to_string())?;
    let input = load_input(&cli.config)?;
    Ok((Forge::new(driver).with_base_dir(base_dir(&cli.config)), input))
}

/// One file is taken as written. Several files are concatenated into one
/// multi-configuration input, in command-line order.
fn load_input(paths: &[PathBuf]) -> Result<RawInput, String> {
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        inputs.push(parse_config_file(path).map_err(|e| format!("{e} ({})", path.display()))?);
    }
    if inputs.len() == 1 {
        if let Some(input) = inputs.pop() {
            return Ok(input);
        }
    }
    Ok(RawInput::Multi(
        inputs
            .iter()
            .flat_map(|input| input.configs().iter().cloned())
            .collect(),
    ))
}

/// Relative `context` values resolve against the first configuration file's directory.
fn base_dir(paths: &[PathBuf]) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match paths.first().and_then(|p| p.parent()) {
        Some(parent) if parent != Path::new("") => cwd.join(parent),
        _ => cwd,
    }
}
