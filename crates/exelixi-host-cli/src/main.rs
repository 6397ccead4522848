//! exelixi CLI
//!
//! Inspect the OpenCL platforms of this machine and load precompiled FPGA
//! kernel binaries onto them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use exelixi_host::driver::ClDriver;
use exelixi_host::sim::SimDriver;
use exelixi_host::{FatalError, HostConfig, set_cwd_to_exec_dir};
use tracing::error;

mod commands;
mod exit;

use commands::LoadCommand;
use exit::{EXIT_GENERIC_FAIL, EXIT_SUCCESS};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "exelixi.toml";

/// exelixi - OpenCL/AOCL host toolkit
#[derive(Parser)]
#[command(name = "exelixi")]
#[command(about = "Inspect OpenCL platforms and load precompiled FPGA kernel binaries")]
#[command(long_about = r#"
Inspect OpenCL platforms and load precompiled FPGA kernel binaries.

Examples:
  # List every platform and device with their attributes
  exelixi info

  # Find the first platform whose name contains "fpga"
  exelixi find fpga

  # Load device.aocx onto the first Intel(R) FPGA board
  exelixi load --binary device.aocx --platform "Intel(R) FPGA"

  # Name an OpenCL status code
  exelixi translate -8888
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    /// Use the simulated driver instead of the OpenCL runtime
    #[arg(long, global = true)]
    simulate: bool,

    /// Change to the executable's directory before resolving relative paths
    #[arg(long, global = true)]
    chdir_exe: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every platform and device
    #[command(alias = "clinfo")]
    Info,
    /// Print the first platform whose name contains SEARCH (case-insensitive)
    Find {
        /// Substring of the platform name
        search: String,
    },
    /// Build a program from a precompiled binary
    Load(LoadCommand),
    /// Print the symbolic name of an OpenCL status code
    Translate {
        /// Status code, decimal or 0x-prefixed hexadecimal
        #[arg(allow_hyphen_values = true, allow_negative_numbers = true)]
        code: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.log_level.as_deref(), cli.log_format) {
        eprintln!("failed to initialise logging: {e}");
    }

    let outcome = prepare(&cli).map(|config| {
        let simulate = cli.simulate || config.simulate;
        dispatch(&cli.command, &config, simulate)
    });

    match outcome {
        Ok(Ok(EXIT_SUCCESS)) => {}
        Ok(Ok(code)) => std::process::exit(code),
        Ok(Err(fatal)) => fatal.exit(),
        Err(e) => {
            error!("Command failed: {}", e);
            let mut source = e.source();
            while let Some(err) = source {
                error!("  Caused by: {}", err);
                source = err.source();
            }
            std::process::exit(EXIT_GENERIC_FAIL);
        }
    }
}

/// Resolve the working directory and the configuration.
fn prepare(cli: &Cli) -> Result<HostConfig> {
    if cli.chdir_exe {
        set_cwd_to_exec_dir().context("failed to change to the executable directory")?;
    }
    load_configuration(cli.config.as_deref())
}

fn load_configuration(path: Option<&Path>) -> Result<HostConfig> {
    match path {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            HostConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("failed to load configuration from {DEFAULT_CONFIG_FILE}"))
        }
        None => HostConfig::from_env().context("invalid configuration in environment"),
    }
}

fn dispatch(command: &Commands, config: &HostConfig, simulate: bool) -> Result<i32, FatalError> {
    #[cfg(feature = "opencl")]
    if !simulate {
        return run(&exelixi_host::driver::opencl::OpenClDriver::new(), command, config);
    }
    #[cfg(not(feature = "opencl"))]
    if !simulate {
        tracing::warn!("built without the `opencl` feature; using the simulated driver");
    }
    run(&SimDriver::reference(), command, config)
}

fn run<D: ClDriver>(
    driver: &D,
    command: &Commands,
    config: &HostConfig,
) -> Result<i32, FatalError> {
    match command {
        Commands::Info => commands::info(driver),
        Commands::Find { search } => commands::find(driver, search),
        Commands::Load(cmd) => cmd.execute(driver, config),
        Commands::Translate { code } => commands::translate(code),
    }
}

/// Setup logging based on configuration. Logs go to stderr so reports on
/// stdout stay machine-readable.
fn setup_logging(log_level: Option<&str>, format: LogFormat) -> Result<()> {
    let level = log_level.unwrap_or("warn");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => subscriber
            .json()
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .try_init(),
        LogFormat::Compact => subscriber.compact().try_init(),
        LogFormat::Pretty => subscriber.pretty().try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}
