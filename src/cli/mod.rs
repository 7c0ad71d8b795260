//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod check;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use cynosure::config::Config;
use cynosure::error::CynoError;

#[derive(Parser)]
#[command(name = "cynosure")]
#[command(version)]
#[command(about = "Dependency-gated process supervisor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Supervise every configured process until interrupted
    Run {
        /// Config file (defaults to ~/.cyno/config)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Where to write the status snapshot (defaults to ~/.cyno/status.json)
        #[arg(long)]
        state_file: Option<PathBuf>,
    },
    /// Validate the config and resolve every requirement
    Check {
        /// Config file (defaults to ~/.cyno/config)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Also run each requirement check once and print the results
        #[arg(long)]
        live: bool,
    },
    /// Show the status snapshot written by `run`
    Status {
        /// Snapshot file (defaults to ~/.cyno/status.json)
        #[arg(long)]
        state_file: Option<PathBuf>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Run { config, .. } | Commands::Check { config, .. } => config.as_deref(),
            _ => None,
        }
    }
}

/// Load the config from `path`, or from the default location when `None`.
///
/// An explicit path must exist; a missing default file means an empty config.
pub(crate) fn load_config(path: Option<&Path>) -> cynosure::Result<Config> {
    match path {
        Some(path) if !path.exists() => Err(CynoError::Config(format!(
            "config file not found: {}",
            path.display()
        ))),
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Load config early so we can respect the logging settings; fall back to
    // defaults if the config file is missing or unreadable.
    let logging_cfg = load_config(cli.command.as_ref().and_then(Commands::config_path))
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = cynosure::utils::logging::init_logging(&logging_cfg) {
        eprintln!("Warning: {}", e);
    }

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Run { config, state_file }) => {
            run::cmd_run(config, state_file).await?;
        }
        Some(Commands::Check { config, live }) => {
            check::cmd_check(config, live).await?;
        }
        Some(Commands::Status { state_file, json }) => {
            status::cmd_status(state_file, json)?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("cynosure {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Dependency-gated process supervisor");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_config() {
        let cli = Cli::try_parse_from(["cynosure", "run", "--config", "/tmp/cyno.json5"]).unwrap();
        let command = cli.command.unwrap();
        assert_eq!(command.config_path(), Some(Path::new("/tmp/cyno.json5")));
    }

    #[test]
    fn test_parse_check_live() {
        let cli = Cli::try_parse_from(["cynosure", "check", "--live"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Check {
                config: None,
                live: true
            })
        ));
    }

    #[test]
    fn test_load_config_explicit_missing() {
        let err = load_config(Some(Path::new("/nonexistent/cyno/config"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
