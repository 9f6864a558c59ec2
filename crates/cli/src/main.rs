//! Manus E2E CLI - Main Entry Point
//!
//! Runs the built-in scenario catalogue against a browser (W3C WebDriver) or
//! the in-process demo application, prints the resolved environment profile,
//! and lists the available scenarios.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{env, list, run};

/// Exit status when every scenario passed.
const EXIT_PASSED: u8 = 0;
/// Exit status when at least one scenario failed.
const EXIT_FAILURES: u8 = 1;
/// Exit status when the harness itself could not run.
const EXIT_HARNESS_ERROR: u8 = 2;

/// Manus E2E - environment-aware browser test harness
#[derive(Parser)]
#[command(name = "manus-e2e")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file (YAML)
    #[arg(short, long, env = "MANUS_E2E_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Log format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and write reports
    Run(run::RunArgs),

    /// Print the resolved environment profile
    Env(env::EnvArgs),

    /// List the built-in scenarios
    List(list::ListArgs),
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, cli.config.as_deref(), cli.format).await,
        Commands::Env(args) => env::execute(args, cli.config.as_deref(), cli.format),
        Commands::List(args) => list::execute(args, cli.format),
    };

    match result {
        Ok(true) => ExitCode::from(EXIT_PASSED),
        Ok(false) => ExitCode::from(EXIT_FAILURES),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_HARNESS_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "manus-e2e",
            "--log-format",
            "json",
            "run",
            "--driver",
            "demo",
            "--suite",
            "dashboard",
            "--ci",
            "--no-server",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
        match cli.command {
            Commands::Run(args) => {
                assert!(matches!(args.driver, run::DriverKind::Demo));
                assert_eq!(args.suite.as_deref(), Some("dashboard"));
                assert!(args.ci);
                assert!(args.no_server);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn unknown_browser_is_rejected() {
        assert!(Cli::try_parse_from(["manus-e2e", "run", "--browser", "safari"]).is_err());
    }
}
