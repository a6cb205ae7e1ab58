//! Aliquot CLI - Main Entry Point
//!
//! Exit codes: 0 on success, 1 on failed tests, invalid arguments or a
//! failed environment check.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use aliquot_cli::commands::{check_env, list, report, run};
use aliquot_cli::output::{self, print_error};

/// Aliquot E2E - browser tests for the Aliquot web application
#[derive(Parser)]
#[command(name = "aliquot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root holding `.env` files and `crates/e2e/specs`
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suite through the e2e test harness
    Run(run::RunArgs),

    /// List available test specs
    List(list::ListArgs),

    /// Summarize the last JSON results
    Report(report::ReportArgs),

    /// Validate environment configuration and probe the base URL
    CheckEnv(check_env::CheckEnvArgs),
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.root),
        Commands::List(args) => list::execute(args, &cli.root, cli.format),
        Commands::Report(args) => report::execute(args, &cli.root, cli.format),
        Commands::CheckEnv(args) => check_env::execute(args, &cli.root, cli.format).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}
