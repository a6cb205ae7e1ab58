//! `aliquot run`
//!
//! Turns runner flags into a `cargo test` invocation of the `e2e` harness,
//! runs it and maps its result to an exit code.

use anyhow::{Context, Result};
use clap::{Args, Command as ClapCommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use aliquot_e2e::config::env_file_path;
use aliquot_e2e::{validate_environment, Category, Reporter};

use crate::output::{print_error, print_info};

/// Crate and test target the runner shells out to
pub const E2E_PACKAGE: &str = "aliquot-e2e";
pub const E2E_TEST: &str = "e2e";

/// Spec directory, relative to the project root
pub const SPECS_DIR: &str = "crates/e2e/specs";

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Open the Playwright inspector and log at debug level
    #[arg(long)]
    pub debug: bool,

    /// Concurrent browser sessions
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-test timeout in milliseconds
    #[arg(long, value_name = "N")]
    pub timeout: Option<u64>,

    /// Retries for a failing test
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Comma-separated reporters: list, line, json, html, allure
    #[arg(long, value_name = "LIST")]
    pub reporter: Option<String>,

    /// Load `.env.<NAME>` instead of `.env`
    #[arg(long, value_name = "NAME")]
    pub env: Option<String>,

    /// Run only tests whose title matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Print the test command without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Run every test
    #[arg(long, conflicts_with_all = ["auth", "dashboard", "reports", "customers", "inventory", "site_management", "utilities"])]
    pub all: bool,

    /// Run tests tagged @smoke
    #[arg(long, conflicts_with = "grep")]
    pub smoke: bool,

    /// Login and session tests
    #[arg(long)]
    pub auth: bool,

    #[arg(long)]
    pub dashboard: bool,

    #[arg(long)]
    pub reports: bool,

    #[arg(long)]
    pub customers: bool,

    #[arg(long)]
    pub inventory: bool,

    #[arg(long)]
    pub site_management: bool,

    #[arg(long)]
    pub utilities: bool,
}

impl RunArgs {
    /// Categories selected by flag, in a fixed order
    pub fn categories(&self) -> Vec<Category> {
        let flags = [
            (self.auth, Category::Auth),
            (self.dashboard, Category::Dashboard),
            (self.reports, Category::Reports),
            (self.customers, Category::Customers),
            (self.inventory, Category::Inventory),
            (self.site_management, Category::SiteManagement),
            (self.utilities, Category::Utilities),
        ];
        flags.into_iter().filter(|(on, _)| *on).map(|(_, c)| c).collect()
    }

    /// At least one of `--all`, `--smoke`, a category flag or `--grep`
    pub fn has_selection(&self) -> bool {
        self.all || self.smoke || self.grep.is_some() || !self.categories().is_empty()
    }

    fn grep_pattern(&self) -> Option<String> {
        if self.smoke {
            Some("@smoke".to_string())
        } else {
            self.grep.clone()
        }
    }
}

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TestCommand {
    /// Shell-style rendering for logs and `--dry-run`
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self, root: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(root);
        command
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=./,:@+".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Build the harness invocation; each provided flag appears exactly once
pub fn build_command(args: &RunArgs, reporters: Option<&[Reporter]>, root: &Path) -> TestCommand {
    let mut argv: Vec<String> = vec![
        "test".into(),
        "--package".into(),
        E2E_PACKAGE.into(),
        "--test".into(),
        E2E_TEST.into(),
        "--".into(),
        format!("--root={}", root.display()),
        format!("--specs={}", root.join(SPECS_DIR).display()),
        format!("--output={}", root.join("test-results").display()),
    ];

    if args.all {
        argv.push("--all".into());
    }
    for category in args.categories() {
        argv.push(format!("--category={}", category));
    }
    if let Some(pattern) = args.grep_pattern() {
        argv.push(format!("--grep={}", pattern));
    }
    if args.headed {
        argv.push("--headed".into());
    }
    if args.debug {
        argv.push("--debug".into());
    }
    if let Some(workers) = args.workers {
        argv.push(format!("--workers={}", workers));
    }
    if let Some(timeout) = args.timeout {
        argv.push(format!("--timeout={}", timeout));
    }
    if let Some(retries) = args.retries {
        argv.push(format!("--retries={}", retries));
    }
    if let Some(reporters) = reporters {
        let names: Vec<&str> = reporters.iter().map(Reporter::as_str).collect();
        argv.push(format!("--reporter={}", names.join(",")));
    }
    if let Some(env) = &args.env {
        argv.push(format!("--env={}", env));
    }

    TestCommand {
        program: "cargo".into(),
        args: argv,
    }
}

/// Checks that must pass before any browser starts
fn validate(args: &RunArgs, root: &Path) -> Result<Option<Vec<Reporter>>> {
    if args.workers == Some(0) {
        anyhow::bail!("--workers must be at least 1");
    }

    let reporters = args
        .reporter
        .as_deref()
        .map(Reporter::parse_list)
        .transpose()?;

    let specs: PathBuf = root.join(SPECS_DIR);
    if !specs.is_dir() {
        anyhow::bail!("spec directory not found: {}", specs.display());
    }

    validate_environment(root, args.env.as_deref()).with_context(|| {
        format!(
            "environment check failed (expected {})",
            env_file_path(root, args.env.as_deref()).display()
        )
    })?;

    Ok(reporters)
}

fn print_usage() {
    let mut help = RunArgs::augment_args(
        ClapCommand::new("aliquot run")
            .about("Run the Aliquot end-to-end suite")
            .after_help("Select tests with --all, --smoke, a category flag or --grep."),
    );
    // Printing help only fails when stdout is gone
    let _ = help.print_help();
    println!();
}

pub fn execute(args: RunArgs, root: &Path) -> Result<i32> {
    if !args.has_selection() {
        print_usage();
        return Ok(1);
    }

    let reporters = validate(&args, root)?;
    let command = build_command(&args, reporters.as_deref(), root);

    if args.dry_run {
        println!("{}", command.command_line());
        return Ok(0);
    }

    print_info(&format!("Running: {}", command.command_line().bold()));
    debug!("working directory: {}", root.display());

    let status = command
        .to_command(root)
        .status()
        .with_context(|| format!("failed to start '{}'", command.program))?;

    if status.success() {
        Ok(0)
    } else {
        print_error(&format!("E2E run failed ({})", status));
        Ok(1)
    }
}
