//! E2E test harness entry point
//!
//! This file is the test binary that runs the Aliquot suite from YAML specs.
//! Run with: cargo test --package aliquot-e2e --test e2e -- --all
//!
//! Exit codes: 0 when nothing failed, 1 when a test failed, 2 for
//! configuration or setup errors (nothing was run).

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aliquot_e2e::filter::{selects_tests, SpecFilter};
use aliquot_e2e::preflight::{check_reachable, ProbeConfig};
use aliquot_e2e::{
    validate_environment, Browser, Category, E2eResult, PlaywrightConfig, PlaywrightLauncher,
    Reporter, RunnerConfig, TestRunner, TestSpec,
};

#[derive(Parser, Debug)]
#[command(name = "aliquot-e2e")]
#[command(about = "End-to-end tests for the Aliquot web application")]
struct Args {
    /// Path to test specs directory
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/specs"))]
    specs: PathBuf,

    /// Directory holding `.env` / `.env.<name>`
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/../.."))]
    root: PathBuf,

    /// Select every test
    #[arg(long)]
    all: bool,

    /// Run only these categories (repeatable)
    #[arg(long, value_parser = parse_category)]
    category: Vec<Category>,

    /// Run only tests whose title matches this regex
    #[arg(long)]
    grep: Option<String>,

    /// Skip tests whose title matches this regex
    #[arg(long)]
    grep_invert: Option<String>,

    /// Concurrent browser sessions
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Per-test timeout in milliseconds
    #[arg(long, default_value = "60000")]
    timeout: u64,

    /// Retries for a failing test
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Comma-separated reporters: list, line, json, html, allure
    #[arg(long, default_value = "list")]
    reporter: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Playwright inspector and debug logging
    #[arg(long)]
    debug: bool,

    /// Load `.env.<NAME>` instead of `.env`
    #[arg(long)]
    env: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Output directory for results
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-results"))]
    output: PathBuf,

    /// List matching tests without running them
    #[arg(long)]
    list: bool,

    /// Skip the base URL reachability probe
    #[arg(long)]
    no_preflight: bool,
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse().map_err(|e: aliquot_e2e::E2eError| e.to_string())
}

fn main() {
    // `cargo test` runs this harness too, with only its own filter and libtest flags
    if !selects_tests(std::env::args().skip(1)) {
        println!("aliquot-e2e: no tests selected (try `aliquot run --all` or pass `-- --all`)");
        return;
    }

    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> E2eResult<bool> {
    if args.all && !args.category.is_empty() {
        return Err(aliquot_e2e::E2eError::Config(
            "--all cannot be combined with --category".to_string(),
        ));
    }
    let filter = SpecFilter::new(args.category, args.grep.as_deref(), args.grep_invert.as_deref())?;

    if args.list {
        let specs = filter.apply(TestSpec::load_all(&args.specs)?);
        for spec in &specs {
            println!("{}", spec.title());
        }
        println!("Total: {} test(s)", specs.len());
        return Ok(true);
    }

    let env = validate_environment(&args.root, args.env.as_deref())?;
    let reporters = Reporter::parse_list(&args.reporter)?;
    let browser: Browser = args.browser.parse()?;

    if !args.no_preflight {
        check_reachable(&env.base_url, &ProbeConfig::default()).await?;
    }

    let launcher = PlaywrightLauncher::new(PlaywrightConfig {
        project_dir: args.root.clone(),
        browser,
        headless: !args.headed,
        debug: args.debug,
        ..Default::default()
    });
    launcher.verify().await?;

    let config = RunnerConfig {
        specs_dir: args.specs,
        output_dir: args.output,
        workers: args.workers,
        test_timeout: Duration::from_millis(args.timeout),
        retries: args.retries,
        reporters,
        filter,
        ..Default::default()
    };

    let runner = TestRunner::new(config, env, Arc::new(launcher))?;
    let suite = runner.run_all().await?;

    if suite.total == 0 {
        info!("No tests matched the selection");
    }
    Ok(suite.success())
}
