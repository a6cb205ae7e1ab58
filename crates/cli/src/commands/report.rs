//! `aliquot report`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

use aliquot_e2e::report::{read_results, summary_line, RESULTS_FILE};
use aliquot_e2e::{TestResult, TestStatus, TestSuiteResult};

use crate::output::{print_error, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
    /// Results file written by the json reporter
    #[arg(long)]
    pub results: Option<PathBuf>,

    /// Show only failed and flaky tests
    #[arg(long)]
    pub failed_only: bool,
}

/// Test outcome for display
#[derive(Serialize, Clone, Debug)]
pub struct ResultRow {
    pub test: String,
    pub status: TestStatus,
    pub attempts: u32,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TestResult> for ResultRow {
    fn from(result: &TestResult) -> Self {
        Self {
            test: result.title.clone(),
            status: result.status,
            attempts: result.attempts,
            duration_ms: result.duration_ms,
            error: result.error.clone(),
        }
    }
}

impl TableDisplay for ResultRow {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Status", "Attempts", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            TestStatus::Passed => self.status.as_str().green(),
            TestStatus::Flaky => self.status.as_str().yellow(),
            TestStatus::Skipped => self.status.as_str().dimmed(),
            TestStatus::Failed | TestStatus::TimedOut => self.status.as_str().red(),
        };
        vec![
            self.test.clone(),
            status.to_string(),
            self.attempts.to_string(),
            format!("{:.1}s", self.duration_ms as f64 / 1000.0),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

pub fn rows(suite: &TestSuiteResult, failed_only: bool) -> Vec<ResultRow> {
    suite
        .results
        .iter()
        .filter(|r| !failed_only || r.status.is_failure() || r.status == TestStatus::Flaky)
        .map(ResultRow::from)
        .collect()
}

pub fn execute(args: ReportArgs, root: &Path, format: OutputFormat) -> Result<i32> {
    let path = args
        .results
        .unwrap_or_else(|| root.join("test-results").join(RESULTS_FILE));
    let suite = read_results(&path).with_context(|| {
        format!(
            "could not read {} (run with --reporter=json first)",
            path.display()
        )
    })?;

    print_list(&rows(&suite, args.failed_only), format);

    let summary = summary_line(&suite);
    if !suite.success() {
        print_error(&summary);
        return Ok(1);
    }
    if suite.flaky > 0 {
        print_warning(&summary);
    } else {
        print_success(&summary);
    }
    Ok(0)
}
