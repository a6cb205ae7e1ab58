//! Result reporters
//!
//! `list` and `line` write to the log as tests finish; `json`, `html` and
//! `allure` write files under the output directory when the run ends.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::executor::StepStatus;
use crate::runner::{TestResult, TestStatus, TestSuiteResult};

pub const RESULTS_FILE: &str = "results.json";
pub const HTML_DIR: &str = "html-report";
pub const ALLURE_DIR: &str = "allure-results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reporter {
    List,
    Line,
    Json,
    Html,
    Allure,
}

impl Reporter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reporter::List => "list",
            Reporter::Line => "line",
            Reporter::Json => "json",
            Reporter::Html => "html",
            Reporter::Allure => "allure",
        }
    }

    /// Parse a comma-separated reporter list, dropping duplicates
    pub fn parse_list(value: &str) -> E2eResult<Vec<Reporter>> {
        let mut reporters = Vec::new();
        for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let reporter: Reporter = name.parse()?;
            if !reporters.contains(&reporter) {
                reporters.push(reporter);
            }
        }
        if reporters.is_empty() {
            return Err(E2eError::Config("--reporter needs at least one reporter".to_string()));
        }
        Ok(reporters)
    }

    /// Called as each test finishes
    pub fn on_test_end(&self, result: &TestResult) {
        if *self != Reporter::List {
            return;
        }
        let mark = match result.status {
            TestStatus::Passed => "✓",
            TestStatus::Flaky => "~",
            TestStatus::Skipped => "-",
            TestStatus::Failed | TestStatus::TimedOut => "✗",
        };
        match &result.error {
            Some(e) => error!("{} {} ({} ms) - {}", mark, result.title, result.duration_ms, e),
            None if result.status == TestStatus::Flaky => warn!(
                "{} {} ({} ms, passed on attempt {})",
                mark, result.title, result.duration_ms, result.attempts
            ),
            None => info!("{} {} ({} ms)", mark, result.title, result.duration_ms),
        }
        for warning in &result.warnings {
            warn!("    {}", warning);
        }
    }

    /// Called once after the run; returns the files written
    pub fn finish(&self, suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<Vec<PathBuf>> {
        match self {
            Reporter::List => Ok(vec![]),
            Reporter::Line => {
                info!("{}", summary_line(suite));
                Ok(vec![])
            }
            Reporter::Json => write_json(suite, output_dir).map(|p| vec![p]),
            Reporter::Html => write_html(suite, output_dir).map(|p| vec![p]),
            Reporter::Allure => write_allure(suite, output_dir),
        }
    }
}

impl fmt::Display for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reporter {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Reporter::List),
            "line" => Ok(Reporter::Line),
            "json" => Ok(Reporter::Json),
            "html" => Ok(Reporter::Html),
            "allure" => Ok(Reporter::Allure),
            other => Err(E2eError::Config(format!(
                "unknown reporter '{}' (expected list, line, json, html or allure)",
                other
            ))),
        }
    }
}

pub fn summary_line(suite: &TestSuiteResult) -> String {
    format!(
        "{} tests: {} passed, {} failed, {} flaky, {} skipped in {:.1}s",
        suite.total,
        suite.passed,
        suite.failed,
        suite.flaky,
        suite.skipped,
        suite.duration_ms as f64 / 1000.0
    )
}

/// Read a `results.json` written by the json reporter
pub fn read_results(path: &Path) -> E2eResult<TestSuiteResult> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json(suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<PathBuf> {
    let path = output_dir.join(RESULTS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(suite)?)?;
    info!("Results written to: {}", path.display());
    Ok(path)
}

fn write_html(suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<PathBuf> {
    let dir = output_dir.join(HTML_DIR);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("index.html");
    std::fs::write(&path, render_html(suite))?;
    info!("HTML report written to: {}", path.display());
    Ok(path)
}

fn render_html(suite: &TestSuiteResult) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Aliquot E2E Report</title>\n<style>\n");
    out.push_str("body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;width:100%}");
    out.push_str("td,th{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}");
    out.push_str(".passed{color:#1a7f37}.failed,.timed_out{color:#cf222e}.flaky{color:#9a6700}.skipped{color:#6e7781}");
    out.push_str("\n</style>\n</head>\n<body>\n<h1>Aliquot E2E Report</h1>\n");
    out.push_str(&format!("<p>{}</p>\n", escape(&summary_line(suite))));
    out.push_str("<table>\n<tr><th>Test</th><th>Status</th><th>Attempts</th><th>Duration (ms)</th><th>Details</th></tr>\n");

    for result in &suite.results {
        let status = result.status.as_str();
        out.push_str("<tr>");
        out.push_str(&format!("<td>{}</td>", escape(&result.title)));
        out.push_str(&format!("<td class=\"{0}\">{0}</td>", status));
        out.push_str(&format!("<td>{}</td>", result.attempts));
        out.push_str(&format!("<td>{}</td>", result.duration_ms));
        out.push_str("<td>");
        if let Some(error) = &result.error {
            out.push_str(&format!("<pre>{}</pre>", escape(error)));
        }
        if !result.steps.is_empty() {
            out.push_str("<ol>");
            for step in &result.steps {
                let class = match step.status {
                    StepStatus::Passed => "passed",
                    StepStatus::Failed => "failed",
                    StepStatus::Degraded => "flaky",
                };
                out.push_str(&format!(
                    "<li class=\"{}\">{} ({} ms)</li>",
                    class,
                    escape(&step.step_name),
                    step.duration_ms
                ));
            }
            out.push_str("</ol>");
        }
        for warning in &result.warnings {
            out.push_str(&format!("<div class=\"flaky\">{}</div>", escape(warning)));
        }
        for shot in &result.screenshots {
            if let Some(file) = shot.file_name() {
                let file = file.to_string_lossy();
                out.push_str(&format!(
                    "<div><a href=\"../screenshots/{0}\">{0}</a></div>",
                    escape(&file)
                ));
            }
        }
        out.push_str("</td></tr>\n");
    }

    out.push_str("</table>\n</body>\n</html>\n");
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllureResult {
    uuid: String,
    history_id: String,
    name: String,
    full_name: String,
    status: &'static str,
    status_details: AllureStatusDetails,
    stage: &'static str,
    start: i64,
    stop: i64,
    labels: Vec<AllureLabel>,
    steps: Vec<AllureStep>,
    attachments: Vec<AllureAttachment>,
}

#[derive(Debug, Serialize)]
struct AllureStatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    flaky: bool,
}

#[derive(Debug, Serialize)]
struct AllureLabel {
    name: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct AllureStep {
    name: String,
    status: &'static str,
    stage: &'static str,
    start: i64,
    stop: i64,
}

#[derive(Debug, Serialize)]
struct AllureAttachment {
    name: String,
    source: String,
    #[serde(rename = "type")]
    mime: &'static str,
}

fn allure_status(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Passed | TestStatus::Flaky => "passed",
        TestStatus::Failed => "failed",
        TestStatus::TimedOut => "broken",
        TestStatus::Skipped => "skipped",
    }
}

fn allure_result(result: &TestResult, attachments: Vec<AllureAttachment>) -> AllureResult {
    let mut labels = vec![
        AllureLabel {
            name: "suite",
            value: result.category.to_string(),
        },
        AllureLabel {
            name: "framework",
            value: "aliquot-e2e".to_string(),
        },
    ];
    labels.extend(result.tags.iter().map(|t| AllureLabel {
        name: "tag",
        value: t.clone(),
    }));

    let steps = result
        .steps
        .iter()
        .map(|s| AllureStep {
            name: s.step_name.clone(),
            status: match s.status {
                StepStatus::Passed | StepStatus::Degraded => "passed",
                StepStatus::Failed => "failed",
            },
            stage: "finished",
            start: s.started_ms,
            stop: s.started_ms + s.duration_ms as i64,
        })
        .collect();

    AllureResult {
        uuid: uuid::Uuid::new_v4().to_string(),
        history_id: format!("{}:{}", result.category, result.name),
        name: result.name.clone(),
        full_name: result.title.clone(),
        status: allure_status(result.status),
        status_details: AllureStatusDetails {
            message: result.error.clone(),
            flaky: result.status == TestStatus::Flaky,
        },
        stage: "finished",
        start: result.started_ms,
        stop: result.started_ms + result.duration_ms as i64,
        labels,
        steps,
        attachments,
    }
}

fn write_allure(suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<Vec<PathBuf>> {
    let dir = output_dir.join(ALLURE_DIR);
    std::fs::create_dir_all(&dir)?;

    let mut written = Vec::with_capacity(suite.results.len());
    for result in &suite.results {
        let mut attachments = Vec::new();
        for shot in &result.screenshots {
            let source = format!("{}-attachment.png", uuid::Uuid::new_v4());
            match std::fs::copy(shot, dir.join(&source)) {
                Ok(_) => attachments.push(AllureAttachment {
                    name: shot
                        .file_name()
                        .map(|f| f.to_string_lossy().to_string())
                        .unwrap_or_else(|| "screenshot".to_string()),
                    source,
                    mime: "image/png",
                }),
                Err(e) => warn!("Could not attach {}: {}", shot.display(), e),
            }
        }

        let allure = allure_result(result, attachments);
        let path = dir.join(format!("{}-result.json", allure.uuid));
        std::fs::write(&path, serde_json::to_string_pretty(&allure)?)?;
        written.push(path);
    }

    info!("Allure results written to: {}", dir.display());
    Ok(written)
}
