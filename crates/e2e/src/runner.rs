//! Test runner: worker pool, retries and per-test timeouts

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::browser::SessionFactory;
use crate::config::EnvConfig;
use crate::error::{E2eError, E2eResult};
use crate::executor::{SpecExecutor, SpecRun, StepResult};
use crate::filter::SpecFilter;
use crate::report::Reporter;
use crate::screenshots::ScreenshotStore;
use crate::session::{LoginOutcome, StabilizationPolicy};
use crate::spec::{Category, TestSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Passed after at least one failed attempt
    Flaky,
    TimedOut,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Flaky => "flaky",
            TestStatus::TimedOut => "timed_out",
            TestStatus::Skipped => "skipped",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::TimedOut)
    }
}

/// Result of running a single test (its last attempt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub title: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: TestStatus,
    pub attempts: u32,
    /// Wall-clock start, milliseconds since the Unix epoch
    pub started_ms: i64,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
    #[serde(default)]
    pub login: Option<LoginOutcome>,
}

impl TestResult {
    fn without_run(spec: &TestSpec, status: TestStatus, attempts: u32) -> Self {
        Self {
            name: spec.name.clone(),
            title: spec.title(),
            category: spec.category,
            tags: spec.tags.clone(),
            status,
            attempts,
            started_ms: Utc::now().timestamp_millis(),
            duration_ms: 0,
            steps: vec![],
            error: None,
            warnings: vec![],
            screenshots: vec![],
            login: None,
        }
    }

    fn skipped(spec: &TestSpec, reason: &str) -> Self {
        Self {
            warnings: vec![format!("skipped: {}", reason)],
            ..Self::without_run(spec, TestStatus::Skipped, 0)
        }
    }

    /// The task running `spec` died before producing a result
    fn crashed(spec: &TestSpec, error: JoinError) -> Self {
        let reason = if error.is_panic() {
            panic_message(error.into_panic())
        } else {
            error.to_string()
        };
        Self {
            error: Some(format!("test task panicked: {}", reason)),
            ..Self::without_run(spec, TestStatus::Failed, 1)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub flaky: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(results: Vec<TestResult>, duration_ms: u64) -> Self {
        let count = |f: fn(&TestStatus) -> bool| results.iter().filter(|r| f(&r.status)).count();
        Self {
            total: results.len(),
            passed: count(|s| *s == TestStatus::Passed),
            failed: count(TestStatus::is_failure),
            flaky: count(|s| *s == TestStatus::Flaky),
            skipped: count(|s| *s == TestStatus::Skipped),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Concurrent browser sessions
    pub workers: usize,
    pub test_timeout: Duration,
    pub retries: u32,
    pub reporters: Vec<Reporter>,
    pub filter: SpecFilter,
    pub policy: StabilizationPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("crates/e2e/specs"),
            output_dir: PathBuf::from("test-results"),
            workers: 1,
            test_timeout: Duration::from_secs(60),
            retries: 0,
            reporters: vec![Reporter::List],
            filter: SpecFilter::default(),
            policy: StabilizationPolicy::default(),
        }
    }
}

impl RunnerConfig {
    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

/// State shared by every worker task
struct Worker {
    env: EnvConfig,
    sessions: Arc<dyn SessionFactory>,
    screenshots: ScreenshotStore,
    policy: StabilizationPolicy,
    test_timeout: Duration,
    retries: u32,
}

enum Attempt {
    Finished(SpecRun),
    TimedOut(Option<PathBuf>),
    NoSession(E2eError),
}

impl Worker {
    async fn run_spec(&self, spec: &TestSpec) -> TestResult {
        if let Some(reason) = &spec.skip {
            return TestResult::skipped(spec, reason);
        }

        let retries = spec.retries.unwrap_or(self.retries);
        let timeout = spec
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.test_timeout);
        let started_ms = Utc::now().timestamp_millis();
        let start = Instant::now();

        let mut attempts = 0;
        let (status, run, error, timeout_shot) = loop {
            attempts += 1;
            debug!("Running test: {} (attempt {})", spec.name, attempts);

            let (status, run, error, timeout_shot) = match self.attempt(spec, timeout).await {
                Attempt::Finished(run) if run.passed() => {
                    let status = if attempts > 1 { TestStatus::Flaky } else { TestStatus::Passed };
                    (status, run, None, None)
                }
                Attempt::Finished(run) => {
                    let error = run.error.clone();
                    (TestStatus::Failed, run, error, None)
                }
                Attempt::TimedOut(screenshot) => {
                    let error = format!("test exceeded its {} ms timeout", timeout.as_millis());
                    (TestStatus::TimedOut, SpecRun::default(), Some(error), screenshot)
                }
                Attempt::NoSession(e) => (TestStatus::Failed, SpecRun::default(), Some(e.to_string()), None),
            };

            if !status.is_failure() || attempts > retries {
                break (status, run, error, timeout_shot);
            }
            warn!(
                "{} failed on attempt {}/{}, retrying: {}",
                spec.name,
                attempts,
                retries + 1,
                error.as_deref().unwrap_or("unknown error")
            );
        };

        let mut screenshots: Vec<PathBuf> = run.screenshots().cloned().collect();
        screenshots.extend(timeout_shot);

        TestResult {
            name: spec.name.clone(),
            title: spec.title(),
            category: spec.category,
            tags: spec.tags.clone(),
            status,
            attempts,
            started_ms,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: run.steps,
            error,
            warnings: run.warnings,
            screenshots,
            login: run.login,
        }
    }

    /// One attempt in a fresh browser session
    async fn attempt(&self, spec: &TestSpec, timeout: Duration) -> Attempt {
        let page = match self.sessions.open(&spec.viewport).await {
            Ok(page) => page,
            Err(e) => return Attempt::NoSession(e),
        };

        let executor = SpecExecutor::new(page.as_ref(), &self.env, &self.screenshots, &self.policy);
        let attempt = match tokio::time::timeout(timeout, executor.run(spec)).await {
            Ok(run) => Attempt::Finished(run),
            Err(_) => {
                let label = format!("{}-timeout", spec.name);
                Attempt::TimedOut(self.screenshots.capture_debug(page.as_ref(), &label).await)
            }
        };

        if let Err(e) = page.close().await {
            debug!("Closing session for {} failed: {}", spec.name, e);
        }
        attempt
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: RunnerConfig,
    worker: Arc<Worker>,
}

impl TestRunner {
    pub fn new(config: RunnerConfig, env: EnvConfig, sessions: Arc<dyn SessionFactory>) -> E2eResult<Self> {
        if config.workers == 0 {
            return Err(E2eError::Config("--workers must be at least 1".to_string()));
        }
        let screenshots = ScreenshotStore::new(config.screenshots_dir())?;
        let worker = Worker {
            env,
            sessions,
            screenshots,
            policy: config.policy.clone(),
            test_timeout: config.test_timeout,
            retries: config.retries,
        };
        Ok(Self {
            config,
            worker: Arc::new(worker),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Load specs from the specs directory and apply the filter
    pub fn load_specs(&self) -> E2eResult<Vec<TestSpec>> {
        let specs = TestSpec::load_all(&self.config.specs_dir)?;
        Ok(self.config.filter.apply(specs))
    }

    /// Run every selected spec and write the configured reports
    pub async fn run_all(&self) -> E2eResult<TestSuiteResult> {
        let specs = self.load_specs()?;
        self.worker.screenshots.reset()?;
        let suite = self.run_specs(specs).await;
        self.write_reports(&suite)?;
        Ok(suite)
    }

    /// Run specs through the worker pool; results keep the input order
    pub async fn run_specs(&self, specs: Vec<TestSpec>) -> TestSuiteResult {
        let start = Instant::now();
        let total = specs.len();
        info!(
            "Running {} test(s) using {} worker(s)...",
            total, self.config.workers
        );

        let permits = Arc::new(Semaphore::new(self.config.workers));
        let mut joins = JoinSet::new();
        for (index, spec) in specs.into_iter().enumerate() {
            let worker = Arc::clone(&self.worker);
            let permits = Arc::clone(&permits);
            joins.spawn(async move {
                let _permit = permits.acquire_owned().await;
                // A panic stays inside the inner task so the test still gets a result
                let spec = Arc::new(spec);
                let task_spec = Arc::clone(&spec);
                let result = match tokio::spawn(async move { worker.run_spec(&task_spec).await }).await {
                    Ok(result) => result,
                    Err(e) => {
                        let result = TestResult::crashed(&spec, e);
                        error!("{}: {}", spec.name, result.error.as_deref().unwrap_or_default());
                        result
                    }
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<TestResult>> = vec![None; total];
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok((index, result)) => {
                    for reporter in &self.config.reporters {
                        reporter.on_test_end(&result);
                    }
                    slots[index] = Some(result);
                }
                Err(e) => error!("test task panicked: {}", e),
            }
        }

        let results: Vec<TestResult> = slots.into_iter().flatten().collect();
        let suite = TestSuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!(
            "Test Results: {} passed, {} failed, {} flaky, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.flaky, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Write every file-based report, returning the paths written
    pub fn write_reports(&self, suite: &TestSuiteResult) -> E2eResult<Vec<PathBuf>> {
        write_reports(&self.config.reporters, suite, &self.config.output_dir)
    }
}

pub fn write_reports(reporters: &[Reporter], suite: &TestSuiteResult, output_dir: &Path) -> E2eResult<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for reporter in reporters {
        written.extend(reporter.finish(suite, output_dir)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserPage;
    use crate::spec::Viewport;
    use crate::testing::FakePage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hands out scripted pages in order, then fails
    struct ScriptedSessions {
        pages: Mutex<VecDeque<FakePage>>,
        opened: AtomicUsize,
    }

    impl ScriptedSessions {
        fn with(pages: Vec<FakePage>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                opened: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionFactory for ScriptedSessions {
        async fn open(&self, _viewport: &Viewport) -> E2eResult<Box<dyn BrowserPage>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            match self.pages.lock().unwrap().pop_front() {
                Some(page) => Ok(Box::new(page)),
                None => Err(E2eError::SessionClosed("no page scripted".to_string())),
            }
        }
    }

    struct PanickingSessions;

    #[async_trait]
    impl SessionFactory for PanickingSessions {
        async fn open(&self, _viewport: &Viewport) -> E2eResult<Box<dyn BrowserPage>> {
            panic!("browser driver crashed");
        }
    }

    fn env() -> EnvConfig {
        EnvConfig {
            base_url: "https://qa.aliquot.test".into(),
            username: "qa".into(),
            password: "pw".into(),
            env_name: None,
        }
    }

    fn config(output: &Path) -> RunnerConfig {
        RunnerConfig {
            output_dir: output.to_path_buf(),
            reporters: vec![],
            ..Default::default()
        }
    }

    fn click_spec(name: &str) -> TestSpec {
        TestSpec::from_yaml(&format!(
            "name: {}\ncategory: dashboard\nlogin: false\nsteps:\n  - action: click\n    selector: '#go'\n",
            name
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_results_keep_input_order_across_workers() {
        let dir = tempfile::tempdir().unwrap();
        let pages = (0..4).map(|_| FakePage::at("https://qa.aliquot.test/dashboard")).collect();
        let sessions = ScriptedSessions::with(pages);
        let runner = TestRunner::new(
            RunnerConfig {
                workers: 3,
                ..config(dir.path())
            },
            env(),
            sessions.clone(),
        )
        .unwrap();

        let specs = ["a", "b", "c", "d"].iter().map(|n| click_spec(n)).collect();
        let suite = runner.run_specs(specs).await;

        assert!(suite.success());
        assert_eq!(suite.total, 4);
        assert_eq!(suite.passed, 4);
        let names: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(sessions.opened.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_pass_after_retry_is_flaky() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = ScriptedSessions::with(vec![
            FakePage::at("https://qa.aliquot.test/dashboard").broken("#go"),
            FakePage::at("https://qa.aliquot.test/dashboard"),
        ]);
        let runner = TestRunner::new(
            RunnerConfig {
                retries: 2,
                ..config(dir.path())
            },
            env(),
            sessions,
        )
        .unwrap();

        let suite = runner.run_specs(vec![click_spec("sometimes")]).await;
        let result = &suite.results[0];
        assert_eq!(result.status, TestStatus::Flaky);
        assert_eq!(result.attempts, 2);
        assert!(suite.success());
        assert_eq!(suite.flaky, 1);
    }

    #[tokio::test]
    async fn test_failure_exhausts_retries() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = ScriptedSessions::with(vec![
            FakePage::at("https://qa.aliquot.test/dashboard").broken("#go"),
            FakePage::at("https://qa.aliquot.test/dashboard").broken("#go"),
        ]);
        let runner = TestRunner::new(
            RunnerConfig {
                retries: 1,
                ..config(dir.path())
            },
            env(),
            sessions.clone(),
        )
        .unwrap();

        let suite = runner.run_specs(vec![click_spec("always")]).await;
        let result = &suite.results[0];
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.attempts, 2);
        assert!(result.error.as_ref().unwrap().contains("#go"));
        assert!(!result.screenshots.is_empty());
        assert!(!suite.success());
        assert_eq!(sessions.opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_timed_out_with_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = ScriptedSessions::with(vec![FakePage::at("https://qa.aliquot.test/reports")]);
        let runner = TestRunner::new(
            RunnerConfig {
                test_timeout: Duration::from_secs(2),
                ..config(dir.path())
            },
            env(),
            sessions,
        )
        .unwrap();

        let spec = TestSpec::from_yaml(
            "name: slow\ncategory: reports\nlogin: false\nsteps:\n  - action: sleep\n    ms: 60000\n",
        )
        .unwrap();
        let suite = runner.run_specs(vec![spec]).await;

        let result = &suite.results[0];
        assert_eq!(result.status, TestStatus::TimedOut);
        assert_eq!(result.error.as_deref(), Some("test exceeded its 2000 ms timeout"));
        assert_eq!(result.screenshots.len(), 1);
        assert!(result.screenshots[0].exists());
        assert_eq!(suite.failed, 1);
    }

    #[tokio::test]
    async fn test_skipped_spec_opens_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = ScriptedSessions::with(vec![]);
        let runner = TestRunner::new(config(dir.path()), env(), sessions.clone()).unwrap();

        let spec = TestSpec::from_yaml(
            "name: later\ncategory: utilities\nskip: tool not deployed to QA\nsteps: []\n",
        )
        .unwrap();
        let suite = runner.run_specs(vec![spec]).await;

        assert_eq!(suite.skipped, 1);
        assert!(suite.success());
        assert_eq!(sessions.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_failure_fails_the_test() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(config(dir.path()), env(), ScriptedSessions::with(vec![])).unwrap();

        let suite = runner.run_specs(vec![click_spec("no browser")]).await;
        assert_eq!(suite.results[0].status, TestStatus::Failed);
        assert!(suite.results[0].error.as_ref().unwrap().contains("no page scripted"));
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(
            RunnerConfig {
                workers: 2,
                ..config(dir.path())
            },
            env(),
            Arc::new(PanickingSessions),
        )
        .unwrap();

        let suite = runner.run_specs(vec![click_spec("first"), click_spec("second")]).await;

        assert_eq!(suite.total, 2);
        assert_eq!(suite.failed, 2);
        assert!(!suite.success());
        let result = &suite.results[1];
        assert_eq!(result.name, "second");
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("test task panicked: browser driver crashed"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = TestRunner::new(
            RunnerConfig {
                workers: 0,
                ..config(dir.path())
            },
            env(),
            ScriptedSessions::with(vec![]),
        )
        .err()
        .unwrap();
        assert!(err.is_config());
    }
}
