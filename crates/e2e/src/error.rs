//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Missing environment variable(s): {}", join_names(.0))]
    MissingEnv(Vec<String>),

    #[error("Environment file not found: {0}")]
    EnvFileMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Base URL unreachable after {attempts} attempts: {url}")]
    Unreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Browser session closed: {0}")]
    SessionClosed(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Navigation failed: expected URL containing '{expected}', got '{actual}'")]
    Navigation { expected: String, actual: String },

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Environment file error: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("Invalid filter pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Configuration problems are fatal for the whole run, not a single test
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            E2eError::MissingEnv(_) | E2eError::EnvFileMissing(_) | E2eError::Config(_) | E2eError::Dotenv(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

fn join_names(names: &[String]) -> String {
    names.join(", ")
}
