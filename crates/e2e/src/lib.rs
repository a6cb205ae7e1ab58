//! Aliquot E2E Test Suite
//!
//! This crate provides a Rust-controlled browser test suite for the Aliquot
//! web application that:
//! - Loads the QA base URL and credentials from the environment / `.env` files
//! - Controls Playwright through a long-lived Node driver speaking JSON lines
//! - Parses declarative YAML test specs and executes them via page objects
//! - Stabilizes login sessions that flicker back to the login page
//! - Writes list, line, JSON, HTML and Allure reports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 e2e harness (tests/e2e.rs)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EnvConfig::load()      -> base URL, credentials            │
//! │  TestRunner                                                 │
//! │    ├── load_specs() -> SpecFilter -> [TestSpec]             │
//! │    ├── worker pool (one browser session per test)           │
//! │    │     └── SpecExecutor                                   │
//! │    │           ├── TestSetup::login()   (stabilization)     │
//! │    │           └── steps -> page objects -> BrowserPage     │
//! │    └── Reporter::finish()  -> results.json, html, allure    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserPage (trait)                                        │
//! │    └── PlaywrightSession  <- node driver over stdin/stdout  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod pages;
pub mod playwright;
pub mod preflight;
pub mod report;
pub mod runner;
pub mod screenshots;
pub mod session;
pub mod spec;

#[cfg(test)]
mod testing;

pub use browser::{BrowserPage, SessionFactory};
pub use config::{validate_environment, EnvConfig};
pub use error::{E2eError, E2eResult};
pub use filter::SpecFilter;
pub use playwright::{Browser, PlaywrightConfig, PlaywrightLauncher};
pub use report::Reporter;
pub use runner::{RunnerConfig, TestResult, TestRunner, TestStatus, TestSuiteResult};
pub use session::{LoginOutcome, StabilizationPolicy, TestSetup};
pub use spec::{Category, TestSpec, TestStep};
