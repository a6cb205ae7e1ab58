//! Behavior shared by every page object

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::{Element, Screen};
use crate::browser::BrowserPage;
use crate::config::EnvConfig;
use crate::error::{E2eError, E2eResult};
use crate::spec::WaitState;

/// Sidebar navigation container
pub const SIDEBAR: &str = "nav.sidebar";

const READY_TIMEOUT: Duration = Duration::from_secs(15);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(5);
const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct BasePage<'a> {
    page: &'a dyn BrowserPage,
    env: &'a EnvConfig,
}

impl<'a> BasePage<'a> {
    pub fn new(page: &'a dyn BrowserPage, env: &'a EnvConfig) -> Self {
        Self { page, env }
    }

    pub fn browser(&self) -> &'a dyn BrowserPage {
        self.page
    }

    pub fn env(&self) -> &'a EnvConfig {
        self.env
    }

    /// Navigate to the screen without waiting for it to render
    pub async fn goto(&self, screen: &Screen) -> E2eResult<()> {
        let url = self.env.url(screen.path);
        debug!("Opening {} at {}", screen.name, url);
        self.page.goto(&url).await
    }

    /// Navigate to the screen and wait until it is ready
    pub async fn open(&self, screen: &Screen) -> E2eResult<()> {
        self.goto(screen).await?;
        self.wait_ready(screen).await
    }

    pub async fn wait_ready(&self, screen: &Screen) -> E2eResult<()> {
        self.page
            .wait_for(screen.ready, WaitState::Visible, READY_TIMEOUT)
            .await
            .map_err(|e| E2eError::StepFailed {
                step: format!("open {}", screen.name),
                reason: format!("'{}' never became visible: {}", screen.ready, e),
            })
    }

    /// Whether the browser currently shows the screen's path
    pub async fn is_on(&self, screen: &Screen) -> E2eResult<bool> {
        Ok(self.page.current_url().await?.contains(screen.path))
    }

    /// Visibility check that treats lookup errors as "not visible"
    pub async fn is_element_visible(&self, selector: &str) -> bool {
        match self.page.is_visible(selector).await {
            Ok(visible) => visible,
            Err(e) => {
                debug!("Visibility check for '{}' failed: {}", selector, e);
                false
            }
        }
    }

    /// Key elements of `screen` that are not visible
    pub async fn missing_elements(&self, screen: &Screen) -> Vec<Element> {
        let mut missing = Vec::new();
        for element in screen.elements {
            if !self.is_element_visible(element.selector).await {
                missing.push(*element);
            }
        }
        missing
    }

    /// Fail unless every key element of `screen` is visible
    pub async fn verify_key_elements(&self, screen: &Screen) -> E2eResult<()> {
        let missing = self.missing_elements(screen).await;
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|e| e.name).collect();
        Err(E2eError::AssertionFailed(format!(
            "{}: missing {}",
            screen.name,
            names.join(", ")
        )))
    }

    /// Click an entry in the sidebar by its label
    pub async fn click_nav(&self, label: &str) -> E2eResult<()> {
        let selector = format!("{} >> text={}", SIDEBAR, label);
        self.page.click(&selector, ELEMENT_TIMEOUT).await
    }

    /// Poll the URL until it contains `fragment`
    pub async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> E2eResult<String> {
        let start = Instant::now();
        loop {
            let url = self.page.current_url().await?;
            if url.contains(fragment) {
                return Ok(url);
            }
            if start.elapsed() >= timeout {
                return Err(E2eError::Navigation {
                    expected: fragment.to_string(),
                    actual: url,
                });
            }
            sleep(URL_POLL_INTERVAL).await;
        }
    }

    /// Fill a search box, submit with Enter and wait for results
    pub async fn search(&self, input: &str, results: &str, query: &str) -> E2eResult<()> {
        self.page.fill(input, query).await?;
        self.page.press(Some(input), "Enter").await?;
        self.page
            .wait_for(results, WaitState::Visible, ELEMENT_TIMEOUT)
            .await
    }

    /// Click an element and wait for another to appear
    pub async fn click_and_wait(&self, selector: &str, appears: &str) -> E2eResult<()> {
        self.page.click(selector, ELEMENT_TIMEOUT).await?;
        self.page
            .wait_for(appears, WaitState::Visible, ELEMENT_TIMEOUT)
            .await
    }
}
