//! Browser page abstraction
//!
//! Page objects, the login helper and the spec executor talk to the browser
//! only through [`BrowserPage`]. The Playwright bridge is the production
//! implementation.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::E2eResult;
use crate::spec::{Viewport, WaitState};

/// Opens one fresh browser page per test
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, viewport: &Viewport) -> E2eResult<Box<dyn BrowserPage>>;
}

/// Screenshot target options
#[derive(Debug, Clone, Default)]
pub struct ScreenshotOptions {
    /// Capture a single element instead of the viewport
    pub selector: Option<String>,
    pub full_page: bool,
}

/// A single open browser page
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to an absolute URL
    async fn goto(&self, url: &str) -> E2eResult<()>;

    /// URL currently shown by the page
    async fn current_url(&self) -> E2eResult<String>;

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    /// Replace the value of an input
    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()>;

    /// Type text key by key
    async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> E2eResult<()>;

    /// Press a key on an element, or on the page when `selector` is `None`
    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()>;

    async fn hover(&self, selector: &str) -> E2eResult<()>;

    async fn select_option(&self, selector: &str, value: &str) -> E2eResult<()>;

    async fn set_checked(&self, selector: &str, checked: bool) -> E2eResult<()>;

    /// Whether the first element matching `selector` is visible right now
    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    /// Wait until the first element matching `selector` reaches `state`
    async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>>;

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> E2eResult<usize>;

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> E2eResult<()>;

    /// Evaluate a JavaScript function body and return its JSON result
    async fn evaluate(&self, script: &str) -> E2eResult<serde_json::Value>;

    async fn close(&self) -> E2eResult<()>;
}
