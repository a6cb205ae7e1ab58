//! Scripted in-memory page for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::browser::{BrowserPage, ScreenshotOptions};
use crate::error::{E2eError, E2eResult};
use crate::spec::WaitState;

/// A page whose URL follows a script and whose DOM is a set of visible selectors.
///
/// `current_url` pops the next scripted URL (and makes it current) until the
/// script runs dry, then keeps returning the current URL. Clicking a selector
/// registered with [`FakePage::on_click`] appends its next URL sequence to the
/// script.
#[derive(Default)]
pub struct FakePage {
    current: Mutex<String>,
    script: Mutex<VecDeque<String>>,
    on_click: Mutex<HashMap<String, VecDeque<Vec<String>>>>,
    redirects: HashMap<String, String>,
    visible: Mutex<HashSet<String>>,
    texts: HashMap<String, String>,
    counts: HashMap<String, usize>,
    broken: HashSet<String>,
    eval_result: serde_json::Value,
    actions: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn at(url: &str) -> Self {
        Self {
            current: Mutex::new(url.to_string()),
            ..Default::default()
        }
    }

    pub fn with_visible(self, selectors: &[&str]) -> Self {
        self.visible
            .lock()
            .unwrap()
            .extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_count(mut self, selector: &str, count: usize) -> Self {
        self.counts.insert(selector.to_string(), count);
        self
    }

    pub fn with_eval_result(mut self, value: serde_json::Value) -> Self {
        self.eval_result = value;
        self
    }

    /// Selectors whose actions fail as if the element were missing
    pub fn broken(mut self, selector: &str) -> Self {
        self.broken.insert(selector.to_string());
        self
    }

    /// Navigating to `from` lands on `to`
    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    /// Each click on `selector` queues the next sequence of URLs
    pub fn on_click(self, selector: &str, urls: &[&str]) -> Self {
        self.on_click
            .lock()
            .unwrap()
            .entry(selector.to_string())
            .or_default()
            .push_back(urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn count_actions(&self, prefix: &str) -> usize {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.starts_with(prefix))
            .count()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn check(&self, selector: &str) -> E2eResult<()> {
        if self.broken.contains(selector) {
            return Err(E2eError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.record(format!("goto:{}", url));
        let target = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        *self.current.lock().unwrap() = target;
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let mut current = self.current.lock().unwrap();
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            *current = next;
        }
        Ok(current.clone())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("click:{}", selector));
        let queued = self
            .on_click
            .lock()
            .unwrap()
            .get_mut(selector)
            .and_then(|q| q.pop_front());
        if let Some(urls) = queued {
            self.script.lock().unwrap().extend(urls);
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("fill:{}={}", selector, value));
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, _delay: Duration) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("type:{}={}", selector, text));
        Ok(())
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        if let Some(selector) = selector {
            self.check(selector)?;
        }
        self.record(format!("press:{}", key));
        Ok(())
    }

    async fn hover(&self, selector: &str) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("hover:{}", selector));
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("select:{}={}", selector, value));
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> E2eResult<()> {
        self.check(selector)?;
        self.record(format!("check:{}={}", selector, checked));
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.visible.lock().unwrap().contains(selector))
    }

    async fn wait_for(&self, selector: &str, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        self.check(selector)?;
        let visible = self.visible.lock().unwrap().contains(selector);
        let reached = match state {
            WaitState::Visible | WaitState::Attached => visible,
            WaitState::Hidden | WaitState::Detached => !visible,
        };
        if reached {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be {}", selector, state.as_str())))
        }
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        Ok(self.texts.get(selector).cloned())
    }

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        Ok(self.texts.get(&format!("{}@{}", selector, name)).cloned())
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        Ok(self.counts.get(selector).copied().unwrap_or(0))
    }

    async fn screenshot(&self, path: &Path, _options: &ScreenshotOptions) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"fake-png")?;
        self.record(format!("screenshot:{}", path.display()));
        Ok(())
    }

    async fn evaluate(&self, _script: &str) -> E2eResult<serde_json::Value> {
        Ok(self.eval_result.clone())
    }

    async fn close(&self) -> E2eResult<()> {
        self.record("close".to_string());
        Ok(())
    }
}
