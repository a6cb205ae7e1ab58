//! Playwright browser automation
//!
//! Each session runs `node` with an embedded driver script that owns one
//! browser, one context and one page. Requests and responses are
//! newline-delimited JSON over the child's stdin/stdout:
//!
//! ```text
//! -> {"id":3,"cmd":"click","args":{"selector":"#save","timeout_ms":5000}}
//! <- {"id":3,"ok":true,"value":null}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::browser::{BrowserPage, ScreenshotOptions, SessionFactory};
use crate::error::{E2eError, E2eResult};
use crate::spec::{Viewport, WaitState};

/// Environment variable carrying launch options into the driver script
const DRIVER_OPTIONS_VAR: &str = "ALIQUOT_DRIVER_OPTIONS";

const DRIVER_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const opts = JSON.parse(process.env.ALIQUOT_DRIVER_OPTIONS || '{}');
const reply = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const message = (e) => String((e && e.message) || e);

(async () => {
  const browser = await playwright[opts.browser].launch({
    headless: opts.headless,
    slowMo: opts.slow_mo_ms,
  });
  const context = await browser.newContext({
    viewport: { width: opts.viewport_width, height: opts.viewport_height },
    ignoreHTTPSErrors: true,
  });
  context.setDefaultTimeout(opts.action_timeout_ms);
  context.setDefaultNavigationTimeout(opts.navigation_timeout_ms);
  const page = await context.newPage();
  const first = (selector) => page.locator(selector).first();
  const exists = async (selector) => (await page.locator(selector).count()) > 0;

  const handlers = {
    goto: async (a) => { await page.goto(a.url, { waitUntil: 'domcontentloaded' }); return null; },
    url: async () => page.url(),
    click: async (a) => { await first(a.selector).click({ timeout: a.timeout_ms }); return null; },
    fill: async (a) => { await first(a.selector).fill(a.value); return null; },
    type: async (a) => { await first(a.selector).pressSequentially(a.text, { delay: a.delay_ms }); return null; },
    press: async (a) => {
      if (a.selector) { await first(a.selector).press(a.key); } else { await page.keyboard.press(a.key); }
      return null;
    },
    hover: async (a) => { await first(a.selector).hover(); return null; },
    select: async (a) => { await first(a.selector).selectOption(a.value); return null; },
    check: async (a) => { await first(a.selector).setChecked(a.checked); return null; },
    visible: async (a) => first(a.selector).isVisible(),
    wait: async (a) => { await first(a.selector).waitFor({ state: a.state, timeout: a.timeout_ms }); return null; },
    text: async (a) => ((await exists(a.selector)) ? first(a.selector).textContent() : null),
    attr: async (a) => ((await exists(a.selector)) ? first(a.selector).getAttribute(a.name) : null),
    count: async (a) => page.locator(a.selector).count(),
    screenshot: async (a) => {
      if (a.selector) {
        await first(a.selector).screenshot({ path: a.path });
      } else {
        await page.screenshot({ path: a.path, fullPage: a.full_page });
      }
      return null;
    },
    evaluate: async (a) => {
      const result = await page.evaluate(new Function(a.script));
      return result === undefined ? null : result;
    },
    close: async () => null,
  };

  reply({ ready: true });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      const handler = handlers[req.cmd];
      if (!handler) throw new Error('unknown command: ' + req.cmd);
      const value = await handler(req.args || {});
      reply({ id: req.id, ok: true, value: value === undefined ? null : value });
    } catch (e) {
      reply({ id: req.id, ok: false, error: message(e) });
    }
    if (req.cmd === 'close') break;
  }
  await browser.close();
})().catch((e) => {
  reply({ ready: false, error: message(e) });
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Node.js executable
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides the `playwright` package
    pub project_dir: PathBuf,

    pub browser: Browser,

    pub headless: bool,

    /// Enables the Playwright inspector (`PWDEBUG=1`)
    pub debug: bool,

    /// Delay inserted between browser operations
    pub slow_mo_ms: u64,

    /// Default timeout for element actions inside the browser
    pub action_timeout: Duration,

    pub navigation_timeout: Duration,

    /// Upper bound on a single bridge round trip
    pub command_timeout: Duration,

    /// Upper bound on browser startup
    pub launch_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_binary: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
            browser: Browser::Chromium,
            headless: true,
            debug: false,
            slow_mo_ms: 0,
            action_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            launch_timeout: Duration::from_secs(30),
        }
    }
}

impl PlaywrightConfig {
    fn driver_options(&self, viewport: &Viewport) -> Value {
        json!({
            "browser": self.browser.as_str(),
            "headless": self.headless && !self.debug,
            "slow_mo_ms": self.slow_mo_ms,
            "viewport_width": viewport.width,
            "viewport_height": viewport.height,
            "action_timeout_ms": self.action_timeout.as_millis() as u64,
            "navigation_timeout_ms": self.navigation_timeout.as_millis() as u64,
        })
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    cmd: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ready: Option<bool>,
}

/// Pipes to the driver process
struct Bridge {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
}

impl Bridge {
    /// Read lines until a JSON response matching `predicate` arrives
    async fn read_until<F>(&mut self, predicate: F) -> E2eResult<Response>
    where
        F: Fn(&Response) -> bool,
    {
        loop {
            let line = match self.stdout.next_line().await? {
                Some(line) => line,
                None => {
                    self.closed = true;
                    return Err(E2eError::SessionClosed("driver process exited".to_string()));
                }
            };

            match serde_json::from_str::<Response>(&line) {
                Ok(response) if predicate(&response) => return Ok(response),
                Ok(response) => debug!("Ignoring stray driver response: {:?}", response),
                // Page console output and other noise
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }
}

/// One browser page driven through a Playwright node process
pub struct PlaywrightSession {
    bridge: Mutex<Bridge>,
    child: Mutex<Child>,
    command_timeout: Duration,
}

impl PlaywrightSession {
    /// Start a browser with the given viewport and wait until it is ready
    pub async fn launch(config: &PlaywrightConfig, viewport: &Viewport) -> E2eResult<Self> {
        let mut cmd = TokioCommand::new(&config.node_binary);
        cmd.arg("-e")
            .arg(DRIVER_SCRIPT)
            .current_dir(&config.project_dir)
            .env(DRIVER_OPTIONS_VAR, config.driver_options(viewport).to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if config.debug {
            cmd.env("PWDEBUG", "1");
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => E2eError::PlaywrightNotFound,
            _ => E2eError::Io(e),
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("driver stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut bridge = Bridge {
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            closed: false,
        };

        let ready = timeout(config.launch_timeout, bridge.read_until(|r| r.ready.is_some()))
            .await
            .map_err(|_| E2eError::Timeout("browser launch".to_string()))??;

        if ready.ready != Some(true) {
            let reason = ready.error.unwrap_or_else(|| "unknown launch failure".to_string());
            if reason.contains("Cannot find module 'playwright'") {
                return Err(E2eError::PlaywrightNotFound);
            }
            return Err(E2eError::Playwright(reason));
        }

        debug!(
            "Launched {} ({}x{}, headless: {})",
            config.browser.as_str(),
            viewport.width,
            viewport.height,
            config.headless && !config.debug
        );

        Ok(Self {
            bridge: Mutex::new(bridge),
            child: Mutex::new(child),
            command_timeout: config.command_timeout,
        })
    }

    /// Send one command and wait for its response
    async fn call(&self, cmd: &str, args: Value) -> E2eResult<Value> {
        let mut bridge = self.bridge.lock().await;
        if bridge.closed {
            return Err(E2eError::SessionClosed(format!("cannot run '{}'", cmd)));
        }

        bridge.next_id += 1;
        let id = bridge.next_id;
        let mut line = serde_json::to_string(&Request { id, cmd, args })?;
        line.push('\n');

        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.flush().await?;

        let response = timeout(self.command_timeout, bridge.read_until(|r| r.id == Some(id)))
            .await
            .map_err(|_| E2eError::Timeout(format!("browser command '{}'", cmd)))??;

        if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Playwright(
                response.error.unwrap_or_else(|| format!("'{}' failed", cmd)),
            ))
        }
    }

    /// SIGTERM first, then kill
    async fn terminate(&self) {
        let mut child = self.child.lock().await;

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(id) = child.id() {
                if kill(Pid::from_raw(id as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_millis(500), child.wait()).await.is_ok()
                {
                    return;
                }
            }
        }

        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl BrowserPage for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call("goto", json!({ "url": url })).await.map(|_| ())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let value = self.call("url", json!({})).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.call("click", json!({ "selector": selector, "timeout_ms": millis(timeout) }))
            .await
            .map(|_| ())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.call("fill", json!({ "selector": selector, "value": value }))
            .await
            .map(|_| ())
    }

    async fn type_text(&self, selector: &str, text: &str, delay: Duration) -> E2eResult<()> {
        self.call(
            "type",
            json!({ "selector": selector, "text": text, "delay_ms": millis(delay) }),
        )
        .await
        .map(|_| ())
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        self.call("press", json!({ "selector": selector, "key": key }))
            .await
            .map(|_| ())
    }

    async fn hover(&self, selector: &str) -> E2eResult<()> {
        self.call("hover", json!({ "selector": selector })).await.map(|_| ())
    }

    async fn select_option(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.call("select", json!({ "selector": selector, "value": value }))
            .await
            .map(|_| ())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> E2eResult<()> {
        self.call("check", json!({ "selector": selector, "checked": checked }))
            .await
            .map(|_| ())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        let value = self.call("visible", json!({ "selector": selector })).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call(
            "wait",
            json!({ "selector": selector, "state": state.as_str(), "timeout_ms": millis(timeout) }),
        )
        .await
        .map(|_| ())
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        let value = self.call("text", json!({ "selector": selector })).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn attribute(&self, selector: &str, name: &str) -> E2eResult<Option<String>> {
        let value = self.call("attr", json!({ "selector": selector, "name": name })).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        let value = self.call("count", json!({ "selector": selector })).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> E2eResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.call(
            "screenshot",
            json!({
                "path": path.to_string_lossy(),
                "selector": options.selector,
                "full_page": options.full_page,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> E2eResult<Value> {
        self.call("evaluate", json!({ "script": script })).await
    }

    async fn close(&self) -> E2eResult<()> {
        let result = self.call("close", json!({})).await;
        self.bridge.lock().await.closed = true;
        self.terminate().await;
        match result {
            Ok(_) | Err(E2eError::SessionClosed(_)) => Ok(()),
            Err(e) => {
                warn!("Browser did not close cleanly: {}", e);
                Ok(())
            }
        }
    }
}

/// Launches a Playwright session per test
pub struct PlaywrightLauncher {
    config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Check that node can resolve the `playwright` package
    pub async fn verify(&self) -> E2eResult<()> {
        let output = TokioCommand::new(&self.config.node_binary)
            .args(["-e", "console.log(require('playwright/package.json').version)"])
            .current_dir(&self.config.project_dir)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                info!("Using Playwright {} ({})", version, self.config.browser.as_str());
                Ok(())
            }
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

#[async_trait]
impl SessionFactory for PlaywrightLauncher {
    async fn open(&self, viewport: &Viewport) -> E2eResult<Box<dyn BrowserPage>> {
        let session = PlaywrightSession::launch(&self.config, viewport).await?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_from_str() {
        assert_eq!("chromium".parse::<Browser>().unwrap(), Browser::Chromium);
        assert_eq!("Firefox".parse::<Browser>().unwrap(), Browser::Firefox);
        assert_eq!("safari".parse::<Browser>().unwrap(), Browser::Webkit);
        assert!("lynx".parse::<Browser>().is_err());
    }

    #[test]
    fn test_debug_forces_headed_browser() {
        let config = PlaywrightConfig {
            debug: true,
            ..Default::default()
        };
        let options = config.driver_options(&Viewport::default());
        assert_eq!(options["headless"], json!(false));
        assert_eq!(options["browser"], json!("chromium"));
        assert_eq!(options["viewport_width"], json!(1280));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let ready: Response = serde_json::from_str(r#"{"ready":true}"#).unwrap();
        assert_eq!(ready.ready, Some(true));
        assert_eq!(ready.id, None);

        let failure: Response =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 5000ms exceeded"}"#).unwrap();
        assert_eq!(failure.id, Some(4));
        assert!(!failure.ok);
        assert_eq!(failure.value, Value::Null);
    }
}
