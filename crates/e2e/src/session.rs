//! Login and authentication-state stabilization
//!
//! After the login form is submitted the application may pass through
//! intermediate redirects, and occasionally bounces back to the login page
//! once before settling ("flicker"). [`TestSetup::login`] polls the URL until
//! it reaches an authenticated screen, resubmits after a flicker, and gives up
//! on waiting (without failing) once the polling window closes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::browser::BrowserPage;
use crate::config::EnvConfig;
use crate::error::{E2eError, E2eResult};
use crate::pages::LoginPage;

/// Timing and URL rules for login stabilization
#[derive(Debug, Clone)]
pub struct StabilizationPolicy {
    pub poll_interval: Duration,

    /// Polling window per attempt
    pub timeout: Duration,

    /// Form submissions allowed when the session flickers
    pub max_attempts: u32,

    /// Pause after a flicker before re-checking
    pub retry_backoff: Duration,

    /// URL substrings that only appear once authenticated
    pub authenticated_paths: Vec<String>,

    pub login_path: String,
}

impl Default for StabilizationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            authenticated_paths: [
                "/dashboard",
                "/home",
                "/reports",
                "/customers",
                "/inventory",
                "/sites",
                "/utilities",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            login_path: "/login".to_string(),
        }
    }
}

impl StabilizationPolicy {
    pub fn is_login(&self, url: &str) -> bool {
        url.contains(&self.login_path)
    }

    pub fn is_authenticated(&self, url: &str) -> bool {
        !self.is_login(url) && self.authenticated_paths.iter().any(|p| url.contains(p.as_str()))
    }
}

/// How login finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// The login URL redirected straight to an authenticated screen
    AlreadyAuthenticated { url: String },

    Authenticated { url: String, attempts: u32, polls: u32 },

    /// The URL never settled; the test proceeds and later steps decide
    TimedOut { last_url: String, attempts: u32 },
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, LoginOutcome::TimedOut { .. })
    }
}

enum Poll {
    Authenticated { url: String, polls: u32 },
    Flicker { url: String },
    TimedOut { url: String },
}

/// Shared login helper used before each authenticated test
pub struct TestSetup<'a> {
    page: &'a dyn BrowserPage,
    env: &'a EnvConfig,
    policy: StabilizationPolicy,
}

impl<'a> TestSetup<'a> {
    pub fn new(page: &'a dyn BrowserPage, env: &'a EnvConfig) -> Self {
        Self::with_policy(page, env, StabilizationPolicy::default())
    }

    pub fn with_policy(page: &'a dyn BrowserPage, env: &'a EnvConfig, policy: StabilizationPolicy) -> Self {
        Self { page, env, policy }
    }

    pub fn policy(&self) -> &StabilizationPolicy {
        &self.policy
    }

    /// Log in with the configured credentials and wait for the session to settle
    pub async fn login(&self) -> E2eResult<LoginOutcome> {
        let login = LoginPage::new(self.page, self.env);

        if let Some(url) = self.open_form(&login).await? {
            info!("Already authenticated at {}", url);
            return Ok(LoginOutcome::AlreadyAuthenticated { url });
        }

        let mut attempt = 1;
        loop {
            debug!("Submitting login form (attempt {}/{})", attempt, self.policy.max_attempts);
            login.login().await?;

            match self.wait_for_authenticated(&login).await? {
                Poll::Authenticated { url, polls } => {
                    info!("Authenticated at {} after {} poll(s)", url, polls);
                    return Ok(LoginOutcome::Authenticated { url, attempts: attempt, polls });
                }
                Poll::TimedOut { url } => {
                    warn!(
                        "Login did not settle within {:?} (last URL: {}); continuing",
                        self.policy.timeout, url
                    );
                    return Ok(LoginOutcome::TimedOut { last_url: url, attempts: attempt });
                }
                Poll::Flicker { url } => {
                    if attempt >= self.policy.max_attempts {
                        return Err(E2eError::LoginFailed(format!(
                            "session bounced back to {} on all {} attempts",
                            url, attempt
                        )));
                    }
                    warn!(
                        "Login flicker on attempt {}/{}: back on {}; retrying in {:?}",
                        attempt, self.policy.max_attempts, url, self.policy.retry_backoff
                    );
                    sleep(self.policy.retry_backoff).await;

                    let settled = self.page.current_url().await?;
                    if self.policy.is_authenticated(&settled) {
                        info!("Flicker resolved on its own at {}", settled);
                        return Ok(LoginOutcome::Authenticated {
                            url: settled,
                            attempts: attempt,
                            polls: 0,
                        });
                    }

                    attempt += 1;
                    if let Some(url) = self.open_form(&login).await? {
                        return Ok(LoginOutcome::Authenticated { url, attempts: attempt, polls: 0 });
                    }
                }
            }
        }
    }

    /// Navigate to the login form. Returns the URL if that already lands on an authenticated screen.
    async fn open_form(&self, login: &LoginPage<'_>) -> E2eResult<Option<String>> {
        login.goto().await?;
        let url = self.page.current_url().await?;
        if self.policy.is_authenticated(&url) {
            return Ok(Some(url));
        }
        login.wait_for_form().await.map_err(|e| {
            E2eError::LoginFailed(format!("login form not shown at {}: {}", url, e))
        })?;
        Ok(None)
    }

    /// Poll the URL until authenticated, flickered, or out of time.
    /// The first poll is immediate.
    async fn wait_for_authenticated(&self, login: &LoginPage<'_>) -> E2eResult<Poll> {
        let start = Instant::now();
        let mut polls = 0;
        let mut left_login = false;

        loop {
            polls += 1;
            let url = self.page.current_url().await?;

            if self.policy.is_authenticated(&url) {
                return Ok(Poll::Authenticated { url, polls });
            }

            if self.policy.is_login(&url) {
                if left_login {
                    return Ok(Poll::Flicker { url });
                }
                if let Some(message) = login.error_message().await {
                    return Err(E2eError::LoginFailed(format!("rejected by the application: {}", message)));
                }
            } else {
                left_login = true;
            }

            if start.elapsed() >= self.policy.timeout {
                return Ok(Poll::TimedOut { url });
            }
            sleep(self.policy.poll_interval).await;
        }
    }
}
