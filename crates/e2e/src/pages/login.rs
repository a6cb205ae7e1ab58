//! Login screen

use std::time::Duration;

use super::{BasePage, Element, Screen};
use crate::browser::BrowserPage;
use crate::config::EnvConfig;
use crate::error::E2eResult;
use crate::spec::WaitState;

pub const USERNAME_INPUT: &str = "input[name=\"username\"]";
pub const PASSWORD_INPUT: &str = "input[name=\"password\"]";
pub const SUBMIT_BUTTON: &str = "button[type=\"submit\"]";
pub const ERROR_BANNER: &str = ".login-error";

pub static SCREEN: Screen = Screen {
    name: "login",
    path: "/login",
    ready: "form#login-form",
    elements: &[
        Element { name: "username field", selector: USERNAME_INPUT },
        Element { name: "password field", selector: PASSWORD_INPUT },
        Element { name: "sign-in button", selector: SUBMIT_BUTTON },
    ],
};

const FORM_TIMEOUT: Duration = Duration::from_secs(15);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LoginPage<'a> {
    base: BasePage<'a>,
}

impl<'a> LoginPage<'a> {
    pub fn new(page: &'a dyn BrowserPage, env: &'a EnvConfig) -> Self {
        Self {
            base: BasePage::new(page, env),
        }
    }

    pub fn base(&self) -> &BasePage<'a> {
        &self.base
    }

    /// Navigate to the login URL; an active session may redirect away from it
    pub async fn goto(&self) -> E2eResult<()> {
        self.base.goto(&SCREEN).await
    }

    pub async fn wait_for_form(&self) -> E2eResult<()> {
        self.base
            .browser()
            .wait_for(USERNAME_INPUT, WaitState::Visible, FORM_TIMEOUT)
            .await
    }

    pub async fn is_form_visible(&self) -> bool {
        self.base.is_element_visible(USERNAME_INPUT).await
    }

    /// Fill both credentials and press the sign-in button
    pub async fn submit(&self, username: &str, password: &str) -> E2eResult<()> {
        let page = self.base.browser();
        page.fill(USERNAME_INPUT, username).await?;
        page.fill(PASSWORD_INPUT, password).await?;
        page.click(SUBMIT_BUTTON, SUBMIT_TIMEOUT).await
    }

    /// Log in with the configured credentials
    pub async fn login(&self) -> E2eResult<()> {
        let env = self.base.env();
        self.submit(&env.username, &env.password).await
    }

    /// Text of the error banner, if one is shown
    pub async fn error_message(&self) -> Option<String> {
        if !self.base.is_element_visible(ERROR_BANNER).await {
            return None;
        }
        let text = self
            .base
            .browser()
            .text_content(ERROR_BANNER)
            .await
            .ok()
            .flatten()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Some(text.unwrap_or_else(|| "login error shown".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    fn env() -> EnvConfig {
        EnvConfig {
            base_url: "https://qa.aliquot.test".into(),
            username: "qa-user".into(),
            password: "pw".into(),
            env_name: None,
        }
    }

    #[tokio::test]
    async fn test_login_fills_credentials_then_submits() {
        let page = FakePage::at("about:blank").with_visible(&[USERNAME_INPUT]);
        let env = env();
        let login = LoginPage::new(&page, &env);

        login.goto().await.unwrap();
        assert!(login.is_form_visible().await);
        login.login().await.unwrap();

        assert_eq!(
            page.actions(),
            vec![
                "goto:https://qa.aliquot.test/login".to_string(),
                format!("fill:{}=qa-user", USERNAME_INPUT),
                format!("fill:{}=pw", PASSWORD_INPUT),
                format!("click:{}", SUBMIT_BUTTON),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_message() {
        let env = env();

        let clean = FakePage::at("https://qa.aliquot.test/login");
        assert_eq!(LoginPage::new(&clean, &env).error_message().await, None);

        let rejected = FakePage::at("https://qa.aliquot.test/login")
            .with_visible(&[ERROR_BANNER])
            .with_text(ERROR_BANNER, "  Invalid username or password ");
        assert_eq!(
            LoginPage::new(&rejected, &env).error_message().await.as_deref(),
            Some("Invalid username or password")
        );
    }
}
