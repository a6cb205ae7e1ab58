//! Declarative YAML test specification

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{E2eError, E2eResult};
use crate::pages::PageName;

/// A complete test specification parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this test
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Application area under test
    pub category: Category,

    /// Tags for filtering tests (`smoke`, `regression`, ...)
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser
    #[serde(default)]
    pub viewport: Viewport,

    /// Authenticate through the login helper before the first step
    #[serde(default = "default_true")]
    pub login: bool,

    /// Skip this test with the given reason
    #[serde(default)]
    pub skip: Option<String>,

    /// Overrides the runner's per-test timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Overrides the runner's retry count
    #[serde(default)]
    pub retries: Option<u32>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 720 }
    }
}

/// Application areas covered by the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Auth,
    Dashboard,
    Reports,
    Customers,
    Inventory,
    SiteManagement,
    Utilities,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Auth,
        Category::Dashboard,
        Category::Reports,
        Category::Customers,
        Category::Inventory,
        Category::SiteManagement,
        Category::Utilities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Auth => "auth",
            Category::Dashboard => "dashboard",
            Category::Reports => "reports",
            Category::Customers => "customers",
            Category::Inventory => "inventory",
            Category::SiteManagement => "site_management",
            Category::Utilities => "utilities",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| E2eError::Config(format!("unknown test category '{}'", s)))
    }
}

/// A single step in a test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        optional: bool,
    },

    /// Fill an input field. `{{username}}` and `{{password}}` expand from the environment.
    Fill { selector: String, value: String },

    /// Type text with keyboard simulation
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Press a key
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
        #[serde(default)]
        optional: bool,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        attribute: Option<AttributeAssertion>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        optional: bool,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
    },

    Hover { selector: String },

    /// Select an option from a dropdown
    Select { selector: String, value: String },

    Check { selector: String },

    Uncheck { selector: String },

    /// Execute a JavaScript function body, optionally comparing its result
    Evaluate {
        script: String,
        #[serde(default)]
        expected: Option<serde_json::Value>,
    },

    /// Log a message (for debugging)
    Log { message: String },

    /// Run the login helper (for specs with `login: false`)
    Login,

    /// Wait for the URL to contain a fragment
    ExpectUrl {
        contains: String,
        #[serde(default = "default_url_timeout")]
        timeout_ms: u64,
        /// Treat a redirect to the dashboard as a pass, with a warning
        #[serde(default)]
        accept_dashboard: bool,
    },

    /// Open a screen through its page object and wait until it is ready
    OpenPage { page: PageName },

    /// Check that all key elements of a screen are visible
    AssertPage {
        page: PageName,
        #[serde(default)]
        optional: bool,
    },

    /// Click a sidebar navigation entry
    Nav { item: String },

    /// Search on a screen with a search box
    Search { page: PageName, query: String },

    /// Select and run a report on the reports screen
    RunReport {
        name: String,
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
        /// Fail unless the report returns at least this many rows
        #[serde(default)]
        min_rows: Option<usize>,
    },

    /// Filter the inventory table by status
    FilterInventory { status: String },

    /// Open a site management tab, optionally selecting a site first
    OpenSiteTab {
        #[serde(default)]
        site: Option<String>,
        tab: String,
    },

    /// Open a tool on the utilities screen
    OpenTool { name: String },

    /// Open the add-customer form and check that submitting it empty is rejected
    AddCustomerValidation,

    /// Open a customer's detail panel from the customers table
    OpenCustomer { name: String },

    /// Refresh the dashboard, optionally requiring a minimum number of widgets
    RefreshDashboard {
        #[serde(default)]
        min_widgets: Option<usize>,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

fn default_url_timeout() -> u64 {
    10_000
}

impl TestStep {
    /// Short label used in logs and reports
    pub fn describe(&self) -> String {
        match self {
            TestStep::Navigate { url, .. } => format!("navigate:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::Type { selector, .. } => format!("type:{}", selector),
            TestStep::Press { key, .. } => format!("press:{}", key),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::Sleep { ms } => format!("sleep:{}ms", ms),
            TestStep::Assert { selector, .. } => format!("assert:{}", selector),
            TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            TestStep::Hover { selector } => format!("hover:{}", selector),
            TestStep::Select { selector, .. } => format!("select:{}", selector),
            TestStep::Check { selector } => format!("check:{}", selector),
            TestStep::Uncheck { selector } => format!("uncheck:{}", selector),
            TestStep::Evaluate { .. } => "evaluate".to_string(),
            TestStep::Log { message } => {
                format!("log:{}", message.chars().take(30).collect::<String>())
            }
            TestStep::Login => "login".to_string(),
            TestStep::ExpectUrl { contains, .. } => format!("expect_url:{}", contains),
            TestStep::OpenPage { page } => format!("open_page:{}", page),
            TestStep::AssertPage { page, .. } => format!("assert_page:{}", page),
            TestStep::Nav { item } => format!("nav:{}", item),
            TestStep::Search { page, query } => format!("search:{}:{}", page, query),
            TestStep::RunReport { name, .. } => format!("run_report:{}", name),
            TestStep::FilterInventory { status } => format!("filter_inventory:{}", status),
            TestStep::OpenSiteTab { tab, .. } => format!("open_site_tab:{}", tab),
            TestStep::OpenTool { name } => format!("open_tool:{}", name),
            TestStep::AddCustomerValidation => "add_customer_validation".to_string(),
            TestStep::OpenCustomer { name } => format!("open_customer:{}", name),
            TestStep::RefreshDashboard { .. } => "refresh_dashboard".to_string(),
        }
    }

    /// Optional steps degrade to a warning instead of failing the test
    pub fn is_optional(&self) -> bool {
        match self {
            TestStep::Click { optional, .. }
            | TestStep::Wait { optional, .. }
            | TestStep::Assert { optional, .. }
            | TestStep::AssertPage { optional, .. } => *optional,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeAssertion {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
}

impl TestSpec {
    /// Parse a test spec from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a test spec from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all test specs from a directory, ordered by path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "spec directory not found: {}",
                dir.display()
            )));
        }

        let mut specs: Vec<Self> = Vec::new();
        let mut names = HashSet::new();

        for entry in walkdir::WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let is_yaml = entry
                .path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml || !entry.file_type().is_file() {
                continue;
            }

            let spec = Self::from_file(entry.path())?;
            if !names.insert(spec.name.clone()) {
                return Err(E2eError::SpecParse(format!(
                    "duplicate test name '{}' in {}",
                    spec.name,
                    entry.path().display()
                )));
            }
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Title used for grep matching: `[category] name @tag ...`
    pub fn title(&self) -> String {
        let mut title = format!("[{}] {}", self.category, self.name);
        for tag in &self.tags {
            title.push_str(" @");
            title.push_str(tag);
        }
        title
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("test name must not be empty".to_string()));
        }
        if self.steps.is_empty() && self.skip.is_none() {
            return Err(E2eError::SpecParse(format!("test '{}' has no steps", self.name)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_spec() {
        let yaml = r#"
name: login-page-renders
description: Login form is visible before authentication
category: auth
login: false
tags:
  - smoke
steps:
  - action: open_page
    page: login
  - action: fill
    selector: '#username'
    value: '{{username}}'
  - action: screenshot
    name: login-form
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.name, "login-page-renders");
        assert_eq!(spec.category, Category::Auth);
        assert!(!spec.login);
        assert_eq!(spec.steps.len(), 3);
        assert!(matches!(spec.steps[0], TestStep::OpenPage { page: PageName::Login }));
        assert_eq!(spec.title(), "[auth] login-page-renders @smoke");
    }

    #[test]
    fn test_defaults_apply() {
        let yaml = r#"
name: dashboard-widgets
category: dashboard
steps:
  - action: login
  - action: wait
    selector: '.dashboard'
  - action: expect_url
    contains: /dashboard
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert!(spec.login);
        assert_eq!(spec.viewport, Viewport { width: 1280, height: 720 });
        match &spec.steps[1] {
            TestStep::Wait { timeout_ms, state, optional, .. } => {
                assert_eq!(*timeout_ms, 5000);
                assert_eq!(*state, WaitState::Visible);
                assert!(!optional);
            }
            other => panic!("unexpected step {:?}", other),
        }
        match &spec.steps[2] {
            TestStep::ExpectUrl { accept_dashboard, timeout_ms, .. } => {
                assert!(!accept_dashboard);
                assert_eq!(*timeout_ms, 10_000);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_optional_steps() {
        let yaml = r#"
name: optional-banner
category: dashboard
steps:
  - action: assert
    selector: '.announcement'
    visible: true
    optional: true
  - action: click
    selector: '#refresh'
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert!(spec.steps[0].is_optional());
        assert!(!spec.steps[1].is_optional());
    }

    #[test]
    fn test_rejects_spec_without_steps() {
        let yaml = "name: empty\ncategory: reports\nsteps: []\n";
        assert!(matches!(TestSpec::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_rejects_unknown_action() {
        let yaml = "name: bad\ncategory: reports\nsteps:\n  - action: teleport\n";
        assert!(matches!(TestSpec::from_yaml(yaml), Err(E2eError::Yaml(_))));
    }

    #[test]
    fn test_category_from_str_accepts_cli_spelling() {
        assert_eq!("site-management".parse::<Category>().unwrap(), Category::SiteManagement);
        assert_eq!("Reports".parse::<Category>().unwrap(), Category::Reports);
        assert!("billing".parse::<Category>().is_err());
    }

    #[test]
    fn test_load_all_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let body = "name: same\ncategory: inventory\nsteps:\n  - action: log\n    message: hi\n";
        std::fs::write(dir.path().join("a.yaml"), body).unwrap();
        std::fs::write(dir.path().join("b.yml"), body).unwrap();

        let err = TestSpec::load_all(dir.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate test name 'same'"));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_all_reports_unreadable_entries() {
        let dir = tempfile::tempdir().unwrap();
        let body = "name: ok\ncategory: inventory\nsteps:\n  - action: log\n    message: hi\n";
        std::fs::write(dir.path().join("a.yaml"), body).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("b-dangling")).unwrap();

        let err = TestSpec::load_all(dir.path()).unwrap_err();
        assert!(matches!(err, E2eError::Io(_)), "{:?}", err);
    }

    #[test]
    fn test_parse_customer_and_dashboard_actions() {
        let yaml = r#"
name: detail
category: customers
steps:
  - action: open_customer
    name: Acme Corp
  - action: refresh_dashboard
  - action: refresh_dashboard
    min_widgets: 2
"#;
        let spec = TestSpec::from_yaml(yaml).unwrap();
        assert_eq!(spec.steps[0].describe(), "open_customer:Acme Corp");
        assert!(matches!(spec.steps[1], TestStep::RefreshDashboard { min_widgets: None }));
        assert!(matches!(spec.steps[2], TestStep::RefreshDashboard { min_widgets: Some(2) }));
    }
}
