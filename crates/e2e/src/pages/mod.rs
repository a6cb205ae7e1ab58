//! Page objects for the Aliquot screens
//!
//! Every screen publishes a static [`Screen`] (path, ready selector, key
//! elements) and a page object that composes [`BasePage`] with the screen's
//! own actions.

use serde::{Deserialize, Serialize};
use std::fmt;

mod base;
pub mod customers;
pub mod dashboard;
pub mod inventory;
pub mod login;
pub mod reports;
pub mod site_management;
pub mod utilities;

pub use base::BasePage;
pub use customers::CustomersPage;
pub use dashboard::DashboardPage;
pub use inventory::InventoryPage;
pub use login::LoginPage;
pub use reports::ReportsPage;
pub use site_management::SiteManagementPage;
pub use utilities::UtilitiesPage;

/// A named UI element on a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub name: &'static str,
    pub selector: &'static str,
}

/// Static description of one application screen
#[derive(Debug)]
pub struct Screen {
    pub name: &'static str,

    /// Path relative to the base URL
    pub path: &'static str,

    /// Visible once the screen has rendered
    pub ready: &'static str,

    /// Elements every visit should show
    pub elements: &'static [Element],
}

/// Screens addressable from YAML specs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageName {
    Login,
    Dashboard,
    Reports,
    Customers,
    Inventory,
    SiteManagement,
    Utilities,
}

impl PageName {
    pub fn screen(&self) -> &'static Screen {
        match self {
            PageName::Login => &login::SCREEN,
            PageName::Dashboard => &dashboard::SCREEN,
            PageName::Reports => &reports::SCREEN,
            PageName::Customers => &customers::SCREEN,
            PageName::Inventory => &inventory::SCREEN,
            PageName::SiteManagement => &site_management::SCREEN,
            PageName::Utilities => &utilities::SCREEN,
        }
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.screen().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PageName; 7] = [
        PageName::Login,
        PageName::Dashboard,
        PageName::Reports,
        PageName::Customers,
        PageName::Inventory,
        PageName::SiteManagement,
        PageName::Utilities,
    ];

    #[test]
    fn test_screens_are_distinct_and_complete() {
        let mut paths = std::collections::HashSet::new();
        for page in ALL {
            let screen = page.screen();
            assert!(screen.path.starts_with('/'), "{} path must be absolute", screen.name);
            assert!(!screen.elements.is_empty(), "{} has no key elements", screen.name);
            assert!(paths.insert(screen.path), "duplicate path {}", screen.path);
        }
    }

    #[test]
    fn test_page_name_round_trips_through_yaml_spelling() {
        let page: PageName = serde_yaml::from_str("site_management").unwrap();
        assert_eq!(page, PageName::SiteManagement);
        assert_eq!(page.to_string(), "site_management");
    }
}
