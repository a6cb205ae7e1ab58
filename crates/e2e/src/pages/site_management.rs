//! Site management screen

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;

pub const SITE_SELECT: &str = "select#site-select";
pub const TABS: &str = ".site-tabs";
pub const TAB_PANEL: &str = ".site-tab-panel";

pub static SCREEN: Screen = Screen {
    name: "site_management",
    path: "/sites",
    ready: ".site-management-page",
    elements: &[
        Element { name: "site selector", selector: SITE_SELECT },
        Element { name: "site tabs", selector: TABS },
        Element { name: "site list", selector: ".site-list" },
    ],
};

pub struct SiteManagementPage<'a> {
    base: BasePage<'a>,
}

impl<'a> SiteManagementPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn select_site(&self, site: &str) -> E2eResult<()> {
        self.base.browser().select_option(SITE_SELECT, site).await
    }

    /// Switch to a tab by its label and wait for its panel
    pub async fn open_tab(&self, label: &str) -> E2eResult<()> {
        let tab = format!("{} >> text={}", TABS, label);
        self.base.click_and_wait(&tab, TAB_PANEL).await
    }
}
