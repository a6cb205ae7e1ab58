//! Dashboard screen

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;

pub const WIDGET: &str = ".dashboard-widget";
pub const REFRESH_BUTTON: &str = "button#dashboard-refresh";

pub static SCREEN: Screen = Screen {
    name: "dashboard",
    path: "/dashboard",
    ready: ".dashboard",
    elements: &[
        Element { name: "page header", selector: "header.app-header" },
        Element { name: "sidebar", selector: "nav.sidebar" },
        Element { name: "summary cards", selector: ".dashboard-summary" },
        Element { name: "recent activity", selector: ".recent-activity" },
    ],
};

pub struct DashboardPage<'a> {
    base: BasePage<'a>,
}

impl<'a> DashboardPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn widget_count(&self) -> E2eResult<usize> {
        self.base.browser().count(WIDGET).await
    }

    /// Reload dashboard data and wait for the widgets to render again
    pub async fn refresh(&self) -> E2eResult<()> {
        self.base.click_and_wait(REFRESH_BUTTON, SCREEN.ready).await
    }
}
