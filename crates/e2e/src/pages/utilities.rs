//! Utilities screen

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;

pub const TOOL_LIST: &str = ".utility-list";
pub const TOOL_PANEL: &str = ".utility-panel";

pub static SCREEN: Screen = Screen {
    name: "utilities",
    path: "/utilities",
    ready: ".utilities-page",
    elements: &[
        Element { name: "tool list", selector: TOOL_LIST },
        Element { name: "page header", selector: "header.app-header" },
    ],
};

pub struct UtilitiesPage<'a> {
    base: BasePage<'a>,
}

impl<'a> UtilitiesPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn open_tool(&self, name: &str) -> E2eResult<()> {
        let entry = format!("{} >> text={}", TOOL_LIST, name);
        self.base.click_and_wait(&entry, TOOL_PANEL).await
    }
}
