//! Inventory screen

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;
use crate::spec::WaitState;

pub const SEARCH_INPUT: &str = "input#inventory-search";
pub const STATUS_FILTER: &str = "select#inventory-status";
pub const RESULTS: &str = "table.inventory";
pub const ROWS: &str = "table.inventory tbody tr";

pub static SCREEN: Screen = Screen {
    name: "inventory",
    path: "/inventory",
    ready: ".inventory-page",
    elements: &[
        Element { name: "search box", selector: SEARCH_INPUT },
        Element { name: "status filter", selector: STATUS_FILTER },
        Element { name: "inventory table", selector: RESULTS },
    ],
};

pub struct InventoryPage<'a> {
    base: BasePage<'a>,
}

impl<'a> InventoryPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn search(&self, query: &str) -> E2eResult<()> {
        self.base.search(SEARCH_INPUT, RESULTS, query).await
    }

    pub async fn filter_by_status(&self, status: &str) -> E2eResult<()> {
        let page = self.base.browser();
        page.select_option(STATUS_FILTER, status).await?;
        page.wait_for(RESULTS, WaitState::Visible, std::time::Duration::from_secs(5))
            .await
    }

    pub async fn item_count(&self) -> E2eResult<usize> {
        self.base.browser().count(ROWS).await
    }
}
