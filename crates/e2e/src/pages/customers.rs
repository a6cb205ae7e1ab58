//! Customers screen

use std::time::Duration;

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;

pub const SEARCH_INPUT: &str = "input#customer-search";
pub const RESULTS: &str = "table.customers";
pub const ROWS: &str = "table.customers tbody tr";
pub const ADD_BUTTON: &str = "button#add-customer";
pub const CUSTOMER_FORM: &str = "form#customer-form";
pub const DETAIL_PANEL: &str = ".customer-detail";

pub static SCREEN: Screen = Screen {
    name: "customers",
    path: "/customers",
    ready: ".customers-page",
    elements: &[
        Element { name: "search box", selector: SEARCH_INPUT },
        Element { name: "customer table", selector: RESULTS },
        Element { name: "add customer button", selector: ADD_BUTTON },
    ],
};

pub struct CustomersPage<'a> {
    base: BasePage<'a>,
}

impl<'a> CustomersPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn search(&self, query: &str) -> E2eResult<()> {
        self.base.search(SEARCH_INPUT, RESULTS, query).await
    }

    pub async fn result_count(&self) -> E2eResult<usize> {
        self.base.browser().count(ROWS).await
    }

    /// Open a customer's detail panel from the table
    pub async fn open_customer(&self, name: &str) -> E2eResult<()> {
        let row = format!("{} >> text={}", RESULTS, name);
        self.base.click_and_wait(&row, DETAIL_PANEL).await
    }

    pub async fn open_add_form(&self) -> E2eResult<()> {
        self.base.click_and_wait(ADD_BUTTON, CUSTOMER_FORM).await
    }

    /// Submit the add-customer form empty; validation should keep it open
    pub async fn submit_empty_form(&self) -> E2eResult<bool> {
        let page = self.base.browser();
        page.click("form#customer-form button[type=\"submit\"]", Duration::from_secs(5))
            .await?;
        Ok(self.base.is_element_visible(CUSTOMER_FORM).await)
    }
}
