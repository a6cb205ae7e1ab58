//! Reports screen

use std::time::Duration;
use tracing::info;

use super::{BasePage, Element, Screen};
use crate::error::E2eResult;
use crate::spec::WaitState;

pub const REPORT_SELECT: &str = "select#report-type";
pub const DATE_FROM: &str = "input#report-date-from";
pub const DATE_TO: &str = "input#report-date-to";
pub const RUN_BUTTON: &str = "button#run-report";
pub const RESULTS: &str = "table.report-results";
pub const RESULT_ROWS: &str = "table.report-results tbody tr";

pub static SCREEN: Screen = Screen {
    name: "reports",
    path: "/reports",
    ready: ".reports-page",
    elements: &[
        Element { name: "report selector", selector: REPORT_SELECT },
        Element { name: "date range", selector: ".report-date-range" },
        Element { name: "run button", selector: RUN_BUTTON },
    ],
};

/// Reports can be slow against QA data
const REPORT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReportsPage<'a> {
    base: BasePage<'a>,
}

impl<'a> ReportsPage<'a> {
    pub fn new(base: BasePage<'a>) -> Self {
        Self { base }
    }

    pub async fn open(&self) -> E2eResult<()> {
        self.base.open(&SCREEN).await
    }

    pub async fn select_report(&self, name: &str) -> E2eResult<()> {
        self.base.browser().select_option(REPORT_SELECT, name).await
    }

    pub async fn set_date_range(&self, from: &str, to: &str) -> E2eResult<()> {
        let page = self.base.browser();
        page.fill(DATE_FROM, from).await?;
        page.fill(DATE_TO, to).await
    }

    /// Run the selected report and return the number of result rows
    pub async fn run(&self) -> E2eResult<usize> {
        let page = self.base.browser();
        page.click(RUN_BUTTON, Duration::from_secs(5)).await?;
        page.wait_for(RESULTS, WaitState::Visible, REPORT_TIMEOUT).await?;
        let rows = page.count(RESULT_ROWS).await?;
        info!("Report returned {} row(s)", rows);
        Ok(rows)
    }

    /// Select, optionally restrict to a date range, and run a report
    pub async fn run_report(&self, name: &str, range: Option<(&str, &str)>) -> E2eResult<usize> {
        self.select_report(name).await?;
        if let Some((from, to)) = range {
            self.set_date_range(from, to).await?;
        }
        self.run().await
    }
}
