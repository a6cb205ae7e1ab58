//! `aliquot list`

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use aliquot_e2e::filter::SpecFilter;
use aliquot_e2e::{Category, TestSpec};

use crate::commands::run::SPECS_DIR;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only these categories (repeatable)
    #[arg(long, value_parser = parse_category)]
    pub category: Vec<Category>,

    /// Only tests whose title matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Spec directory (defaults to crates/e2e/specs under the root)
    #[arg(long)]
    pub specs: Option<PathBuf>,
}

pub fn parse_category(value: &str) -> Result<Category, String> {
    value.parse().map_err(|e: aliquot_e2e::E2eError| e.to_string())
}

/// Spec summary for display
#[derive(Serialize, Clone, Debug)]
pub struct SpecRow {
    pub name: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub steps: usize,
    pub login: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
}

impl From<&TestSpec> for SpecRow {
    fn from(spec: &TestSpec) -> Self {
        Self {
            name: spec.name.clone(),
            category: spec.category,
            tags: spec.tags.clone(),
            steps: spec.steps.len(),
            login: spec.login,
            skip: spec.skip.clone(),
        }
    }
}

impl TableDisplay for SpecRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Category", "Tags", "Steps", "Login", "Skip"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.category.to_string(),
            self.tags.join(", "),
            self.steps.to_string(),
            if self.login { "yes" } else { "no" }.to_string(),
            self.skip.clone().unwrap_or_default(),
        ]
    }
}

pub fn collect(args: &ListArgs, root: &Path) -> Result<Vec<SpecRow>> {
    let dir = args.specs.clone().unwrap_or_else(|| root.join(SPECS_DIR));
    let filter = SpecFilter::new(args.category.clone(), args.grep.as_deref(), None)?;
    let specs = filter.apply(TestSpec::load_all(&dir)?);
    Ok(specs.iter().map(SpecRow::from).collect())
}

pub fn execute(args: ListArgs, root: &Path, format: OutputFormat) -> Result<i32> {
    let rows = collect(&args, root)?;
    print_list(&rows, format);
    Ok(0)
}
