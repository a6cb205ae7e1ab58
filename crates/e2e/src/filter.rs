//! Test selection by category and title pattern

use regex::Regex;

use crate::error::E2eResult;
use crate::spec::{Category, TestSpec};

/// Selects specs by category and by a regex over [`TestSpec::title`].
///
/// An empty category list selects every category.
#[derive(Debug, Clone, Default)]
pub struct SpecFilter {
    pub categories: Vec<Category>,
    pub grep: Option<Regex>,
    pub grep_invert: Option<Regex>,
}

impl SpecFilter {
    pub fn new(categories: Vec<Category>, grep: Option<&str>, grep_invert: Option<&str>) -> E2eResult<Self> {
        Ok(Self {
            categories,
            grep: grep.map(Regex::new).transpose()?,
            grep_invert: grep_invert.map(Regex::new).transpose()?,
        })
    }

    pub fn matches(&self, spec: &TestSpec) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&spec.category) {
            return false;
        }

        let title = spec.title();
        if let Some(grep) = &self.grep {
            if !grep.is_match(&title) {
                return false;
            }
        }
        if let Some(invert) = &self.grep_invert {
            if invert.is_match(&title) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, specs: Vec<TestSpec>) -> Vec<TestSpec> {
        specs.into_iter().filter(|s| self.matches(s)).collect()
    }
}

/// Harness flags that ask for tests to be selected or listed
const SELECTION_FLAGS: [&str; 4] = ["--all", "--category", "--grep", "--list"];

/// Whether a harness command line selects any tests.
///
/// `cargo test` hands its test-name filter and libtest flags (`--nocapture`,
/// `--test-threads=N`, ...) to every test target. Those never carry one of
/// the harness's selection flags, so such runs select nothing.
pub fn selects_tests<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().any(|arg| {
        let arg = arg.as_ref();
        SELECTION_FLAGS.iter().any(|flag| {
            arg.strip_prefix(flag)
                .map(|rest| rest.is_empty() || rest.starts_with('=') || rest.starts_with("-invert"))
                .unwrap_or(false)
        })
    })
}
