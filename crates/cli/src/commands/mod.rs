//! CLI Commands

pub mod check_env;
pub mod list;
pub mod report;
pub mod run;
