//! Aliquot CLI
//!
//! Command-line runner for the Aliquot end-to-end suite: runs the `e2e`
//! harness, lists specs, summarizes results and checks the environment.

pub mod commands;
pub mod output;
