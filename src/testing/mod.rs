//! Scenario execution
//!
//! Two ways to drive a session: the built-in change-text suite written
//! directly against the driver, and YAML scenario files interpreted step by
//! step. Both produce one [`TestResult`] per scenario, and a failing
//! scenario never stops the ones after it.

mod config;
mod runner;
pub mod suite;

use std::time::Duration;

use colored::Colorize;

pub use config::*;
pub use runner::{execute_scenario, load_scenario, run_scenario};

/// Result of one scenario
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Print the pass/fail tally; returns whether everything passed
pub fn print_summary(results: &[TestResult]) -> bool {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    println!();
    for result in results.iter().filter(|r| !r.passed) {
        println!(
            "  {} {}: {}",
            "✗".red(),
            result.name,
            result.error.as_deref().unwrap_or("failed")
        );
    }

    let tally = format!("{} passed, {} failed", passed, failed);
    if failed == 0 {
        println!("{} {}\n", "✓".green().bold(), tally.green().bold());
    } else {
        println!("{} {}\n", "✗".red().bold(), tally.red().bold());
    }

    failed == 0
}
