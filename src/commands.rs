//! CLI command definitions
//!
//! Defines the clap commands for the uidriver CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::common::config::BackendKind;

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Device backend (default: from config, else adb)
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Device serial passed to `adb -s`
    #[arg(long, global = true)]
    pub serial: Option<String>,

    /// Timeout for every wait, in milliseconds
    #[arg(long = "timeout-ms", global = true)]
    pub timeout_ms: Option<u64>,

    /// Debug logging and detailed step output
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the built-in change-text suite
    Run {
        /// Package of the app under test (default: from config)
        #[arg(long)]
        package: Option<String>,

        /// Keep the app running between scenarios
        #[arg(long)]
        warm: bool,
    },

    /// Run YAML test scenarios
    Test {
        /// Paths to the YAML scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the current UI hierarchy
    Dump {
        /// Output as JSON
        #[arg(long, conflicts_with = "xml")]
        json: bool,

        /// Output as uiautomator XML
        #[arg(long)]
        xml: bool,
    },

    /// Press home and wait for the launcher
    Home,

    /// Launch or foreground an app and wait for it
    Launch {
        /// Package name
        package: String,
    },

    /// Force-stop an app
    Stop {
        /// Package name
        package: String,
    },

    /// Replace the text of an element
    #[command(name = "set-text")]
    SetText {
        /// Element key (relative to the target package) or full resource id
        key: String,

        /// Text to enter, may be empty
        text: String,
    },

    /// Print the text of an element
    #[command(name = "get-text")]
    GetText {
        /// Element key (relative to the target package) or full resource id
        key: String,
    },

    /// Tap an element
    Tap {
        /// Element key (relative to the target package) or full resource id
        key: String,
    },

    /// Wait for an element to appear
    #[command(name = "wait-for")]
    WaitFor {
        /// Element key (relative to the target package) or full resource id
        key: String,
    },

    /// View the session log of suite and scenario runs
    Logs {
        /// Number of lines to show (default: 50)
        #[arg(long, short = 'n', default_value = "50")]
        lines: usize,

        /// Clear the log file
        #[arg(long)]
        clear: bool,
    },
}

impl Commands {
    /// Whether this command runs scenarios and gets a session log
    pub fn is_session(&self) -> bool {
        matches!(self, Commands::Run { .. } | Commands::Test { .. })
    }
}
