//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.
//!
//! ```yaml
//! name: Change text
//! target:
//!   package: ru.netology.testing.uiautomator
//! steps:
//!   - action: launch
//!   - action: set_text
//!     key: userInput
//!     text: Netology
//!   - action: tap
//!     key: buttonChange
//!   - action: assert_text
//!     key: textToBeChanged
//!     equals: Netology
//! ```

use serde::Deserialize;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Application under test; falls back to the configured target
    #[serde(default)]
    pub target: TargetConfig,
    /// The sequence of test steps to execute
    pub steps: Vec<TestStep>,
}

/// Application under test for one scenario
#[derive(Deserialize, Debug, Default)]
pub struct TargetConfig {
    /// Package that bare element keys belong to
    pub package: Option<String>,
    /// Force-stop the app before the first step
    pub cold_start: Option<bool>,
}

/// A single test step in the execution flow
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Press home and wait for the launcher
    Home {
        /// Fail the step if the launcher never shows up
        #[serde(default)]
        require: bool,
    },
    /// Launch or foreground an app and wait for it
    Launch {
        /// Package to launch (default: scenario target)
        package: Option<String>,
        /// Fail the step if the app never shows up
        #[serde(default)]
        require: bool,
    },
    /// Press back once
    Back,
    /// Force-stop an app
    Stop {
        /// Package to stop (default: scenario target)
        package: Option<String>,
    },
    /// Replace the text of an input field
    SetText {
        /// Element key or full resource id
        key: String,
        /// Text to enter, may be empty
        #[serde(default)]
        text: String,
    },
    /// Tap an element
    Tap {
        /// Element key or full resource id
        key: String,
    },
    /// Wait for an element to appear
    WaitFor {
        /// Element key or full resource id
        key: String,
        /// Timeout in milliseconds (default: configured wait timeout)
        timeout_ms: Option<u64>,
        /// Expected presence once the wait ends (default: true)
        #[serde(default = "default_present")]
        present: bool,
    },
    /// Remember the current text of an element
    ReadText {
        /// Element key or full resource id
        key: String,
        /// Name to store the text under
        save_as: String,
    },
    /// Check the text of an element
    AssertText {
        /// Element key or full resource id
        key: String,
        /// Expected exact text
        equals: Option<String>,
        /// Expected to equal a value stored by `read_text`
        equals_saved: Option<String>,
        /// Expected substring
        contains: Option<String>,
    },
}

fn default_present() -> bool {
    true
}

impl TestStep {
    /// Short description for progress output
    pub fn describe(&self) -> String {
        match self {
            TestStep::Home { .. } => "home".to_string(),
            TestStep::Launch { package, .. } => match package {
                Some(p) => format!("launch {}", p),
                None => "launch".to_string(),
            },
            TestStep::Back => "back".to_string(),
            TestStep::Stop { package } => match package {
                Some(p) => format!("stop {}", p),
                None => "stop".to_string(),
            },
            TestStep::SetText { key, text } => format!("set_text {} = {:?}", key, text),
            TestStep::Tap { key } => format!("tap {}", key),
            TestStep::WaitFor { key, present, .. } => {
                if *present {
                    format!("wait_for {}", key)
                } else {
                    format!("wait_for {} (absent)", key)
                }
            }
            TestStep::ReadText { key, save_as } => format!("read_text {} -> {}", key, save_as),
            TestStep::AssertText { key, .. } => format!("assert_text {}", key),
        }
    }
}
