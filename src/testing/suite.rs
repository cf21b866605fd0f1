//! Built-in change-text suite
//!
//! Black-box scenarios for the change-text demo app. Each scenario starts
//! from the launcher, brings the app to the front and checks what the text
//! views show after an input and a button tap.

use colored::Colorize;
use tokio::time::Instant;

use crate::common::{Error, Result};
use crate::device::{Locator, UiBackend};
use crate::driver::UiDriver;

use super::TestResult;

pub use crate::common::config::keys;

pub const TEXT_TO_SET: &str = "Netology";
pub const EMPTY_TEXT: &str = "";
pub const WHITESPACE_TEXT: &str = "     ";

/// Back presses tried before a warm app is restarted instead
const MAX_BACK_PRESSES: usize = 3;

/// Scenario identifiers, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    EmptyInputLeavesTextUnchanged,
    ChangeText,
    OpenNewScreen,
    OpenNewScreenWithWhitespace,
    ChangeTextTwice,
}

impl Case {
    pub const ALL: [Case; 5] = [
        Case::EmptyInputLeavesTextUnchanged,
        Case::ChangeText,
        Case::OpenNewScreen,
        Case::OpenNewScreenWithWhitespace,
        Case::ChangeTextTwice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Case::EmptyInputLeavesTextUnchanged => "empty input leaves text unchanged",
            Case::ChangeText => "change text",
            Case::OpenNewScreen => "open new screen with text",
            Case::OpenNewScreenWithWhitespace => "open new screen with whitespace",
            Case::ChangeTextTwice => "change text twice",
        }
    }
}

/// Suite bound to one driver session and one target package
pub struct ChangeTextSuite<'a, B> {
    driver: &'a UiDriver<B>,
    package: String,
    cold_start: bool,
}

impl<'a, B: UiBackend> ChangeTextSuite<'a, B> {
    pub fn new(driver: &'a UiDriver<B>, package: impl Into<String>, cold_start: bool) -> Self {
        Self {
            driver,
            package: package.into(),
            cold_start,
        }
    }

    fn locator(&self, key: &str) -> Locator {
        Locator::new(&self.package, key)
    }

    /// Launcher first, then the app under test on its entry screen
    async fn set_up(&self) -> Result<()> {
        self.driver.reset_to_home_screen().await?;
        if self.cold_start {
            self.driver.stop_app(&self.package).await?;
        }
        self.driver.ensure_app_foreground(&self.package).await?;

        // A warm task resumes on whatever screen an earlier scenario opened
        if !self.cold_start
            && !self
                .driver
                .navigate_back_to(&self.locator(keys::USER_INPUT), MAX_BACK_PRESSES)
                .await?
        {
            tracing::warn!("{} did not return to its entry screen, restarting it", self.package);
            self.driver.stop_app(&self.package).await?;
            self.driver.ensure_app_foreground(&self.package).await?;
        }
        Ok(())
    }

    async fn input_text_and_click(&self, text: &str, button: &str) -> Result<()> {
        self.driver
            .set_element_text(&self.locator(keys::USER_INPUT), text)
            .await?;
        self.driver.tap_element(&self.locator(button)).await
    }

    async fn current_text(&self, key: &str) -> Result<String> {
        self.driver.read_element_text(&self.locator(key)).await
    }

    /// Enter `text`, open the result screen and return what it shows
    async fn input_text_and_open_new_screen(&self, text: &str) -> Result<String> {
        self.input_text_and_click(text, keys::BUTTON_ACTIVITY).await?;

        let result = self.locator(keys::RESULT_TEXT);
        if !self.driver.wait_for_new_screen(&result).await? {
            return Err(Error::TestAssertion(format!(
                "New screen with {} did not open within {} ms",
                result,
                self.driver.timeout().as_millis()
            )));
        }
        self.current_text(keys::RESULT_TEXT).await
    }

    fn expect(&self, key: &str, expected: &str, actual: &str) -> Result<()> {
        if actual != expected {
            return Err(Error::text_mismatch(&self.locator(key), expected, actual));
        }
        Ok(())
    }

    async fn empty_input_leaves_text_unchanged(&self) -> Result<()> {
        let before = self.current_text(keys::TEXT_TO_BE_CHANGED).await?;
        self.input_text_and_click(EMPTY_TEXT, keys::BUTTON_CHANGE).await?;
        let after = self.current_text(keys::TEXT_TO_BE_CHANGED).await?;
        self.expect(keys::TEXT_TO_BE_CHANGED, &before, &after)
    }

    async fn change_text(&self) -> Result<()> {
        self.input_text_and_click(TEXT_TO_SET, keys::BUTTON_CHANGE).await?;
        let after = self.current_text(keys::TEXT_TO_BE_CHANGED).await?;
        self.expect(keys::TEXT_TO_BE_CHANGED, TEXT_TO_SET, &after)
    }

    async fn open_new_screen(&self) -> Result<()> {
        let shown = self.input_text_and_open_new_screen(TEXT_TO_SET).await?;
        self.expect(keys::RESULT_TEXT, TEXT_TO_SET, &shown)
    }

    async fn open_new_screen_with_whitespace(&self) -> Result<()> {
        let shown = self.input_text_and_open_new_screen(WHITESPACE_TEXT).await?;
        self.expect(keys::RESULT_TEXT, WHITESPACE_TEXT, &shown)
    }

    async fn change_text_twice(&self) -> Result<()> {
        self.input_text_and_click(TEXT_TO_SET, keys::BUTTON_CHANGE).await?;
        self.input_text_and_click(TEXT_TO_SET, keys::BUTTON_CHANGE).await?;
        let after = self.current_text(keys::TEXT_TO_BE_CHANGED).await?;
        self.expect(keys::TEXT_TO_BE_CHANGED, TEXT_TO_SET, &after)
    }

    /// Run one scenario including its setup
    pub async fn run_case(&self, case: Case) -> TestResult {
        let started = Instant::now();
        tracing::info!("Scenario: {}", case.name());

        let outcome: Result<()> = async {
            self.set_up().await?;
            match case {
                Case::EmptyInputLeavesTextUnchanged => {
                    self.empty_input_leaves_text_unchanged().await
                }
                Case::ChangeText => self.change_text().await,
                Case::OpenNewScreen => self.open_new_screen().await,
                Case::OpenNewScreenWithWhitespace => self.open_new_screen_with_whitespace().await,
                Case::ChangeTextTwice => self.change_text_twice().await,
            }
        }
        .await;

        match &outcome {
            Ok(()) => println!("  {} {}", "✓".green(), case.name()),
            Err(e) => {
                println!("  {} {}", "✗".red(), case.name());
                tracing::info!("Scenario '{}' failed: {}", case.name(), e);
            }
        }

        TestResult {
            name: case.name().to_string(),
            passed: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
            elapsed: started.elapsed(),
        }
    }

    /// Run every scenario; a failure never stops the ones after it
    pub async fn run_all(&self) -> Vec<TestResult> {
        println!(
            "\n{} {}",
            "Running Suite:".blue().bold(),
            self.package.white().bold()
        );

        let mut results = Vec::with_capacity(Case::ALL.len());
        for case in Case::ALL {
            results.push(self.run_case(case).await);
        }
        results
    }
}
