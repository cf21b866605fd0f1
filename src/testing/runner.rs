//! Test runner implementation
//!
//! Executes YAML test scenarios against a driver session, asserting on the
//! text of elements found in the UI hierarchy.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use tokio::time::Instant;

use crate::common::config::TargetDefaults;
use crate::common::{Error, Result};
use crate::device::{Locator, UiBackend};
use crate::driver::UiDriver;

use super::config::{TestScenario, TestStep};
use super::TestResult;

/// Load and parse a scenario file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))
}

/// Run a test scenario from a YAML file
pub async fn run_scenario<B: UiBackend>(
    driver: &UiDriver<B>,
    path: &Path,
    defaults: &TargetDefaults,
    verbose: bool,
) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    Ok(execute_scenario(driver, &scenario, defaults, verbose).await)
}

/// Per-scenario execution state
struct StepContext<'a, B> {
    driver: &'a UiDriver<B>,
    package: String,
    saved: HashMap<String, String>,
}

impl<B: UiBackend> StepContext<'_, B> {
    fn locator(&self, key: &str) -> Locator {
        Locator::parse(key, &self.package)
    }

    fn package_or_target<'p>(&'p self, package: &'p Option<String>) -> &'p str {
        package.as_deref().unwrap_or(&self.package)
    }
}

/// Execute an already loaded scenario
///
/// The session is first returned to the launcher (and the target app
/// force-stopped when cold start is on); steps then run in order and the
/// first failing step ends the scenario.
pub async fn execute_scenario<B: UiBackend>(
    driver: &UiDriver<B>,
    scenario: &TestScenario,
    defaults: &TargetDefaults,
    verbose: bool,
) -> TestResult {
    let started = Instant::now();
    let steps_total = scenario.steps.len();

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );

    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let mut ctx = StepContext {
        driver,
        package: scenario
            .target
            .package
            .clone()
            .unwrap_or_else(|| defaults.package.clone()),
        saved: HashMap::new(),
    };
    let cold_start = scenario.target.cold_start.unwrap_or(defaults.cold_start);

    let fail = |error: Error| TestResult {
        name: scenario.name.clone(),
        passed: false,
        error: Some(error.to_string()),
        elapsed: started.elapsed(),
    };

    // Setup: every scenario starts from the launcher
    if verbose {
        println!("\n{}", "Setup:".cyan());
    }
    if let Err(e) = setup(&ctx, cold_start, verbose).await {
        println!("  {} Setup: {}", "✗".red(), e);
        return fail(e);
    }

    println!("\n{}", "Steps:".cyan());

    for (i, step) in scenario.steps.iter().enumerate() {
        let step_num = i + 1;

        if let Err(e) = execute_step(&mut ctx, step).await {
            println!("  {} Step {}: {}", "✗".red(), step_num, e);
            tracing::info!(
                "Scenario '{}' failed at step {}/{}",
                scenario.name,
                step_num,
                steps_total
            );
            return fail(e);
        }

        println!(
            "  {} Step {}: {}",
            "✓".green(),
            step_num,
            step.describe().dimmed()
        );
    }

    println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());

    TestResult {
        name: scenario.name.clone(),
        passed: true,
        error: None,
        elapsed: started.elapsed(),
    }
}

async fn setup<B: UiBackend>(ctx: &StepContext<'_, B>, cold_start: bool, verbose: bool) -> Result<()> {
    let outcome = ctx.driver.reset_to_home_screen().await?;
    if verbose {
        println!("  {} home ({:?})", "✓".green(), outcome);
    }

    if cold_start {
        ctx.driver.stop_app(&ctx.package).await?;
        if verbose {
            println!("  {} stop {}", "✓".green(), ctx.package.dimmed());
        }
    }
    Ok(())
}

/// Execute a single test step
async fn execute_step<B: UiBackend>(ctx: &mut StepContext<'_, B>, step: &TestStep) -> Result<()> {
    match step {
        TestStep::Home { require } => {
            let outcome = ctx.driver.reset_to_home_screen().await?;
            if *require {
                outcome.into_result("launcher")?;
            }
            Ok(())
        }

        TestStep::Launch { package, require } => {
            let package = ctx.package_or_target(package);
            let outcome = ctx.driver.ensure_app_foreground(package).await?;
            if *require {
                outcome.into_result(package)?;
            }
            Ok(())
        }

        TestStep::Back => ctx.driver.press_back().await,

        TestStep::Stop { package } => {
            let package = ctx.package_or_target(package);
            ctx.driver.stop_app(package).await
        }

        TestStep::SetText { key, text } => {
            ctx.driver.set_element_text(&ctx.locator(key), text).await
        }

        TestStep::Tap { key } => ctx.driver.tap_element(&ctx.locator(key)).await,

        TestStep::WaitFor {
            key,
            timeout_ms,
            present,
        } => {
            let locator = ctx.locator(key);
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| ctx.driver.timeout());
            let outcome = ctx.driver.wait_for_element(&locator, timeout).await?;

            if outcome.is_ready() != *present {
                let state = if *present { "appear" } else { "stay absent" };
                return Err(Error::TestAssertion(format!(
                    "Expected {} to {} within {} ms",
                    locator,
                    state,
                    timeout.as_millis()
                )));
            }
            Ok(())
        }

        TestStep::ReadText { key, save_as } => {
            let text = ctx.driver.read_element_text(&ctx.locator(key)).await?;
            ctx.saved.insert(save_as.clone(), text);
            Ok(())
        }

        TestStep::AssertText {
            key,
            equals,
            equals_saved,
            contains,
        } => {
            let locator = ctx.locator(key);
            let actual = ctx.driver.read_element_text(&locator).await?;

            if let Some(expected) = equals {
                if &actual != expected {
                    return Err(Error::text_mismatch(&locator, expected, &actual));
                }
            }

            if let Some(name) = equals_saved {
                let expected = ctx.saved.get(name).ok_or_else(|| {
                    Error::Config(format!("No text saved as '{}' by an earlier read_text", name))
                })?;
                if &actual != expected {
                    return Err(Error::text_mismatch(&locator, expected, &actual));
                }
            }

            if let Some(expected_substr) = contains {
                if !actual.contains(expected_substr.as_str()) {
                    return Err(Error::TestAssertion(format!(
                        "{}: expected text containing {:?}, got {:?}",
                        locator, expected_substr, actual
                    )));
                }
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FakeDevice;
    use crate::driver::WaitSettings;

    fn driver() -> UiDriver<FakeDevice> {
        UiDriver::new(
            FakeDevice::with_demo_app().with_render_delay(1),
            WaitSettings {
                timeout: Duration::from_millis(500),
                poll_interval: Duration::from_millis(1),
            },
        )
    }

    fn scenario(yaml: &str) -> TestScenario {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn test_empty_input_keeps_saved_text() {
        let s = scenario(
            r#"
name: empty input
steps:
  - action: launch
    require: true
  - action: read_text
    key: textToBeChanged
    save_as: before
  - action: set_text
    key: userInput
    text: ""
  - action: tap
    key: buttonChange
  - action: assert_text
    key: textToBeChanged
    equals_saved: before
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(result.passed, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_open_screen_with_full_resource_ids() {
        let s = scenario(
            r#"
name: open screen
target:
  package: com.unrelated
steps:
  - action: launch
    package: ru.netology.testing.uiautomator
  - action: set_text
    key: ru.netology.testing.uiautomator:id/userInput
    text: Netology
  - action: tap
    key: ru.netology.testing.uiautomator:id/buttonActivity
  - action: wait_for
    key: ru.netology.testing.uiautomator:id/text
  - action: assert_text
    key: ru.netology.testing.uiautomator:id/text
    equals: Netology
    contains: Net
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), true).await;
        assert!(result.passed, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_back_returns_to_main_screen() {
        let s = scenario(
            r#"
name: back
steps:
  - action: launch
  - action: set_text
    key: userInput
    text: Netology
  - action: tap
    key: buttonActivity
  - action: wait_for
    key: text
  - action: back
  - action: wait_for
    key: userInput
  - action: wait_for
    key: text
    timeout_ms: 20
    present: false
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(result.passed, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_mismatch_fails_scenario() {
        let s = scenario(
            r#"
name: wrong expectation
steps:
  - action: launch
  - action: assert_text
    key: textToBeChanged
    equals: Netology
  - action: tap
    key: buttonChange
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(!result.passed);
        let error = result.error.unwrap();
        assert!(error.contains("expected text \"Netology\""), "{}", error);
    }

    #[tokio::test]
    async fn test_missing_element_without_launch() {
        let s = scenario(
            r#"
name: no launch
steps:
  - action: tap
    key: buttonChange
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(!result.passed);
        assert!(result.error.unwrap().contains("Element not found"));
    }

    #[tokio::test]
    async fn test_wait_for_absent() {
        let s = scenario(
            r#"
name: no new screen
steps:
  - action: launch
  - action: wait_for
    key: text
    timeout_ms: 20
    present: false
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(result.passed, "{:?}", result.error);
    }

    #[tokio::test]
    async fn test_unknown_saved_name() {
        let s = scenario(
            r#"
name: typo
steps:
  - action: launch
  - action: assert_text
    key: textToBeChanged
    equals_saved: befor
"#,
        );
        let result = execute_scenario(&driver(), &s, &TargetDefaults::default(), false).await;
        assert!(result.error.unwrap().contains("No text saved as 'befor'"));
    }

    #[tokio::test]
    async fn test_run_scenario_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("change.yaml");
        std::fs::write(
            &path,
            "name: change\nsteps:\n  - action: launch\n  - action: set_text\n    key: userInput\n    text: Netology\n  - action: tap\n    key: buttonChange\n  - action: assert_text\n    key: textToBeChanged\n    equals: Netology\n",
        )
        .unwrap();

        let result = run_scenario(&driver(), &path, &TargetDefaults::default(), false)
            .await
            .unwrap();
        assert!(result.passed, "{:?}", result.error);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_scenario(Path::new("/nonexistent/scenario.yaml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
