//! CLI command handling
//!
//! Builds the session from config and flags, dispatches CLI commands to the
//! driver and formats output.

use std::time::Duration;

use crate::commands::{Commands, GlobalOptions};
use crate::common::config::Config;
use crate::common::{paths, Error, Result};
use crate::device::{self, dump, Locator, UiTree};
use crate::driver::{UiDriver, WaitSettings};
use crate::testing::{self, suite::ChangeTextSuite, TestResult};

/// Load the config file and apply command-line overrides
fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load()?;

    if let Some(backend) = opts.backend {
        config.device.backend = backend;
    }
    if let Some(serial) = &opts.serial {
        config.device.serial = Some(serial.clone());
    }
    if let Some(ms) = opts.timeout_ms {
        config.timeouts.wait_ms = ms;
    }

    tracing::debug!(
        "Backend {:?}, wait timeout {} ms",
        config.device.backend,
        config.timeouts.wait_ms
    );
    Ok(config)
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, opts: GlobalOptions) -> Result<()> {
    // Log handling needs neither config nor device
    if let Commands::Logs { lines, clear } = command {
        return show_logs(lines, clear);
    }

    let config = load_config(&opts)?;
    let backend = device::connect(&config)?;
    let driver = UiDriver::new(backend, WaitSettings::from(&config.timeouts));
    let package = config.target.package.clone();

    match command {
        Commands::Run {
            package: target,
            warm,
        } => {
            let target = target.unwrap_or(package);
            let cold_start = config.target.cold_start && !warm;
            let suite = ChangeTextSuite::new(&driver, target, cold_start);
            let results = suite.run_all().await;
            finish(&results)
        }

        Commands::Test { paths } => {
            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                // A broken file fails only itself
                let result = match testing::run_scenario(&driver, path, &config.target, opts.verbose)
                    .await
                {
                    Ok(result) => result,
                    Err(e) => TestResult {
                        name: path.display().to_string(),
                        passed: false,
                        error: Some(e.to_string()),
                        elapsed: Duration::ZERO,
                    },
                };
                results.push(result);
            }
            finish(&results)
        }

        Commands::Dump { json, xml } => {
            let tree = driver.snapshot().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else if xml {
                println!("{}", dump::render_dump(&tree));
            } else {
                print_tree(&tree);
            }
            Ok(())
        }

        Commands::Home => {
            let elapsed = driver.reset_to_home_screen().await?.into_result("launcher")?;
            println!("On home screen ({} ms)", elapsed.as_millis());
            Ok(())
        }

        Commands::Launch { package } => {
            let elapsed = driver
                .ensure_app_foreground(&package)
                .await?
                .into_result(&package)?;
            println!("{} in foreground ({} ms)", package, elapsed.as_millis());
            Ok(())
        }

        Commands::Stop { package } => {
            driver.stop_app(&package).await?;
            println!("{} stopped", package);
            Ok(())
        }

        Commands::SetText { key, text } => {
            let locator = Locator::parse(&key, &package);
            driver.set_element_text(&locator, &text).await?;
            println!("{} = {:?}", locator, text);
            Ok(())
        }

        Commands::GetText { key } => {
            let locator = Locator::parse(&key, &package);
            let text = driver.read_element_text(&locator).await?;
            println!("{}", text);
            Ok(())
        }

        Commands::Tap { key } => {
            let locator = Locator::parse(&key, &package);
            driver.tap_element(&locator).await?;
            println!("Tapped {}", locator);
            Ok(())
        }

        Commands::WaitFor { key } => {
            let locator = Locator::parse(&key, &package);
            let what = locator.to_string();
            let elapsed = driver
                .wait_for_element(&locator, driver.timeout())
                .await?
                .into_result(&what)?;
            println!("{} present ({} ms)", locator, elapsed.as_millis());
            Ok(())
        }

        Commands::Logs { .. } => unreachable!("handled above"),
    }
}

/// Print the summary and turn failures into a non-zero exit
fn finish(results: &[TestResult]) -> Result<()> {
    if testing::print_summary(results) {
        Ok(())
    } else {
        let failed = results.iter().filter(|r| !r.passed).count();
        Err(Error::TestAssertion(format!(
            "{} of {} scenarios failed",
            failed,
            results.len()
        )))
    }
}

fn print_tree(tree: &UiTree) {
    if tree.is_empty() {
        println!("(empty hierarchy)");
        return;
    }

    println!("Packages: {}", tree.packages().join(", "));
    for node in &tree.nodes {
        let indent = "  ".repeat(node.depth);
        let class = node.class.rsplit('.').next().unwrap_or(&node.class);
        let mut line = format!("{}{}", indent, class);
        if let Some(key) = node.key() {
            line.push_str(&format!(" #{}", key));
        }
        if !node.text.is_empty() {
            line.push_str(&format!(" {:?}", node.text));
        }
        if node.focused {
            line.push_str(" [focused]");
        }
        println!("{} {}", line, node.bounds);
    }
}

fn show_logs(lines: usize, clear: bool) -> Result<()> {
    let Some(path) = paths::session_log_path() else {
        return Err(Error::Config("Could not determine log directory".to_string()));
    };

    if clear {
        crate::common::logging::truncate_session_log()?;
        println!("Session log cleared");
        return Ok(());
    }

    if !path.exists() {
        println!("No session log at {}", path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    for line in &all[start..] {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Bounds, UiNode};

    #[test]
    fn test_finish() {
        let ok = TestResult {
            name: "a".to_string(),
            passed: true,
            error: None,
            elapsed: Duration::ZERO,
        };
        let bad = TestResult {
            name: "b".to_string(),
            passed: false,
            error: Some("boom".to_string()),
            elapsed: Duration::ZERO,
        };
        assert!(finish(&[ok.clone()]).is_ok());
        let err = finish(&[ok, bad]).unwrap_err();
        assert_eq!(err.to_string(), "Test assertion failed: 1 of 2 scenarios failed");
    }

    #[test]
    fn test_print_tree_handles_empty_and_nodes() {
        print_tree(&UiTree::default());
        print_tree(&UiTree::new(vec![UiNode {
            class: "android.widget.TextView".to_string(),
            resource_id: "p:id/text".to_string(),
            text: "Netology".to_string(),
            bounds: Bounds::new(0, 0, 10, 10),
            ..Default::default()
        }]));
    }
}
