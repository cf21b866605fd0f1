//! adb-backed device
//!
//! Every operation is one or more `adb` invocations against the device
//! shell. The UI hierarchy comes from `uiautomator dump`, taps go through
//! `input tap` at the center of a node's bounds and text through
//! `input text`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::common::{Error, Result};

use super::dump;
use super::{UiBackend, UiNode, UiTree};

/// Device or emulator reached through the adb executable
pub struct AdbBackend {
    /// Path to adb
    adb: PathBuf,
    /// Serial passed as `-s` when several devices are attached
    serial: Option<String>,
    /// Ceiling for a single adb invocation
    command_timeout: Duration,
    /// Home screen package, resolved once per session
    launcher: OnceCell<String>,
}

impl AdbBackend {
    pub fn new(adb: PathBuf, serial: Option<String>, command_timeout: Duration) -> Self {
        Self {
            adb,
            serial,
            command_timeout,
            launcher: OnceCell::new(),
        }
    }

    /// Run adb with the given arguments and return its stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let command_line = args.join(" ");
        tracing::trace!("adb {}", command_line);

        let output = tokio::time::timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(self.command_timeout.as_secs()))?
            .map_err(|e| {
                Error::Device(format!("Failed to run {}: {}", self.adb.display(), e))
            })?;

        if !output.status.success() {
            return Err(Error::adb_failed(
                &command_line,
                &output.status.to_string(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shell(&self, args: &[&str]) -> Result<String> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run(&full).await
    }

    async fn tap_at(&self, x: i32, y: i32) -> Result<()> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UiBackend for AdbBackend {
    async fn launch_app(&self, package: &str) -> Result<()> {
        let out = self
            .shell(&[
                "monkey",
                "-p",
                package,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ])
            .await?;
        if out.contains("No activities found") {
            return Err(Error::Device(format!(
                "No launchable activity for package '{}'",
                package
            )));
        }
        Ok(())
    }

    async fn force_stop(&self, package: &str) -> Result<()> {
        self.shell(&["am", "force-stop", package]).await?;
        Ok(())
    }

    async fn press_home(&self) -> Result<()> {
        self.shell(&["input", "keyevent", "KEYCODE_HOME"]).await?;
        Ok(())
    }

    async fn press_back(&self) -> Result<()> {
        self.shell(&["input", "keyevent", "KEYCODE_BACK"]).await?;
        Ok(())
    }

    async fn launcher_package(&self) -> Result<String> {
        self.launcher
            .get_or_try_init(|| async {
                let out = self
                    .shell(&[
                        "cmd",
                        "package",
                        "resolve-activity",
                        "--brief",
                        "-a",
                        "android.intent.action.MAIN",
                        "-c",
                        "android.intent.category.HOME",
                    ])
                    .await?;
                let package = parse_resolved_package(&out).ok_or_else(|| {
                    Error::Device(format!("Could not resolve home activity from: {}", out.trim()))
                })?;
                tracing::debug!("Launcher package is {}", package);
                Ok::<_, Error>(package)
            })
            .await
            .cloned()
    }

    async fn snapshot(&self) -> Result<UiTree> {
        let out = self
            .run(&["exec-out", "uiautomator", "dump", "/dev/tty"])
            .await?;
        dump::parse_dump(&out)
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> Result<()> {
        // Focus the field, then clear what it currently shows
        let (x, y) = node.bounds.center();
        self.tap_at(x, y).await?;

        let existing = node.text.chars().count();
        if existing > 0 {
            self.shell(&["input", "keyevent", "KEYCODE_MOVE_END"]).await?;
            let mut args = vec!["input", "keyevent"];
            args.extend(std::iter::repeat("KEYCODE_DEL").take(existing));
            self.shell(&args).await?;
        }

        if !text.is_empty() {
            if !text.is_ascii() {
                tracing::warn!("`input text` only handles ASCII; non-ASCII characters may be dropped");
            }
            for chunk in input_text_chunks(text) {
                self.shell(&["input", "text", &chunk]).await?;
            }
        }
        Ok(())
    }

    async fn click(&self, node: &UiNode) -> Result<()> {
        if node.bounds.is_empty() {
            return Err(Error::ElementNotInteractable {
                locator: node.resource_id.clone(),
                action: "be tapped: it has no on-screen area".to_string(),
            });
        }
        let (x, y) = node.bounds.center();
        self.tap_at(x, y).await
    }
}

/// Escape text for `input text`
///
/// The argument goes through the device shell, and `input` itself decodes
/// `%s` as a space.
pub fn escape_input_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '\\' | '\'' | '"' | '(' | ')' | '&' | '<' | '>' | ';' | '|' | '*' | '~' | '$'
            | '`' | '?' | '[' | ']' | '{' | '}' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escaped `input text` arguments that together type `text`
///
/// `input` turns every `%s` it receives into a space, and a literal `%s`
/// cannot be escaped. Each literal `%s` is split so that `%` ends one
/// argument and `s` starts the next.
pub fn input_text_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some(i) = rest.find("%s") {
        chunks.push(escape_input_text(&rest[..=i]));
        rest = &rest[i + 1..];
    }
    if !rest.is_empty() {
        chunks.push(escape_input_text(rest));
    }
    chunks
}

/// Package part of the component printed by `cmd package resolve-activity --brief`
pub fn parse_resolved_package(output: &str) -> Option<String> {
    let component = output.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    let (package, _) = component.split_once('/')?;
    if package.is_empty() || package.contains(char::is_whitespace) {
        return None;
    }
    Some(package.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_spaces_as_percent_s() {
        assert_eq!(escape_input_text("     "), "%s%s%s%s%s");
        assert_eq!(escape_input_text("Netology"), "Netology");
        assert_eq!(escape_input_text("a b"), "a%sb");
    }

    #[test]
    fn test_escape_shell_metacharacters() {
        assert_eq!(escape_input_text("it's $5 & (more)"), "it\\'s%s\\$5%s\\&%s\\(more\\)");
    }

    #[test]
    fn test_literal_percent_s_is_split() {
        assert_eq!(input_text_chunks("Netology"), vec!["Netology"]);
        assert_eq!(input_text_chunks("100%s"), vec!["100%", "s"]);
        assert_eq!(input_text_chunks("%s%s"), vec!["%", "s%", "s"]);
        assert_eq!(input_text_chunks("a %s b"), vec!["a%s%", "s%sb"]);
        // A lone percent sign needs no split
        assert_eq!(input_text_chunks("50% off"), vec!["50%%soff"]);
        assert!(input_text_chunks("").is_empty());
    }

    #[test]
    fn test_parse_resolved_package() {
        let out = "priority=0 preferredOrder=0 match=0x108000 specificIndex=-1 isDefault=false\n\
                   com.google.android.apps.nexuslauncher/.NexusLauncherActivity\n";
        assert_eq!(
            parse_resolved_package(out).as_deref(),
            Some("com.google.android.apps.nexuslauncher")
        );
    }

    #[test]
    fn test_parse_resolved_package_without_match() {
        assert!(parse_resolved_package("No activity found\n").is_none());
        assert!(parse_resolved_package("").is_none());
    }

    #[tokio::test]
    async fn test_missing_executable_is_device_error() {
        let backend = AdbBackend::new(
            PathBuf::from("/nonexistent/adb"),
            None,
            Duration::from_secs(5),
        );
        let err = backend.press_home().await.unwrap_err();
        assert!(matches!(err, Error::Device(_)));
    }
}
