//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Package of the change-text demo application
pub const DEFAULT_TARGET_PACKAGE: &str = "ru.netology.testing.uiautomator";

/// Resource id keys of the change-text app
pub mod keys {
    /// Input field on the main screen
    pub const USER_INPUT: &str = "userInput";
    /// Copies the input into [`TEXT_TO_BE_CHANGED`]
    pub const BUTTON_CHANGE: &str = "buttonChange";
    /// Opens the result screen
    pub const BUTTON_ACTIVITY: &str = "buttonActivity";
    /// Text view on the main screen
    pub const TEXT_TO_BE_CHANGED: &str = "textToBeChanged";
    /// Text view on the result screen
    pub const RESULT_TEXT: &str = "text";
    /// What [`TEXT_TO_BE_CHANGED`] shows on a cold start
    pub const INITIAL_TEXT: &str = "Hello UiAutomator!";
}

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Device connection settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Application under test
    #[serde(default)]
    pub target: TargetDefaults,

    /// In-memory device settings
    #[serde(default)]
    pub fake: FakeConfig,
}

/// Which UI backend drives the session
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Real device or emulator through adb
    #[default]
    Adb,
    /// In-memory device running the demo app
    Fake,
}

/// Device connection settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeviceConfig {
    /// Backend to use
    #[serde(default)]
    pub backend: BackendKind,

    /// Explicit path to the adb executable
    pub adb_path: Option<PathBuf>,

    /// Device serial passed as `adb -s`
    pub serial: Option<String>,
}

impl DeviceConfig {
    /// Resolve the adb executable
    ///
    /// Falls back to searching PATH if not explicitly configured
    pub fn resolve_adb(&self) -> Result<PathBuf> {
        if let Some(path) = &self.adb_path {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(Error::adb_not_found(&[path.display().to_string()]));
        }

        which::which("adb").map_err(|_| Error::adb_not_found(&["PATH"]))
    }
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Ceiling for every bounded wait
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,

    /// Delay between checks of a bounded wait
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Ceiling for a single adb invocation
    #[serde(default = "default_adb_command_secs")]
    pub adb_command_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            wait_ms: default_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            adb_command_secs: default_adb_command_secs(),
        }
    }
}

impl Timeouts {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn adb_command(&self) -> Duration {
        Duration::from_secs(self.adb_command_secs)
    }
}

fn default_wait_ms() -> u64 {
    5000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_adb_command_secs() -> u64 {
    20
}

/// Defaults for the application under test
#[derive(Debug, Deserialize, Clone)]
pub struct TargetDefaults {
    /// Package of the application under test
    #[serde(default = "default_package")]
    pub package: String,

    /// Force-stop the app before each scenario so it starts from its entry screen
    #[serde(default = "default_cold_start")]
    pub cold_start: bool,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            package: default_package(),
            cold_start: default_cold_start(),
        }
    }
}

fn default_package() -> String {
    DEFAULT_TARGET_PACKAGE.to_string()
}
fn default_cold_start() -> bool {
    true
}

/// In-memory device settings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct FakeConfig {
    /// Snapshots that show an empty screen after every transition
    #[serde(default)]
    pub render_delay_polls: u32,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_demo_suite() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.device.backend, BackendKind::Adb);
        assert_eq!(config.timeouts.wait(), Duration::from_millis(5000));
        assert_eq!(config.target.package, DEFAULT_TARGET_PACKAGE);
        assert!(config.target.cold_start);
        assert_eq!(config.fake.render_delay_polls, 0);
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
[device]
backend = "fake"
serial = "emulator-5554"

[timeouts]
wait_ms = 250
"#,
        )
        .unwrap();
        assert_eq!(config.device.backend, BackendKind::Fake);
        assert_eq!(config.device.serial.as_deref(), Some("emulator-5554"));
        assert_eq!(config.timeouts.wait_ms, 250);
        assert_eq!(config.timeouts.poll_interval_ms, 100);
    }

    #[test]
    fn test_load_from_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timeouts]\nwait_ms = \"soon\"").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_missing_adb_path_is_reported() {
        let device = DeviceConfig {
            adb_path: Some(PathBuf::from("/nonexistent/adb")),
            ..Default::default()
        };
        let err = device.resolve_adb().unwrap_err();
        assert!(matches!(err, Error::AdbNotFound { .. }));
    }
}
