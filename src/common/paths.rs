//! Configuration and log file locations
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/uidriver/` and `~/.local/share/uidriver/`
//! - macOS: `~/Library/Application Support/uidriver/`
//! - Windows: `%APPDATA%\uidriver\`

use std::io;
use std::path::PathBuf;

/// Application name used for directory lookups
const APP_NAME: &str = "uidriver";

/// Name of the session log file inside the log directory
pub const SESSION_LOG: &str = "session.log";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.data_dir().join("logs"))
}

/// Get the path to the session log file
pub fn session_log_path() -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(SESSION_LOG))
}

/// Ensure the log directory exists
pub fn ensure_log_dir() -> io::Result<Option<PathBuf>> {
    if let Some(dir) = log_dir() {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(Some(dir))
    } else {
        Ok(None)
    }
}
