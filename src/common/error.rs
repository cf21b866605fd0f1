//! Error types for the UI driver
//!
//! Messages are meant to be read by whoever is looking at a failed run,
//! with a hint on the usual cause where there is one.

use std::io;
use thiserror::Error;

use crate::device::Locator;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the UI driver
#[derive(Error, Debug)]
pub enum Error {
    // === Lookup Errors ===
    #[error("Element not found: {locator}. The screen may not have finished loading")]
    ElementNotFound { locator: String },

    #[error("Element {locator} cannot {action}")]
    ElementNotInteractable { locator: String, action: String },

    // === Wait Errors ===
    #[error("Timed out after {timeout_ms} ms waiting for {what}")]
    WaitTimeout { what: String, timeout_ms: u64 },

    // === Device Errors ===
    #[error("adb executable not found. Searched: {searched}. Set device.adb_path in the config file")]
    AdbNotFound { searched: String },

    #[error("adb {command} failed ({status}): {stderr}")]
    AdbCommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Device command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Could not parse UI hierarchy dump: {0}")]
    DumpParse(String),

    #[error("Device error: {0}")]
    Device(String),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an element not found error for a locator
    pub fn element_not_found(locator: &Locator) -> Self {
        Self::ElementNotFound {
            locator: locator.to_string(),
        }
    }

    /// Create an adb not found error with search locations
    pub fn adb_not_found<S: AsRef<str>>(paths: &[S]) -> Self {
        Self::AdbNotFound {
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create an adb command failed error
    pub fn adb_failed(command: &str, status: &str, stderr: &str) -> Self {
        Self::AdbCommandFailed {
            command: command.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }

    /// Create a text mismatch assertion error
    pub fn text_mismatch(locator: &Locator, expected: &str, actual: &str) -> Self {
        Self::TestAssertion(format!(
            "{}: expected text {:?}, got {:?}",
            locator, expected, actual
        ))
    }

    /// Whether this error is a failed element lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_names_resource_id() {
        let locator = Locator::new("com.example", "userInput");
        let err = Error::element_not_found(&locator);
        assert!(err.is_not_found());
        assert!(err.to_string().contains("com.example:id/userInput"));
    }

    #[test]
    fn test_text_mismatch_quotes_whitespace() {
        let locator = Locator::new("com.example", "text");
        let err = Error::text_mismatch(&locator, "     ", "");
        assert_eq!(
            err.to_string(),
            "Test assertion failed: com.example:id/text: expected text \"     \", got \"\""
        );
    }

    #[test]
    fn test_adb_not_found_lists_paths() {
        let err = Error::adb_not_found(&["/opt/adb", "PATH"]);
        assert!(err.to_string().contains("/opt/adb, PATH"));
    }
}
