//! uidriver - black-box UI automation for Android apps
//!
//! A small driver over `adb` and `uiautomator` (or an in-memory device)
//! that finds elements by resource id, reads and writes their text and
//! taps them, with bounded waits for screens that render asynchronously.

pub mod cli;
pub mod commands;
pub mod common;
pub mod device;
pub mod driver;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use device::{Locator, UiBackend};
pub use driver::{UiDriver, WaitOutcome, WaitSettings};
