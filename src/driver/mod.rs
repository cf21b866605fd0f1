//! UI automation driver
//!
//! [`UiDriver`] is the session object scenarios talk to. It owns a backend
//! and the wait settings, and exposes the interaction protocol used by every
//! scenario: return to the launcher, bring the app under test to the front,
//! then find elements by resource id to read, write and tap them.
//!
//! Only the waits are tolerant of rendering latency. Element operations do a
//! single lookup and fail with [`Error::ElementNotFound`] straight away, so a
//! scenario must have waited for its screen first.

mod wait;

pub use wait::{wait_until, WaitOutcome};

use std::time::Duration;

use crate::common::config::Timeouts;
use crate::common::{Error, Result};
use crate::device::{Locator, UiBackend, UiNode, UiTree};

/// Wait settings applied to every bounded wait of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&Timeouts> for WaitSettings {
    fn from(t: &Timeouts) -> Self {
        Self {
            timeout: t.wait(),
            poll_interval: t.poll_interval(),
        }
    }
}

/// Session over one device
pub struct UiDriver<B> {
    backend: B,
    settings: WaitSettings,
}

impl<B: UiBackend> UiDriver<B> {
    pub fn new(backend: B, settings: WaitSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Timeout applied to every wait
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Press home and wait for the launcher to be on screen
    ///
    /// A launcher that never shows up is reported as `TimedOut`, not as an
    /// error; the next lookup will surface the problem.
    pub async fn reset_to_home_screen(&self) -> Result<WaitOutcome> {
        self.backend.press_home().await?;
        let launcher = self.backend.launcher_package().await?;
        let outcome = self.wait_for_package(&launcher, self.settings.timeout).await?;
        if !outcome.is_ready() {
            tracing::warn!(
                "Launcher {} not visible after {} ms",
                launcher,
                self.settings.timeout.as_millis()
            );
        }
        Ok(outcome)
    }

    /// Launch or foreground `package` and wait for its UI to be on screen
    ///
    /// Same timeout contract as [`reset_to_home_screen`](Self::reset_to_home_screen).
    pub async fn ensure_app_foreground(&self, package: &str) -> Result<WaitOutcome> {
        tracing::debug!("Bringing {} to the front", package);
        self.backend.launch_app(package).await?;
        let outcome = self.wait_for_package(package, self.settings.timeout).await?;
        if !outcome.is_ready() {
            tracing::warn!(
                "{} not visible after {} ms",
                package,
                self.settings.timeout.as_millis()
            );
        }
        Ok(outcome)
    }

    /// Kill `package` so its next launch starts from the entry screen
    pub async fn stop_app(&self, package: &str) -> Result<()> {
        tracing::debug!("Stopping {}", package);
        self.backend.force_stop(package).await
    }

    /// Pop the top screen of the foreground app
    pub async fn press_back(&self) -> Result<()> {
        tracing::debug!("Pressing back");
        self.backend.press_back().await
    }

    /// Press back until `locator` is on screen, at most `max_presses` times
    ///
    /// No press happens when the element is already there. Returns whether
    /// the element was reached.
    pub async fn navigate_back_to(&self, locator: &Locator, max_presses: usize) -> Result<bool> {
        if self.find(locator).await?.is_some() {
            return Ok(true);
        }
        for _ in 0..max_presses {
            self.press_back().await?;
            if self
                .wait_for_element(locator, self.settings.timeout)
                .await?
                .is_ready()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Current UI hierarchy
    pub async fn snapshot(&self) -> Result<UiTree> {
        self.backend.snapshot().await
    }

    /// Single lookup, no waiting
    pub async fn find(&self, locator: &Locator) -> Result<Option<UiNode>> {
        let tree = self.backend.snapshot().await?;
        Ok(tree.find(locator).cloned())
    }

    async fn require(&self, locator: &Locator) -> Result<UiNode> {
        self.find(locator)
            .await?
            .ok_or_else(|| Error::element_not_found(locator))
    }

    /// Replace the text of the element; empty and whitespace-only text pass through as is
    pub async fn set_element_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let node = self.require(locator).await?;
        tracing::debug!("Setting {} to {:?}", locator, text);
        self.backend.set_text(&node, text).await
    }

    /// Text currently displayed by the element
    pub async fn read_element_text(&self, locator: &Locator) -> Result<String> {
        let node = self.require(locator).await?;
        tracing::debug!("{} reads {:?}", locator, node.text);
        Ok(node.text)
    }

    pub async fn tap_element(&self, locator: &Locator) -> Result<()> {
        let node = self.require(locator).await?;
        tracing::debug!("Tapping {}", locator);
        self.backend.click(&node).await
    }

    /// Wait for an element of a newly opened screen; `false` if it never appears
    pub async fn wait_for_new_screen(&self, locator: &Locator) -> Result<bool> {
        let outcome = self.wait_for_element(locator, self.settings.timeout).await?;
        Ok(outcome.is_ready())
    }

    /// Wait for an element with an explicit timeout
    pub async fn wait_for_element(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<WaitOutcome> {
        let outcome = wait_until(timeout, self.settings.poll_interval, move || async move {
            Ok(self.backend.snapshot().await?.find(locator).is_some())
        })
        .await?;
        tracing::debug!("Wait for {}: {:?}", locator, outcome);
        Ok(outcome)
    }

    /// Wait for any node of `package` with an explicit timeout
    pub async fn wait_for_package(&self, package: &str, timeout: Duration) -> Result<WaitOutcome> {
        let outcome = wait_until(timeout, self.settings.poll_interval, move || async move {
            Ok(self.backend.snapshot().await?.has_package(package))
        })
        .await?;
        tracing::debug!("Wait for package {}: {:?}", package, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{keys, DEFAULT_TARGET_PACKAGE};
    use crate::device::fake::FAKE_LAUNCHER;
    use crate::device::FakeDevice;

    const PKG: &str = DEFAULT_TARGET_PACKAGE;

    fn settings(timeout_ms: u64) -> WaitSettings {
        WaitSettings {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(1),
        }
    }

    fn driver(render_delay: u32, timeout_ms: u64) -> UiDriver<FakeDevice> {
        UiDriver::new(
            FakeDevice::with_demo_app().with_render_delay(render_delay),
            settings(timeout_ms),
        )
    }

    fn loc(key: &str) -> Locator {
        Locator::new(PKG, key)
    }

    #[tokio::test]
    async fn test_reset_to_home_screen() {
        let driver = driver(2, 1000);
        driver.ensure_app_foreground(PKG).await.unwrap();

        let outcome = driver.reset_to_home_screen().await.unwrap();
        assert!(outcome.is_ready());
        assert_eq!(driver.backend().foreground_package().unwrap(), FAKE_LAUNCHER);
    }

    #[tokio::test]
    async fn test_foreground_waits_for_rendering() {
        let driver = driver(3, 1000);
        let outcome = driver.ensure_app_foreground(PKG).await.unwrap();
        assert!(outcome.is_ready());
        assert_eq!(
            driver.read_element_text(&loc(keys::TEXT_TO_BE_CHANGED)).await.unwrap(),
            keys::INITIAL_TEXT
        );
    }

    #[tokio::test]
    async fn test_foreground_timeout_is_an_outcome() {
        let driver = driver(u32::MAX, 20);
        let outcome = driver.ensure_app_foreground(PKG).await.unwrap();
        assert!(!outcome.is_ready());

        // The failure surfaces on the next lookup
        let err = driver.read_element_text(&loc(keys::TEXT_TO_BE_CHANGED)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_lookups_do_not_wait() {
        let driver = driver(0, 1000);
        let err = driver.tap_element(&loc(keys::BUTTON_CHANGE)).await.unwrap_err();
        assert!(err.is_not_found());
        let err = driver.set_element_text(&loc(keys::USER_INPUT), "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_tap_read() {
        let driver = driver(0, 1000);
        driver.ensure_app_foreground(PKG).await.unwrap();
        driver.set_element_text(&loc(keys::USER_INPUT), "Netology").await.unwrap();
        driver.tap_element(&loc(keys::BUTTON_CHANGE)).await.unwrap();
        assert_eq!(
            driver.read_element_text(&loc(keys::TEXT_TO_BE_CHANGED)).await.unwrap(),
            "Netology"
        );
    }

    #[tokio::test]
    async fn test_wait_for_new_screen() {
        let driver = driver(2, 1000);
        driver.ensure_app_foreground(PKG).await.unwrap();
        driver.set_element_text(&loc(keys::USER_INPUT), "Netology").await.unwrap();
        driver.tap_element(&loc(keys::BUTTON_ACTIVITY)).await.unwrap();

        assert!(driver.wait_for_new_screen(&loc(keys::RESULT_TEXT)).await.unwrap());
        assert_eq!(driver.read_element_text(&loc(keys::RESULT_TEXT)).await.unwrap(), "Netology");
    }

    #[tokio::test]
    async fn test_wait_for_new_screen_absent_is_false() {
        let driver = driver(0, 20);
        driver.ensure_app_foreground(PKG).await.unwrap();
        assert!(!driver.wait_for_new_screen(&loc(keys::RESULT_TEXT)).await.unwrap());
    }

    #[tokio::test]
    async fn test_navigate_back_to_entry_screen() {
        let driver = driver(2, 1000);
        driver.ensure_app_foreground(PKG).await.unwrap();
        driver.tap_element(&loc(keys::BUTTON_ACTIVITY)).await.unwrap();
        assert!(driver.wait_for_new_screen(&loc(keys::RESULT_TEXT)).await.unwrap());

        assert!(driver.navigate_back_to(&loc(keys::USER_INPUT), 3).await.unwrap());
        assert!(driver.find(&loc(keys::RESULT_TEXT)).await.unwrap().is_none());

        // Already there: no press, so the app stays in front
        assert!(driver.navigate_back_to(&loc(keys::USER_INPUT), 3).await.unwrap());
        assert_eq!(driver.backend().foreground_package().unwrap(), PKG);
    }

    #[tokio::test]
    async fn test_navigate_back_gives_up() {
        let driver = driver(0, 20);
        driver.reset_to_home_screen().await.unwrap();
        assert!(!driver.navigate_back_to(&loc(keys::USER_INPUT), 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_app_resets_state() {
        let driver = driver(0, 1000);
        driver.ensure_app_foreground(PKG).await.unwrap();
        driver.set_element_text(&loc(keys::USER_INPUT), "Netology").await.unwrap();
        driver.tap_element(&loc(keys::BUTTON_CHANGE)).await.unwrap();

        driver.stop_app(PKG).await.unwrap();
        driver.ensure_app_foreground(PKG).await.unwrap();
        assert_eq!(
            driver.read_element_text(&loc(keys::TEXT_TO_BE_CHANGED)).await.unwrap(),
            keys::INITIAL_TEXT
        );
    }
}
