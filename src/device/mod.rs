//! Device backends
//!
//! A [`UiBackend`] is the platform side of a session: it can launch and stop
//! apps, press home, snapshot the UI hierarchy and act on a node from that
//! snapshot. Element lookup and bounded waiting live in the driver, on top
//! of `snapshot`.

pub mod adb;
pub mod dump;
pub mod fake;
mod locator;
mod tree;

pub use adb::AdbBackend;
pub use fake::{FakeApp, FakeDevice};
pub use locator::Locator;
pub use tree::{Bounds, UiNode, UiTree};

use async_trait::async_trait;

use crate::common::config::{BackendKind, Config};
use crate::common::Result;

/// Platform UI-automation collaborator
#[async_trait]
pub trait UiBackend: Send + Sync {
    /// Launch the app, or bring its existing task to the front
    async fn launch_app(&self, package: &str) -> Result<()>;

    /// Kill the app so the next launch starts from its entry screen
    async fn force_stop(&self, package: &str) -> Result<()>;

    async fn press_home(&self) -> Result<()>;

    /// Pop the top screen of the foreground app
    async fn press_back(&self) -> Result<()>;

    /// Package of the home screen app
    async fn launcher_package(&self) -> Result<String>;

    /// Current UI hierarchy
    async fn snapshot(&self) -> Result<UiTree>;

    /// Replace the text of an editable node
    async fn set_text(&self, node: &UiNode, text: &str) -> Result<()>;

    async fn click(&self, node: &UiNode) -> Result<()>;
}

#[async_trait]
impl<T: UiBackend + ?Sized> UiBackend for Box<T> {
    async fn launch_app(&self, package: &str) -> Result<()> {
        (**self).launch_app(package).await
    }

    async fn force_stop(&self, package: &str) -> Result<()> {
        (**self).force_stop(package).await
    }

    async fn press_home(&self) -> Result<()> {
        (**self).press_home().await
    }

    async fn press_back(&self) -> Result<()> {
        (**self).press_back().await
    }

    async fn launcher_package(&self) -> Result<String> {
        (**self).launcher_package().await
    }

    async fn snapshot(&self) -> Result<UiTree> {
        (**self).snapshot().await
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> Result<()> {
        (**self).set_text(node, text).await
    }

    async fn click(&self, node: &UiNode) -> Result<()> {
        (**self).click(node).await
    }
}

/// Build the backend selected in the configuration
pub fn connect(config: &Config) -> Result<Box<dyn UiBackend>> {
    match config.device.backend {
        BackendKind::Adb => {
            let adb = config.device.resolve_adb()?;
            tracing::debug!("Using adb at {}", adb.display());
            Ok(Box::new(AdbBackend::new(
                adb,
                config.device.serial.clone(),
                config.timeouts.adb_command(),
            )))
        }
        BackendKind::Fake => {
            tracing::debug!("Using in-memory device");
            Ok(Box::new(
                FakeDevice::with_demo_app().with_render_delay(config.fake.render_delay_polls),
            ))
        }
    }
}
