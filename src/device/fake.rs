//! In-memory device
//!
//! Models just enough of Android to run black-box scenarios without an
//! emulator: a launcher, installed apps described as screens of elements,
//! an app task stack per package, and a focused text field. Apps react to
//! taps through declarative [`ClickAction`]s.
//!
//! The whole state is serializable so the `fake_adb` test binary can keep
//! it in a file between invocations.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::config::{keys, DEFAULT_TARGET_PACKAGE};
use crate::common::{Error, Result};

use super::{Bounds, UiBackend, UiNode, UiTree};

/// Launcher package of the in-memory device
pub const FAKE_LAUNCHER: &str = "com.android.launcher3";

/// Screen size of the in-memory device
const SCREEN: Bounds = Bounds {
    left: 0,
    top: 0,
    right: 1080,
    bottom: 2340,
};

const ELEMENT_HEIGHT: i32 = 150;
const ELEMENT_SPACING: i32 = 200;

/// What happens when an element is tapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    /// Copy the text of one element into another on the same screen
    CopyText {
        from: String,
        to: String,
        /// Leave the target untouched when the source is empty
        #[serde(default)]
        ignore_empty: bool,
    },
    /// Push a new screen, optionally carrying text over from this one
    OpenScreen {
        screen: String,
        #[serde(default)]
        carry: Vec<TextCarry>,
    },
    /// Pop the current screen
    Back,
}

/// Text handed from an element of the current screen to the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCarry {
    pub from: String,
    pub to: String,
}

/// Element declaration of a fake screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeElement {
    pub key: String,
    #[serde(default = "default_class")]
    pub class: String,
    /// Text shown when the screen opens
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub on_click: Vec<ClickAction>,
}

fn default_class() -> String {
    "android.widget.TextView".to_string()
}

impl FakeElement {
    pub fn text_view(key: &str, text: &str) -> Self {
        Self {
            key: key.to_string(),
            class: default_class(),
            text: text.to_string(),
            on_click: Vec::new(),
        }
    }

    pub fn edit_text(key: &str) -> Self {
        Self {
            key: key.to_string(),
            class: "android.widget.EditText".to_string(),
            text: String::new(),
            on_click: Vec::new(),
        }
    }

    pub fn button(key: &str, label: &str, on_click: Vec<ClickAction>) -> Self {
        Self {
            key: key.to_string(),
            class: "android.widget.Button".to_string(),
            text: label.to_string(),
            on_click,
        }
    }

    fn is_editable(&self) -> bool {
        self.class.ends_with("EditText")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeScreen {
    pub elements: Vec<FakeElement>,
}

/// Synthetic application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeApp {
    pub package: String,
    /// Screen shown on a cold launch
    pub entry: String,
    pub screens: BTreeMap<String, FakeScreen>,
}

impl FakeApp {
    /// The change-text demo application
    ///
    /// Main screen: an input field, a button copying the input into a
    /// text view (empty input is ignored), and a button opening a second
    /// screen that shows the input.
    pub fn change_text_demo() -> Self {
        let main = FakeScreen {
            elements: vec![
                FakeElement::text_view(keys::TEXT_TO_BE_CHANGED, keys::INITIAL_TEXT),
                FakeElement::edit_text(keys::USER_INPUT),
                FakeElement::button(
                    keys::BUTTON_CHANGE,
                    "Change text",
                    vec![ClickAction::CopyText {
                        from: keys::USER_INPUT.to_string(),
                        to: keys::TEXT_TO_BE_CHANGED.to_string(),
                        ignore_empty: true,
                    }],
                ),
                FakeElement::button(
                    keys::BUTTON_ACTIVITY,
                    "Open activity",
                    vec![ClickAction::OpenScreen {
                        screen: "result".to_string(),
                        carry: vec![TextCarry {
                            from: keys::USER_INPUT.to_string(),
                            to: keys::RESULT_TEXT.to_string(),
                        }],
                    }],
                ),
            ],
        };
        let result = FakeScreen {
            elements: vec![FakeElement::text_view(keys::RESULT_TEXT, "")],
        };

        Self {
            package: DEFAULT_TARGET_PACKAGE.to_string(),
            entry: "main".to_string(),
            screens: BTreeMap::from([("main".to_string(), main), ("result".to_string(), result)]),
        }
    }

    fn open(&self, screen: &str) -> Result<ScreenInstance> {
        let decl = self.screens.get(screen).ok_or_else(|| {
            Error::Device(format!("{} has no screen '{}'", self.package, screen))
        })?;
        Ok(ScreenInstance {
            screen: screen.to_string(),
            texts: decl
                .elements
                .iter()
                .map(|e| (e.key.clone(), e.text.clone()))
                .collect(),
        })
    }
}

/// A live screen with the current text of each element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ScreenInstance {
    screen: String,
    texts: BTreeMap<String, String>,
}

/// Back stack of a running app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Task {
    stack: Vec<ScreenInstance>,
}

/// Complete in-memory device state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FakeState {
    launcher: String,
    apps: BTreeMap<String, FakeApp>,
    tasks: BTreeMap<String, Task>,
    /// App in front; the launcher when `None`
    foreground: Option<String>,
    /// Key of the focused text field on the top screen
    focused: Option<String>,
    /// Empty snapshots served after each transition
    render_delay: u32,
    pending_polls: u32,
}

impl Default for FakeState {
    fn default() -> Self {
        Self::new(FAKE_LAUNCHER)
    }
}

impl FakeState {
    pub fn new(launcher: &str) -> Self {
        Self {
            launcher: launcher.to_string(),
            apps: BTreeMap::new(),
            tasks: BTreeMap::new(),
            foreground: None,
            focused: None,
            render_delay: 0,
            pending_polls: 0,
        }
    }

    /// Device with the launcher in front and the demo app installed
    pub fn with_demo_app() -> Self {
        let mut state = Self::default();
        state.install(FakeApp::change_text_demo());
        state
    }

    pub fn install(&mut self, app: FakeApp) {
        self.tasks.remove(&app.package);
        self.apps.insert(app.package.clone(), app);
    }

    pub fn set_render_delay(&mut self, polls: u32) {
        self.render_delay = polls;
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    pub fn foreground_package(&self) -> &str {
        self.foreground.as_deref().unwrap_or(&self.launcher)
    }

    /// Current text of an element on the foreground screen
    pub fn text_of(&self, key: &str) -> Option<&str> {
        self.top_screen()?.texts.get(key).map(String::as_str)
    }

    fn transition(&mut self) {
        self.focused = None;
        self.pending_polls = self.render_delay;
    }

    pub fn press_home(&mut self) {
        self.foreground = None;
        self.transition();
    }

    pub fn launch(&mut self, package: &str) -> Result<()> {
        let app = self
            .apps
            .get(package)
            .ok_or_else(|| Error::Device(format!("Package '{}' is not installed", package)))?;

        if !self.tasks.contains_key(package) {
            let entry = app.open(&app.entry)?;
            self.tasks.insert(
                package.to_string(),
                Task {
                    stack: vec![entry],
                },
            );
        }
        self.foreground = Some(package.to_string());
        self.transition();
        Ok(())
    }

    pub fn force_stop(&mut self, package: &str) {
        if self.tasks.remove(package).is_some() && self.foreground.as_deref() == Some(package) {
            self.foreground = None;
            self.transition();
        }
    }

    /// Snapshot as a dump would see it, consuming one pending render poll
    pub fn snapshot(&mut self) -> UiTree {
        if self.pending_polls > 0 {
            self.pending_polls -= 1;
            return UiTree::default();
        }
        self.render()
    }

    /// Render the foreground screen
    pub fn render(&self) -> UiTree {
        let package = self.foreground_package().to_string();
        let mut nodes = vec![UiNode {
            class: "android.widget.FrameLayout".to_string(),
            package: package.clone(),
            enabled: true,
            bounds: SCREEN,
            ..Default::default()
        }];

        let Some((app, instance)) = self.top() else {
            nodes.push(UiNode {
                depth: 1,
                text: "Home".to_string(),
                resource_id: format!("{}:id/workspace", self.launcher),
                class: "android.view.ViewGroup".to_string(),
                package,
                enabled: true,
                bounds: SCREEN,
                ..Default::default()
            });
            return UiTree::new(nodes);
        };

        let decl = app.screens.get(&instance.screen).cloned().unwrap_or_default();
        for (i, element) in decl.elements.iter().enumerate() {
            let top = ELEMENT_SPACING / 2 + i as i32 * ELEMENT_SPACING;
            nodes.push(UiNode {
                depth: 1,
                index: i,
                text: instance.texts.get(&element.key).cloned().unwrap_or_default(),
                resource_id: format!("{}:id/{}", app.package, element.key),
                class: element.class.clone(),
                package: app.package.clone(),
                clickable: element.is_editable() || !element.on_click.is_empty(),
                enabled: true,
                focused: self.focused.as_deref() == Some(element.key.as_str()),
                bounds: Bounds::new(SCREEN.left, top, SCREEN.right, top + ELEMENT_HEIGHT),
                ..Default::default()
            });
        }
        UiTree::new(nodes)
    }

    fn top(&self) -> Option<(&FakeApp, &ScreenInstance)> {
        let package = self.foreground.as_ref()?;
        let app = self.apps.get(package)?;
        let instance = self.tasks.get(package)?.stack.last()?;
        Some((app, instance))
    }

    fn top_screen(&self) -> Option<&ScreenInstance> {
        self.top().map(|(_, instance)| instance)
    }

    /// Resolve a resource id to an element declaration on the top screen
    fn element(&self, resource_id: &str) -> Result<FakeElement> {
        let not_found = || Error::ElementNotFound {
            locator: resource_id.to_string(),
        };
        let (app, instance) = self.top().ok_or_else(not_found)?;
        let key = resource_id
            .strip_prefix(app.package.as_str())
            .and_then(|rest| rest.strip_prefix(":id/"))
            .ok_or_else(not_found)?;
        app.screens
            .get(&instance.screen)
            .and_then(|s| s.elements.iter().find(|e| e.key == key))
            .cloned()
            .ok_or_else(not_found)
    }

    fn top_texts_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        let package = self.foreground.as_ref()?;
        self.tasks
            .get_mut(package)?
            .stack
            .last_mut()
            .map(|s| &mut s.texts)
    }

    pub fn set_text(&mut self, resource_id: &str, text: &str) -> Result<()> {
        let element = self.element(resource_id)?;
        if !element.is_editable() {
            return Err(Error::ElementNotInteractable {
                locator: resource_id.to_string(),
                action: "take text input".to_string(),
            });
        }
        if let Some(texts) = self.top_texts_mut() {
            texts.insert(element.key, text.to_string());
        }
        Ok(())
    }

    pub fn click(&mut self, resource_id: &str) -> Result<()> {
        let element = self.element(resource_id)?;
        if element.is_editable() {
            self.focused = Some(element.key.clone());
        }
        for action in &element.on_click {
            self.apply(action)?;
        }
        Ok(())
    }

    /// Tap at screen coordinates; taps outside any element do nothing
    pub fn tap(&mut self, x: i32, y: i32) -> Result<()> {
        let tree = self.render();
        match tree.node_at(x, y) {
            Some(node) if node.key().is_some() && self.foreground.is_some() => {
                let resource_id = node.resource_id.clone();
                self.click(&resource_id)
            }
            _ => Ok(()),
        }
    }

    /// Append typed text to the focused field
    pub fn type_text(&mut self, text: &str) {
        if let Some(key) = self.focused.clone() {
            if let Some(texts) = self.top_texts_mut() {
                texts.entry(key).or_default().push_str(text);
            }
        }
    }

    /// Delete the last character of the focused field
    pub fn delete_char(&mut self) {
        if let Some(key) = self.focused.clone() {
            if let Some(texts) = self.top_texts_mut() {
                if let Some(value) = texts.get_mut(&key) {
                    value.pop();
                }
            }
        }
    }

    pub fn back(&mut self) {
        let Some(package) = self.foreground.clone() else {
            return;
        };
        let emptied = match self.tasks.get_mut(&package) {
            Some(task) => {
                task.stack.pop();
                task.stack.is_empty()
            }
            None => true,
        };
        if emptied {
            self.tasks.remove(&package);
            self.foreground = None;
        }
        self.transition();
    }

    fn apply(&mut self, action: &ClickAction) -> Result<()> {
        match action {
            ClickAction::CopyText {
                from,
                to,
                ignore_empty,
            } => {
                if let Some(texts) = self.top_texts_mut() {
                    let value = texts.get(from).cloned().unwrap_or_default();
                    if !(value.is_empty() && *ignore_empty) {
                        texts.insert(to.clone(), value);
                    }
                }
                Ok(())
            }
            ClickAction::OpenScreen { screen, carry } => {
                let Some((app, current)) = self.top() else {
                    return Ok(());
                };
                let mut next = app.open(screen)?;
                for c in carry {
                    let value = current.texts.get(&c.from).cloned().unwrap_or_default();
                    next.texts.insert(c.to.clone(), value);
                }
                let package = app.package.clone();
                if let Some(task) = self.tasks.get_mut(&package) {
                    task.stack.push(next);
                }
                self.transition();
                Ok(())
            }
            ClickAction::Back => {
                self.back();
                Ok(())
            }
        }
    }
}

/// In-memory [`UiBackend`]
pub struct FakeDevice {
    state: Mutex<FakeState>,
}

impl FakeDevice {
    pub fn new(state: FakeState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_demo_app() -> Self {
        Self::new(FakeState::with_demo_app())
    }

    pub fn with_render_delay(self, polls: u32) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.set_render_delay(polls);
        }
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, FakeState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("fake device state poisoned".to_string()))
    }

    /// Run a closure against the device state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> Result<R> {
        Ok(f(&mut *self.lock()?))
    }

    pub fn install(&self, app: FakeApp) -> Result<()> {
        self.with_state(|s| s.install(app))
    }

    pub fn foreground_package(&self) -> Result<String> {
        self.with_state(|s| s.foreground_package().to_string())
    }
}

#[async_trait]
impl UiBackend for FakeDevice {
    async fn launch_app(&self, package: &str) -> Result<()> {
        self.lock()?.launch(package)
    }

    async fn force_stop(&self, package: &str) -> Result<()> {
        self.lock()?.force_stop(package);
        Ok(())
    }

    async fn press_home(&self) -> Result<()> {
        self.lock()?.press_home();
        Ok(())
    }

    async fn press_back(&self) -> Result<()> {
        self.lock()?.back();
        Ok(())
    }

    async fn launcher_package(&self) -> Result<String> {
        Ok(self.lock()?.launcher().to_string())
    }

    async fn snapshot(&self) -> Result<UiTree> {
        Ok(self.lock()?.snapshot())
    }

    async fn set_text(&self, node: &UiNode, text: &str) -> Result<()> {
        self.lock()?.set_text(&node.resource_id, text)
    }

    async fn click(&self, node: &UiNode) -> Result<()> {
        let mut state = self.lock()?;
        if node.resource_id.is_empty() {
            let (x, y) = node.bounds.center();
            state.tap(x, y)
        } else {
            state.click(&node.resource_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Locator;

    const PKG: &str = DEFAULT_TARGET_PACKAGE;

    fn rid(key: &str) -> String {
        Locator::new(PKG, key).resource_id()
    }

    fn launched() -> FakeState {
        let mut state = FakeState::with_demo_app();
        state.launch(PKG).unwrap();
        state
    }

    #[test]
    fn test_starts_on_launcher() {
        let mut state = FakeState::with_demo_app();
        assert_eq!(state.foreground_package(), FAKE_LAUNCHER);
        assert!(state.snapshot().has_package(FAKE_LAUNCHER));
    }

    #[test]
    fn test_launch_renders_entry_screen() {
        let mut state = launched();
        let tree = state.snapshot();
        assert!(tree.has_package(PKG));
        let display = tree.find(&Locator::new(PKG, keys::TEXT_TO_BE_CHANGED)).unwrap();
        assert_eq!(display.text, keys::INITIAL_TEXT);
    }

    #[test]
    fn test_launch_unknown_package_fails() {
        let mut state = FakeState::with_demo_app();
        assert!(matches!(state.launch("com.missing"), Err(Error::Device(_))));
        assert_eq!(state.foreground_package(), FAKE_LAUNCHER);
    }

    #[test]
    fn test_change_button_copies_input() {
        let mut state = launched();
        state.set_text(&rid(keys::USER_INPUT), "Netology").unwrap();
        state.click(&rid(keys::BUTTON_CHANGE)).unwrap();
        assert_eq!(state.text_of(keys::TEXT_TO_BE_CHANGED), Some("Netology"));
    }

    #[test]
    fn test_change_button_ignores_empty_input() {
        let mut state = launched();
        state.set_text(&rid(keys::USER_INPUT), "").unwrap();
        state.click(&rid(keys::BUTTON_CHANGE)).unwrap();
        assert_eq!(state.text_of(keys::TEXT_TO_BE_CHANGED), Some(keys::INITIAL_TEXT));
    }

    #[test]
    fn test_open_screen_carries_whitespace() {
        let mut state = launched();
        state.set_text(&rid(keys::USER_INPUT), "     ").unwrap();
        state.click(&rid(keys::BUTTON_ACTIVITY)).unwrap();
        assert_eq!(state.text_of(keys::RESULT_TEXT), Some("     "));
        assert!(state.text_of(keys::USER_INPUT).is_none());

        state.back();
        assert_eq!(state.text_of(keys::USER_INPUT), Some("     "));
    }

    #[test]
    fn test_relaunch_resumes_task_until_force_stopped() {
        let mut state = launched();
        state.set_text(&rid(keys::USER_INPUT), "Netology").unwrap();
        state.click(&rid(keys::BUTTON_CHANGE)).unwrap();

        state.press_home();
        state.launch(PKG).unwrap();
        assert_eq!(state.text_of(keys::TEXT_TO_BE_CHANGED), Some("Netology"));

        state.force_stop(PKG);
        assert_eq!(state.foreground_package(), FAKE_LAUNCHER);
        state.launch(PKG).unwrap();
        assert_eq!(state.text_of(keys::TEXT_TO_BE_CHANGED), Some(keys::INITIAL_TEXT));
    }

    #[test]
    fn test_back_from_entry_screen_leaves_app() {
        let mut state = launched();
        state.click(&rid(keys::BUTTON_ACTIVITY)).unwrap();

        state.back();
        assert_eq!(state.foreground_package(), PKG);
        state.back();
        assert_eq!(state.foreground_package(), FAKE_LAUNCHER);

        // The emptied task starts over
        state.launch(PKG).unwrap();
        assert_eq!(state.text_of(keys::TEXT_TO_BE_CHANGED), Some(keys::INITIAL_TEXT));
    }

    #[test]
    fn test_set_text_on_button_rejected() {
        let mut state = launched();
        let err = state.set_text(&rid(keys::BUTTON_CHANGE), "x").unwrap_err();
        assert!(matches!(err, Error::ElementNotInteractable { .. }));
    }

    #[test]
    fn test_stale_element_not_found() {
        let mut state = FakeState::with_demo_app();
        let err = state.click(&rid(keys::BUTTON_CHANGE)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_render_delay_hides_new_screen() {
        let mut state = FakeState::with_demo_app();
        state.set_render_delay(2);
        state.launch(PKG).unwrap();
        assert!(state.snapshot().is_empty());
        assert!(state.snapshot().is_empty());
        assert!(state.snapshot().has_package(PKG));
    }

    #[test]
    fn test_keyboard_input_through_taps() {
        let mut state = launched();
        let tree = state.render();
        let input = tree.find(&Locator::new(PKG, keys::USER_INPUT)).unwrap();
        let (x, y) = input.bounds.center();

        state.tap(x, y).unwrap();
        assert!(state.render().find(&Locator::new(PKG, keys::USER_INPUT)).unwrap().focused);
        state.type_text("Netologyy");
        state.delete_char();
        assert_eq!(state.text_of(keys::USER_INPUT), Some("Netology"));
    }

    #[test]
    fn test_state_survives_json() {
        let mut state = launched();
        state.set_text(&rid(keys::USER_INPUT), "Netology").unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let restored: FakeState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[tokio::test]
    async fn test_backend_click_without_resource_id_taps_center() {
        let device = FakeDevice::with_demo_app();
        device.launch_app(PKG).await.unwrap();
        let tree = device.snapshot().await.unwrap();
        let mut button = tree.find(&Locator::new(PKG, keys::BUTTON_ACTIVITY)).unwrap().clone();
        button.resource_id.clear();

        device.click(&button).await.unwrap();
        let tree = device.snapshot().await.unwrap();
        assert!(tree.find(&Locator::new(PKG, keys::RESULT_TEXT)).is_some());
    }
}
