//! In-memory doubles for exercising page objects without a browser.

use crate::browser::ResilientSession;
use crate::core::{Config, DiagnosticSnapshot, DriverTrait};
use crate::errors::{AutomationError, Result};
use crate::types::{ElementInfo, Locator};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Driver call that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Find,
    Click,
    ScriptClick,
    Clear,
    Type,
    Text,
    Attribute,
    Displayed,
}

#[derive(Debug, Clone)]
struct ScriptedElement {
    info: ElementInfo,
    displayed: bool,
    enabled: bool,
}

#[derive(Default)]
struct State {
    url: String,
    title: String,
    elements: HashMap<Locator, ScriptedElement>,
    failures: HashMap<(Op, Locator), VecDeque<AutomationError>>,
    scripts: HashMap<String, Value>,
    typed: HashMap<Locator, String>,
    calls: Vec<(Op, Locator)>,
    screenshot: Vec<u8>,
    screenshot_failure: Option<AutomationError>,
    clicks_navigate: HashMap<Locator, String>,
}

/// Deterministic [`DriverTrait`] whose page is a map of locators to elements.
#[derive(Default)]
pub struct ScriptedDriver {
    state: Mutex<State>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_element(&self, locator: Locator, info: ElementInfo) {
        self.state().elements.insert(
            locator,
            ScriptedElement {
                info,
                displayed: true,
                enabled: true,
            },
        );
    }

    pub fn add_hidden_element(&self, locator: Locator, info: ElementInfo) {
        self.state().elements.insert(
            locator,
            ScriptedElement {
                info,
                displayed: false,
                enabled: true,
            },
        );
    }

    pub fn set_enabled(&self, locator: &Locator, enabled: bool) {
        if let Some(element) = self.state().elements.get_mut(locator) {
            element.enabled = enabled;
        }
    }

    pub fn remove_element(&self, locator: &Locator) {
        self.state().elements.remove(locator);
    }

    /// Queue failures returned, one per call, before `op` behaves normally again.
    pub fn fail_next(&self, op: Op, locator: Locator, errors: Vec<AutomationError>) {
        self.state()
            .failures
            .entry((op, locator))
            .or_default()
            .extend(errors);
    }

    /// Clicking `locator` moves the page to `url`.
    pub fn navigate_on_click(&self, locator: Locator, url: impl Into<String>) {
        self.state().clicks_navigate.insert(locator, url.into());
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state().url = url.into();
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state().title = title.into();
    }

    pub fn set_script_result(&self, script: impl Into<String>, value: Value) {
        self.state().scripts.insert(script.into(), value);
    }

    pub fn set_screenshot(&self, bytes: Vec<u8>) {
        self.state().screenshot = bytes;
    }

    pub fn fail_screenshots(&self, error: AutomationError) {
        self.state().screenshot_failure = Some(error);
    }

    pub fn typed_text(&self, locator: &Locator) -> Option<String> {
        self.state().typed.get(locator).cloned()
    }

    pub fn calls(&self, op: Op, locator: &Locator) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(o, l)| *o == op && l == locator)
            .count()
    }

    fn enter(&self, op: Op, locator: &Locator) -> Result<ScriptedElement> {
        let mut state = self.state();
        state.calls.push((op, locator.clone()));
        if let Some(error) = state
            .failures
            .get_mut(&(op, locator.clone()))
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        state
            .elements
            .get(locator)
            .cloned()
            .ok_or_else(|| AutomationError::ElementNotFound(locator.to_string()))
    }

    fn after_click(&self, locator: &Locator) {
        let mut state = self.state();
        if let Some(url) = state.clicks_navigate.get(locator).cloned() {
            state.url = url;
        }
    }
}

#[async_trait]
impl DriverTrait for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.state().url = url.to_string();
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementInfo> {
        Ok(self.enter(Op::Find, locator)?.info)
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        Ok(self
            .enter(Op::Find, locator)
            .map(|element| vec![element.info])
            .unwrap_or_default())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.enter(Op::Click, locator)?;
        if !element.displayed || !element.enabled {
            return Err(AutomationError::NotInteractable(locator.to_string()));
        }
        self.after_click(locator);
        Ok(())
    }

    async fn click_via_script(&self, locator: &Locator) -> Result<()> {
        self.enter(Op::ScriptClick, locator)?;
        self.after_click(locator);
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> Result<()> {
        self.enter(Op::Clear, locator)?;
        self.state().typed.remove(locator);
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.enter(Op::Type, locator)?;
        self.state()
            .typed
            .entry(locator.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }

    async fn text(&self, locator: &Locator) -> Result<String> {
        Ok(self
            .enter(Op::Text, locator)?
            .info
            .text_content
            .unwrap_or_default())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        Ok(self
            .enter(Op::Attribute, locator)?
            .info
            .attributes
            .get(name)
            .cloned())
    }

    async fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        Ok(self.enter(Op::Displayed, locator)?.displayed)
    }

    async fn is_enabled(&self, locator: &Locator) -> Result<bool> {
        Ok(self.enter(Op::Displayed, locator)?.enabled)
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        Ok(self
            .state()
            .scripts
            .get(script)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.state().title.clone())
    }

    async fn take_screenshot(&self) -> Result<Vec<u8>> {
        let mut state = self.state();
        match state.screenshot_failure.take() {
            Some(error) => Err(error),
            None => Ok(state.screenshot.clone()),
        }
    }
}

/// Snapshot sink that remembers the labels it was asked to capture.
#[derive(Debug, Default)]
pub struct RecordingSnapshot {
    labels: Mutex<Vec<String>>,
}

impl RecordingSnapshot {
    pub fn labels(&self) -> Vec<String> {
        self.labels
            .lock()
            .map(|labels| labels.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DiagnosticSnapshot for RecordingSnapshot {
    async fn capture(&self, label: &str) -> Option<PathBuf> {
        if let Ok(mut labels) = self.labels.lock() {
            labels.push(label.to_string());
        }
        Some(PathBuf::from(format!("{}.png", label)))
    }
}

pub struct TestHelper;

impl TestHelper {
    /// Fast settings: short waits and retry intervals so tests stay quick.
    pub fn fast_config() -> Config {
        let mut config = Config::default();
        config.waits.timeout_ms = 2000;
        config.waits.poll_interval_ms = 100;
        config.retry.interval_ms = 100;
        config.mastodon.base_url = "https://mastodon.test/".to_string();
        config
    }

    /// Session over a fresh scripted driver with a recording snapshot sink.
    pub fn create_test_session() -> Result<(
        ResilientSession<ScriptedDriver>,
        Arc<ScriptedDriver>,
        Arc<RecordingSnapshot>,
    )> {
        let driver = Arc::new(ScriptedDriver::new());
        let snapshots = Arc::new(RecordingSnapshot::default());
        let session =
            ResilientSession::with_snapshots(driver.clone(), Self::fast_config(), snapshots.clone())?;
        Ok((session, driver, snapshots))
    }
}
