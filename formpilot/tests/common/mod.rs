#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formpilot::presets::{app_record_workflow, AccessLevel, AppPlatform, AppRecordParams};
use formpilot::workflow::{PostCondition, WorkflowConfig, WorkflowSettings};
use formpilot::{
    AutomationError, AutomationSurface, Checkpoint, CheckpointRequest, ElementHandle, Selector,
    TextPattern,
};

/// How a scripted click goes wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The control stays disabled until the action timeout
    Stalled,
    /// The browser connection dropped
    Crashed,
}

impl Fault {
    fn into_error(self, id: &str) -> AutomationError {
        match self {
            Fault::Stalled => AutomationError::ElementNotEnabled(id.to_string()),
            Fault::Crashed => AutomationError::PlatformError("connection closed".into()),
        }
    }
}

#[derive(Default)]
pub struct MockPage {
    pub url: String,
    /// Selector string -> element it resolves to
    pub elements: HashMap<String, ElementHandle>,
    /// Selectors whose lookup fails with a surface error
    pub broken_selectors: Vec<String>,
    /// Selectors whose match goes stale before it can be returned
    pub stale_selectors: Vec<String>,
    pub click_faults: HashMap<String, VecDeque<Fault>>,
    /// Element id -> URL the page moves to once it is clicked
    pub navigates_to: HashMap<String, String>,
    pub values: HashMap<String, String>,
    /// Element id -> value the page shows regardless of what was typed
    pub sticky_values: HashMap<String, String>,
    pub native_options: HashMap<String, Vec<String>>,
    pub calls: Vec<String>,
    pub screenshots: usize,
    pub closes: usize,
}

/// Scriptable in-memory stand-in for a browser page.
#[derive(Clone, Default)]
pub struct MockSurface {
    pub page: Arc<Mutex<MockPage>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, selector: &Selector, element: ElementHandle) -> Self {
        self.page
            .lock()
            .unwrap()
            .elements
            .insert(selector.to_string(), element);
        self
    }

    pub fn with_broken_selector(self, selector: &Selector) -> Self {
        self.page
            .lock()
            .unwrap()
            .broken_selectors
            .push(selector.to_string());
        self
    }

    pub fn with_stale_selector(self, selector: &Selector) -> Self {
        self.page
            .lock()
            .unwrap()
            .stale_selectors
            .push(selector.to_string());
        self
    }

    pub fn with_click_faults(self, id: &str, faults: &[Fault]) -> Self {
        self.page
            .lock()
            .unwrap()
            .click_faults
            .insert(id.to_string(), faults.iter().copied().collect());
        self
    }

    pub fn with_navigation_on_click(self, id: &str, url: &str) -> Self {
        self.page
            .lock()
            .unwrap()
            .navigates_to
            .insert(id.to_string(), url.to_string());
        self
    }

    pub fn with_sticky_value(self, id: &str, value: &str) -> Self {
        self.page
            .lock()
            .unwrap()
            .sticky_values
            .insert(id.to_string(), value.to_string());
        self
    }

    pub fn with_native_options(self, id: &str, options: &[&str]) -> Self {
        self.page.lock().unwrap().native_options.insert(
            id.to_string(),
            options.iter().map(|o| o.to_string()).collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.page.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn value_of(&self, id: &str) -> Option<String> {
        self.page.lock().unwrap().values.get(id).cloned()
    }

    pub fn screenshots(&self) -> usize {
        self.page.lock().unwrap().screenshots
    }

    pub fn closes(&self) -> usize {
        self.page.lock().unwrap().closes
    }

    /// Boxed clone for the engine; `self` keeps observing the same page.
    pub fn boxed(&self) -> Box<dyn AutomationSurface> {
        Box::new(self.clone())
    }
}

#[async_trait::async_trait]
impl AutomationSurface for MockSurface {
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.calls.push(format!("goto:{url}"));
        page.url = url.to_string();
        Ok(())
    }

    async fn find_element(
        &self,
        selector: &Selector,
        _timeout: Duration,
    ) -> Result<ElementHandle, AutomationError> {
        let key = selector.to_string();
        let mut page = self.page.lock().unwrap();
        page.calls.push(format!("find:{key}"));
        if page.broken_selectors.contains(&key) {
            return Err(AutomationError::PlatformError("target crashed".into()));
        }
        if page.stale_selectors.contains(&key) {
            return Err(AutomationError::ElementDetached(key));
        }
        page.elements
            .get(&key)
            .cloned()
            .ok_or(AutomationError::ElementNotFound(key))
    }

    async fn click(&self, element: &ElementHandle, _timeout: Duration) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.calls.push(format!("click:{}", element.id));
        if let Some(fault) = page
            .click_faults
            .get_mut(&element.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(fault.into_error(&element.id));
        }
        if let Some(url) = page.navigates_to.get(&element.id).cloned() {
            page.url = url;
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.calls.push(format!("clear:{}", element.id));
        page.values.insert(element.id.clone(), String::new());
        Ok(())
    }

    async fn type_char(&self, element: &ElementHandle, ch: char) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.values.entry(element.id.clone()).or_default().push(ch);
        Ok(())
    }

    async fn read_value(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let page = self.page.lock().unwrap();
        Ok(page
            .sticky_values
            .get(&element.id)
            .or_else(|| page.values.get(&element.id))
            .cloned()
            .unwrap_or_default())
    }

    async fn select_native_option(
        &self,
        element: &ElementHandle,
        label: &TextPattern,
    ) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.calls.push(format!("select:{}", element.id));
        let chosen = page
            .native_options
            .get(&element.id)
            .and_then(|options| options.iter().find(|o| label.is_match(o)).cloned());
        match chosen {
            Some(option) => {
                page.values.insert(element.id.clone(), option);
                Ok(())
            }
            None => Err(AutomationError::ElementNotFound(format!("option {label}"))),
        }
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self.page.lock().unwrap().url.clone())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), AutomationError> {
        std::fs::write(path, b"\x89PNG")?;
        let mut page = self.page.lock().unwrap();
        page.calls.push("screenshot".into());
        page.screenshots += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let mut page = self.page.lock().unwrap();
        page.calls.push("close".into());
        page.closes += 1;
        Ok(())
    }
}

type AckHook = Box<dyn Fn(&CheckpointRequest) + Send + Sync>;

/// Acknowledges every checkpoint immediately and remembers what was asked.
#[derive(Clone, Default)]
pub struct ScriptedCheckpoint {
    pub requests: Arc<Mutex<Vec<CheckpointRequest>>>,
    hook: Option<Arc<AckHook>>,
    hang_up: bool,
}

impl ScriptedCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` while the human "is at the keyboard"
    pub fn on_acknowledge(mut self, hook: impl Fn(&CheckpointRequest) + Send + Sync + 'static) -> Self {
        self.hook = Some(Arc::new(Box::new(hook)));
        self
    }

    /// Behave like a closed terminal
    pub fn hung_up() -> Self {
        Self {
            hang_up: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<CheckpointRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn boxed(&self) -> Box<dyn Checkpoint> {
        Box::new(self.clone())
    }
}

#[async_trait::async_trait]
impl Checkpoint for ScriptedCheckpoint {
    async fn acknowledge(&self, request: &CheckpointRequest) -> Result<(), AutomationError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.hang_up {
            return Err(AutomationError::Internal("stdin closed".into()));
        }
        if let Some(hook) = &self.hook {
            hook(request);
        }
        Ok(())
    }
}

pub fn button(id: &str, name: &str) -> ElementHandle {
    ElementHandle {
        id: id.to_string(),
        tag: "button".to_string(),
        role: Some("button".to_string()),
        name: Some(name.to_string()),
        enabled: true,
    }
}

pub fn control(id: &str, tag: &str, role: &str) -> ElementHandle {
    ElementHandle {
        id: id.to_string(),
        tag: tag.to_string(),
        role: Some(role.to_string()),
        name: None,
        enabled: true,
    }
}

pub const APP_URL: &str = "https://appstoreconnect.apple.com/apps/6450000001/distribution";

pub fn app_params() -> AppRecordParams {
    AppRecordParams {
        app_name: "Pocket Atlas".into(),
        bundle_id: "com.example.atlas".into(),
        sku: "ATLAS-001".into(),
        platform: AppPlatform::Ios,
        language: "English (U.S.)".into(),
        access: AccessLevel::Full,
    }
}

/// Short timeouts so unverified runs finish quickly.
pub fn fast_settings(diagnostics_dir: Option<&Path>) -> WorkflowSettings {
    WorkflowSettings {
        action_timeout_ms: 500,
        attempt_timeout_ms: 50,
        keystroke_delay_ms: 0,
        diagnostics_dir: diagnostics_dir.map(Path::to_path_buf),
        post_condition: Some(PostCondition {
            url_pattern: formpilot::presets::ASC_APP_CREATED_URL_PATTERN.to_string(),
            timeout_ms: 300,
        }),
    }
}

pub fn app_workflow(diagnostics_dir: Option<&Path>) -> WorkflowConfig {
    app_record_workflow(&app_params(), fast_settings(diagnostics_dir))
}

/// A page where every step of the App Store Connect flow resolves on its
/// first candidate and pressing Create opens the new record.
pub fn app_store_page() -> MockSurface {
    let params = app_params();
    MockSurface::new()
        .with_element(
            &Selector::role("button", TextPattern::contains("New App")),
            button("new-app", "New App"),
        )
        .with_element(
            &Selector::role("checkbox", TextPattern::exact("iOS")),
            control("platform-ios", "input", "checkbox"),
        )
        .with_element(
            &Selector::Label(TextPattern::contains("App Name")),
            control("app-name", "input", "textbox"),
        )
        .with_element(
            &Selector::Label(TextPattern::contains("Primary Language")),
            control("language", "select", "combobox"),
        )
        .with_native_options("language", &["English (U.K.)", "English (U.S.)", "French"])
        .with_element(
            &Selector::Label(TextPattern::contains("Bundle ID")),
            control("bundle-id", "div", "combobox"),
        )
        .with_element(
            &Selector::role("option", TextPattern::contains(&params.bundle_id)),
            control("bundle-option", "li", "option"),
        )
        .with_element(
            &Selector::Label(TextPattern::contains("SKU")),
            control("sku", "input", "textbox"),
        )
        .with_element(
            &Selector::role("radio", TextPattern::exact("Full Access")),
            control("access-full", "input", "radio"),
        )
        .with_element(
            &Selector::role("button", TextPattern::exact("Create")),
            button("create", "Create"),
        )
        .with_navigation_on_click("create", APP_URL)
}

/// Parse every line of a JSONL trace file
pub fn read_trace(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
