//! Scripted in-memory page for exercising the core without a browser.
//!
//! Elements are matched by exact selector strings rather than by a CSS
//! engine: an element lists the selectors it answers to. Clicks and file
//! assignments can trigger [`Effect`]s to model the page re-rendering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SurfaceError;
use crate::surface::{ElementHandle, FilePayload, PageSurface};

/// Reaction of the page to an interaction.
#[derive(Clone)]
pub enum Effect {
    /// Make the element with this key visible.
    Show(String),
    /// Hide the element with this key.
    Hide(String),
    /// Change the document URL.
    Navigate(String),
    /// Run arbitrary code, for example to feed a network observer.
    Callback(Arc<dyn Fn() + Send + Sync>),
}

impl Effect {
    pub fn show(key: impl Into<String>) -> Self {
        Effect::Show(key.into())
    }

    pub fn hide(key: impl Into<String>) -> Self {
        Effect::Hide(key.into())
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Effect::Navigate(url.into())
    }

    pub fn callback(f: impl Fn() + Send + Sync + 'static) -> Self {
        Effect::Callback(Arc::new(f))
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Show(key) => write!(f, "Show({})", key),
            Effect::Hide(key) => write!(f, "Hide({})", key),
            Effect::Navigate(url) => write!(f, "Navigate({})", url),
            Effect::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// One scripted element.
#[derive(Debug, Clone)]
pub struct FakeElement {
    key: String,
    selectors: Vec<String>,
    text: String,
    markup: Option<String>,
    value: String,
    visible: bool,
    popover: bool,
    rejects_input: bool,
    on_click: Vec<Effect>,
    on_files: Vec<Effect>,
}

impl FakeElement {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            selectors: Vec::new(),
            text: String::new(),
            markup: None,
            value: String::new(),
            visible: true,
            popover: false,
            rejects_input: false,
            on_click: Vec::new(),
            on_files: Vec::new(),
        }
    }

    /// Answer to `selector` in `query_all`.
    pub fn matching(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Inner markup; defaults to the text.
    pub fn markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Hidden again by `dismiss`.
    pub fn popover(mut self) -> Self {
        self.popover = true;
        self
    }

    /// `set_value` is silently ignored, as with a framework-controlled input.
    pub fn rejecting_input(mut self) -> Self {
        self.rejects_input = true;
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn on_files(mut self, effect: Effect) -> Self {
        self.on_files.push(effect);
        self
    }
}

#[derive(Default)]
struct PageState {
    elements: Vec<FakeElement>,
    url: String,
    clicked: Vec<String>,
    navigations: Vec<String>,
    files: HashMap<String, Vec<FilePayload>>,
    dismissals: usize,
    mutations: usize,
    closed: bool,
}

impl PageState {
    fn live(&self, handle: &ElementHandle) -> Result<usize, SurfaceError> {
        if self.closed {
            return Err(SurfaceError::Closed);
        }
        self.elements
            .iter()
            .position(|e| e.key == handle.id() && e.visible)
            .ok_or_else(|| SurfaceError::StaleElement(handle.id().to_string()))
    }

    fn open(&self) -> Result<(), SurfaceError> {
        if self.closed {
            Err(SurfaceError::Closed)
        } else {
            Ok(())
        }
    }
}

/// In-memory [`PageSurface`].
#[derive(Default)]
pub struct FakePage {
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.state.lock().url = url.into();
        self
    }

    pub fn with(self, element: FakeElement) -> Self {
        self.add(element);
        self
    }

    pub fn add(&self, element: FakeElement) {
        self.state.lock().elements.push(element);
    }

    pub fn remove(&self, key: &str) {
        self.state.lock().elements.retain(|e| e.key != key);
    }

    /// Attach a click effect to an existing element.
    pub fn on_click(&self, key: &str, effect: Effect) {
        if let Some(e) = self.state.lock().elements.iter_mut().find(|e| e.key == key) {
            e.on_click.push(effect);
        }
    }

    /// Attach a file-assignment effect to an existing element.
    pub fn on_files(&self, key: &str, effect: Effect) {
        if let Some(e) = self.state.lock().elements.iter_mut().find(|e| e.key == key) {
            e.on_files.push(effect);
        }
    }

    /// Make `set_value` on an existing element a no-op.
    pub fn reject_input(&self, key: &str) {
        if let Some(e) = self.state.lock().elements.iter_mut().find(|e| e.key == key) {
            e.rejects_input = true;
        }
    }

    pub fn set_visible(&self, key: &str, visible: bool) {
        if let Some(e) = self.state.lock().elements.iter_mut().find(|e| e.key == key) {
            e.visible = visible;
        }
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.state
            .lock()
            .elements
            .iter()
            .any(|e| e.key == key && e.visible)
    }

    /// Make every later call fail with [`SurfaceError::Closed`].
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Keys of clicked elements, in order.
    pub fn clicked(&self) -> Vec<String> {
        self.state.lock().clicked.clone()
    }

    pub fn was_clicked(&self, key: &str) -> bool {
        self.state.lock().clicked.iter().any(|k| k == key)
    }

    pub fn value_of(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .elements
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.clone())
    }

    /// Files assigned to an input, across all `set_files` calls.
    pub fn files_for(&self, key: &str) -> Vec<FilePayload> {
        self.state.lock().files.get(key).cloned().unwrap_or_default()
    }

    pub fn dismissals(&self) -> usize {
        self.state.lock().dismissals
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    /// Number of state-changing calls made against the page.
    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Show(key) => self.set_visible(&key, true),
                Effect::Hide(key) => self.set_visible(&key, false),
                Effect::Navigate(url) => self.state.lock().url = url,
                Effect::Callback(f) => f(),
            }
        }
    }
}

#[async_trait]
impl PageSurface for FakePage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, SurfaceError> {
        let state = self.state.lock();
        state.open()?;
        Ok(state
            .elements
            .iter()
            .filter(|e| e.visible && e.selectors.iter().any(|s| s == selector))
            .map(|e| ElementHandle::new(e.key.clone()))
            .collect())
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        let state = self.state.lock();
        let idx = state.live(element)?;
        Ok(state.elements[idx].text.clone())
    }

    async fn markup_of(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        let state = self.state.lock();
        let idx = state.live(element)?;
        let e = &state.elements[idx];
        Ok(e.markup.clone().unwrap_or_else(|| e.text.clone()))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), SurfaceError> {
        let effects = {
            let mut state = self.state.lock();
            let idx = state.live(element)?;
            state.clicked.push(element.id().to_string());
            state.mutations += 1;
            let popover = state.elements[idx].popover;
            let effects = state.elements[idx].on_click.clone();
            // Choosing an option closes the popover it belongs to.
            if popover {
                for e in state.elements.iter_mut().filter(|e| e.popover) {
                    e.visible = false;
                }
            }
            effects
        };
        self.apply(effects);
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        let idx = state.live(element)?;
        state.mutations += 1;
        let e = &mut state.elements[idx];
        if !e.rejects_input {
            e.value = value.to_string();
        }
        Ok(())
    }

    async fn read_value(&self, element: &ElementHandle) -> Result<String, SurfaceError> {
        let state = self.state.lock();
        let idx = state.live(element)?;
        Ok(state.elements[idx].value.clone())
    }

    async fn set_files(
        &self,
        element: &ElementHandle,
        files: &[FilePayload],
    ) -> Result<(), SurfaceError> {
        let effects = {
            let mut state = self.state.lock();
            let idx = state.live(element)?;
            state.mutations += 1;
            state
                .files
                .entry(element.id().to_string())
                .or_default()
                .extend_from_slice(files);
            state.elements[idx].on_files.clone()
        };
        self.apply(effects);
        Ok(())
    }

    async fn dismiss(&self) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        state.open()?;
        state.dismissals += 1;
        state.mutations += 1;
        for e in state.elements.iter_mut().filter(|e| e.popover) {
            e.visible = false;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, SurfaceError> {
        let state = self.state.lock();
        state.open()?;
        Ok(state.url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let mut state = self.state.lock();
        state.open()?;
        state.mutations += 1;
        state.navigations.push(url.to_string());
        state.url = url.to_string();
        Ok(())
    }
}

pub const FLOW_HOME: &str = "https://labs.google/fx/tools/flow/";
pub const FLOW_PROJECT: &str = "https://labs.google/fx/tools/flow/project/p-1";

const COMBOBOX: &str = r#"button[role="combobox"]"#;
const OPTION: &str = r#"div[role="option"]"#;
const UPLOAD_SLOT: &str = "button.sc-d02e9a37-1.hvUQuN";

fn dropdown(page: FakePage, control: &str, label: &str, options: &[(&str, &str)]) -> FakePage {
    let mut control = FakeElement::new(control).matching(COMBOBOX).text(label);
    for (key, _) in options {
        control = control.on_click(Effect::show(*key));
    }
    let mut page = page.with(control);
    for (key, text) in options {
        page = page.with(
            FakeElement::new(*key)
                .matching(OPTION)
                .text(*text)
                .hidden()
                .popover(),
        );
    }
    page
}

/// A page laid out like the video tool's project view, matching the default
/// selector configuration.
///
/// Keys: `mode`, `model-button`, `tune`, `aspect`, `outputs`, `model`,
/// `prompt`, `generate`, `slot-0`, `slot-1`, `file-input`, `crop`,
/// `new-project`, and one `opt-*` key per dropdown option. The settings
/// dropdowns stay hidden until the panel is opened; the upload slots appear
/// once "Frames to Video" is chosen.
pub fn flow_page() -> FakePage {
    let page = FakePage::new().with_url(FLOW_PROJECT);
    let page = dropdown(
        page,
        "mode",
        "Text to Video",
        &[
            ("opt-mode-text", "Text to Video"),
            ("opt-mode-frames", "Frames to Video"),
            ("opt-mode-ingredients", "Ingredients to Video"),
        ],
    );
    page.on_click("opt-mode-frames", Effect::show("slot-0"));
    page.on_click("opt-mode-frames", Effect::show("slot-1"));

    let page = page
        .with(
            FakeElement::new("model-button")
                .matching("button")
                .text("Veo 3.1 - Fast")
                .on_click(Effect::show("aspect"))
                .on_click(Effect::show("outputs"))
                .on_click(Effect::show("model")),
        )
        .with(
            FakeElement::new("tune")
                .matching("button")
                .markup("<i class=\"google-symbols\">tune</i>"),
        );

    let page = dropdown(
        page,
        "aspect",
        "Aspect RatioLandscape (16:9)",
        &[
            ("opt-landscape", "Landscape (16:9)"),
            ("opt-portrait", "Portrait (9:16)"),
        ],
    );
    let page = dropdown(
        page,
        "outputs",
        "Outputs per prompt2",
        &[
            ("opt-out-1", "1"),
            ("opt-out-2", "2"),
            ("opt-out-3", "3"),
            ("opt-out-4", "4"),
        ],
    );
    let page = dropdown(
        page,
        "model",
        "ModelVeo 3.1 - Fast",
        &[
            ("opt-veo31-fast", "Veo 3.1 - Fast"),
            ("opt-veo31-relaxed", "Veo 3.1 - Fast [Lower Priority]"),
            ("opt-veo31-quality", "Veo 3.1 - Quality"),
            ("opt-veo2-fast", "Veo 2 - Fast"),
            ("opt-veo2-quality", "Veo 2 - Quality"),
        ],
    );
    for key in ["aspect", "outputs", "model"] {
        page.set_visible(key, false);
    }

    page.with(
        FakeElement::new("prompt")
            .matching("textarea#PINHOLE_TEXT_AREA_ELEMENT_ID")
            .matching("textarea"),
    )
    .with(
        FakeElement::new("generate")
            .matching("button")
            .markup("<i class=\"google-symbols\">arrow_forward</i>"),
    )
    .with(
        FakeElement::new("slot-0")
            .matching(UPLOAD_SLOT)
            .hidden()
            .on_click(Effect::show("file-input")),
    )
    .with(
        FakeElement::new("slot-1")
            .matching(UPLOAD_SLOT)
            .hidden()
            .on_click(Effect::show("file-input")),
    )
    .with(
        FakeElement::new("file-input")
            .matching(r#"input[type="file"]"#)
            .hidden()
            .on_files(Effect::show("crop")),
    )
    .with(
        FakeElement::new("crop")
            .matching("button")
            .text("Crop and Save")
            .hidden()
            .on_click(Effect::hide("crop"))
            .on_click(Effect::hide("file-input")),
    )
}
