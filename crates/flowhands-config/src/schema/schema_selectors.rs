//! Selector fallback chains for the foreign UI.
//!
//! Each control is described by an ordered chain of strategies. Chains are
//! data so that markup drift on the tool's side is fixed with a config edit.

use serde::{Deserialize, Serialize};

const COMBOBOX: &str = r#"button[role="combobox"]"#;
const BUTTON: &str = "button";

/// One way of locating an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorStrategy {
    /// Structural or attribute CSS selector.
    Css { selector: String },
    /// Elements under `scope` whose visible text contains `contains`.
    Text { scope: String, contains: String },
    /// Elements under `scope` whose inner markup contains `contains`
    /// (icon ligatures such as `arrow_forward` live here, not in the text).
    Markup { scope: String, contains: String },
    /// The `index`-th element matching `scope`.
    Index { scope: String, index: usize },
}

impl SelectorStrategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn text(scope: impl Into<String>, contains: impl Into<String>) -> Self {
        Self::Text {
            scope: scope.into(),
            contains: contains.into(),
        }
    }

    pub fn markup(scope: impl Into<String>, contains: impl Into<String>) -> Self {
        Self::Markup {
            scope: scope.into(),
            contains: contains.into(),
        }
    }

    pub fn index(scope: impl Into<String>, index: usize) -> Self {
        Self::Index {
            scope: scope.into(),
            index,
        }
    }

    /// Short human label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Css { selector } => format!("css `{}`", selector),
            Self::Text { scope, contains } => format!("text `{}` in `{}`", contains, scope),
            Self::Markup { scope, contains } => format!("markup `{}` in `{}`", contains, scope),
            Self::Index { scope, index } => format!("#{} of `{}`", index, scope),
        }
    }
}

/// Ordered fallback chain; the first strategy that matches wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorSet(Vec<SelectorStrategy>);

impl SelectorSet {
    pub fn new(strategies: Vec<SelectorStrategy>) -> Self {
        Self(strategies)
    }

    pub fn strategies(&self) -> &[SelectorStrategy] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<SelectorStrategy>> for SelectorSet {
    fn from(strategies: Vec<SelectorStrategy>) -> Self {
        Self(strategies)
    }
}

/// Selector chains for every control the automation touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    /// Generation mode dropdown.
    pub mode: SelectorSet,
    /// Aspect ratio dropdown inside the settings panel.
    pub aspect_ratio: SelectorSet,
    /// Outputs-per-prompt dropdown inside the settings panel.
    pub output_count: SelectorSet,
    /// Model dropdown inside the settings panel.
    pub model: SelectorSet,
    /// Button showing the current model name; opens the settings panel.
    pub model_button: SelectorSet,
    /// Generic settings ("tune") button; fallback for opening the panel.
    pub settings_button: SelectorSet,
    /// Prompt textarea.
    pub textarea: SelectorSet,
    /// Generate control.
    pub generate_button: SelectorSet,
    /// "New project" control on the tool home page.
    pub new_project_button: SelectorSet,
    /// Crop dialog confirmation.
    pub crop_confirm: SelectorSet,
    /// Hidden file input that appears after clicking an upload slot.
    pub file_input: SelectorSet,
    /// Rendered dropdown option elements.
    pub option: String,
    /// Class signature of the per-frame upload slots.
    pub upload_slot: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            mode: vec![SelectorStrategy::index(COMBOBOX, 0)].into(),
            aspect_ratio: vec![
                SelectorStrategy::text(COMBOBOX, "Aspect Ratio"),
                SelectorStrategy::text(COMBOBOX, "Landscape"),
                SelectorStrategy::text(COMBOBOX, "Portrait"),
                SelectorStrategy::index(COMBOBOX, 1),
            ]
            .into(),
            output_count: vec![
                SelectorStrategy::text(COMBOBOX, "Outputs per prompt"),
                SelectorStrategy::index(COMBOBOX, 2),
            ]
            .into(),
            model: vec![
                SelectorStrategy::text(COMBOBOX, "ModelVeo"),
                SelectorStrategy::text(COMBOBOX, "Veo 3.1"),
                SelectorStrategy::text(COMBOBOX, "Veo 2"),
                SelectorStrategy::index(COMBOBOX, 3),
            ]
            .into(),
            model_button: vec![
                SelectorStrategy::text(BUTTON, "Veo 3.1"),
                SelectorStrategy::text(BUTTON, "Veo 2"),
            ]
            .into(),
            settings_button: vec![SelectorStrategy::markup(BUTTON, "tune")].into(),
            textarea: vec![
                SelectorStrategy::css("textarea#PINHOLE_TEXT_AREA_ELEMENT_ID"),
                SelectorStrategy::css("textarea"),
            ]
            .into(),
            generate_button: vec![SelectorStrategy::markup(BUTTON, "arrow_forward")].into(),
            new_project_button: vec![SelectorStrategy::text(BUTTON, "New project")].into(),
            crop_confirm: vec![SelectorStrategy::text(BUTTON, "Crop and Save")].into(),
            file_input: vec![SelectorStrategy::css(r#"input[type="file"]"#)].into(),
            option: r#"div[role="option"]"#.to_string(),
            upload_slot: "button.sc-d02e9a37-1.hvUQuN".to_string(),
        }
    }
}

impl SelectorsConfig {
    /// Every named chain, for validation and diagnostics.
    pub fn chains(&self) -> Vec<(&'static str, &SelectorSet)> {
        vec![
            ("mode", &self.mode),
            ("aspect_ratio", &self.aspect_ratio),
            ("output_count", &self.output_count),
            ("model", &self.model),
            ("model_button", &self.model_button),
            ("settings_button", &self.settings_button),
            ("textarea", &self.textarea),
            ("generate_button", &self.generate_button),
            ("new_project_button", &self.new_project_button),
            ("crop_confirm", &self.crop_confirm),
            ("file_input", &self.file_input),
        ]
    }
}
