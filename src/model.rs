//! Normalized page model shared by the extraction passes and tool synthesis.
//!
//! A [`PageSnapshot`] is an immutable capture handed over by the browser
//! driver; the DOM extractor turns it into [`Region`]s of
//! [`InteractiveElement`]s. Every element carries a locator expression
//! sufficient to deterministically re-select it later — elements that cannot
//! satisfy that invariant are dropped during extraction, never emitted as
//! broken entries.

use serde::{Deserialize, Serialize};

/// Immutable capture of one observed page state.
///
/// `step_index` identifies which scenario step produced the capture;
/// `-1` means the initial load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    /// Raw body markup text as returned by the driver.
    pub html: String,
    /// Semantic accessibility tree, when the driver could produce one.
    #[serde(default)]
    pub accessibility: Option<AccessibilityNode>,
    /// PNG screenshot bytes, base64-encoded when present.
    #[serde(default)]
    pub screenshot_base64: Option<String>,
    pub captured_at: String,
    #[serde(default = "initial_step_index")]
    pub step_index: i32,
}

fn initial_step_index() -> i32 {
    -1
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            html: html.into(),
            accessibility: None,
            screenshot_base64: None,
            captured_at: chrono::Utc::now().to_rfc3339(),
            step_index: -1,
        }
    }
}

/// One node of the accessibility tree. Acyclic and rooted; an absent tree is
/// `None` on the snapshot, never an empty synthetic node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessibilityNode {
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub children: Vec<AccessibilityNode>,
}

/// Semantic classification of a page area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Nav,
    Main,
    Sidebar,
    Form,
    Dialog,
    Footer,
    Header,
    Section,
    /// Catch-all for elements outside any recognized landmark.
    Unknown,
}

impl RegionKind {
    /// Map an accessibility landmark role to a region kind.
    pub fn from_landmark_role(role: &str) -> Option<Self> {
        match role {
            "banner" => Some(Self::Header),
            "navigation" => Some(Self::Nav),
            "main" => Some(Self::Main),
            "contentinfo" => Some(Self::Footer),
            "complementary" => Some(Self::Sidebar),
            "form" => Some(Self::Form),
            "region" => Some(Self::Section),
            "dialog" | "alertdialog" => Some(Self::Dialog),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nav => "nav",
            Self::Main => "main",
            Self::Sidebar => "sidebar",
            Self::Form => "form",
            Self::Dialog => "dialog",
            Self::Footer => "footer",
            Self::Header => "header",
            Self::Section => "section",
            Self::Unknown => "unknown",
        }
    }
}

/// A semantically meaningful page area holding interactive elements.
///
/// Regions are keyed by landmark identity (kind + label): two elements under
/// the same enclosing landmark always land in the same region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    /// Locator expression selecting the region itself.
    pub locator: String,
    #[serde(default)]
    pub label: Option<String>,
    pub elements: Vec<InteractiveElement>,
}

impl Region {
    /// Semantic identity used for grouping during extraction.
    pub fn key(&self) -> (RegionKind, Option<&str>) {
        (self.kind, self.label.as_deref())
    }
}

/// Coarse classification of what an interactive element does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionHint {
    Navigation,
    Submission,
    Toggle,
    Input,
    Selection,
    Trigger,
    Destructive,
}

/// A single interactive unit. Immutable once created; deduplicated across
/// extraction passes by exact locator equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub tag: String,
    #[serde(default)]
    pub input_type: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Expression sufficient to deterministically re-select this element.
    pub locator: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    /// Declared choices for select-like controls.
    #[serde(default)]
    pub options: Vec<String>,
    /// Free-form data-* attributes.
    #[serde(default)]
    pub data_attributes: std::collections::BTreeMap<String, String>,
    pub action_hint: ActionHint,
}

impl InteractiveElement {
    pub fn new(tag: impl Into<String>, locator: impl Into<String>, hint: ActionHint) -> Self {
        Self {
            tag: tag.into(),
            input_type: None,
            role: None,
            locator: locator.into(),
            label: None,
            text: None,
            name: None,
            id: None,
            placeholder: None,
            href: None,
            options: Vec::new(),
            data_attributes: std::collections::BTreeMap::new(),
            action_hint: hint,
        }
    }
}

/// Infer an action hint from tag, input type, and role.
pub fn infer_action_hint(tag: &str, input_type: Option<&str>, role: Option<&str>) -> ActionHint {
    if let Some(role) = role {
        match role {
            "link" => return ActionHint::Navigation,
            "checkbox" | "radio" | "switch" => return ActionHint::Toggle,
            "combobox" | "listbox" | "option" => return ActionHint::Selection,
            "textbox" | "searchbox" | "spinbutton" | "slider" => return ActionHint::Input,
            _ => {}
        }
    }
    match tag {
        "a" => ActionHint::Navigation,
        "select" => ActionHint::Selection,
        "textarea" => ActionHint::Input,
        "input" => match input_type.unwrap_or("text") {
            "submit" | "image" => ActionHint::Submission,
            "checkbox" | "radio" => ActionHint::Toggle,
            "button" | "reset" => ActionHint::Trigger,
            _ => ActionHint::Input,
        },
        "button" => match input_type {
            Some("submit") => ActionHint::Submission,
            _ => ActionHint::Trigger,
        },
        _ => ActionHint::Trigger,
    }
}
