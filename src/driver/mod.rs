//! Browser driver boundary.
//!
//! The core consumes only the [`PageDriver`] contract: navigate, act,
//! screenshot, evaluate, current URL. [`WebDriverSession`] is the bundled
//! WebDriver-backed implementation (chromedriver/geckodriver via fantoccini);
//! everything above this module stays driver-agnostic.
//!
//! Locator expressions accept three dialects: bare CSS, `text=<needle>`
//! (XPath contains on normalized text), and `label=<needle>` (label-adjacent
//! form controls).

mod remote;

pub use remote::AttachedSession;

use crate::model::{AccessibilityNode, PageSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use fantoccini::actions::{InputSource, MouseActions, PointerAction};
use fantoccini::{Client, ClientBuilder, Locator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// One UI action the driver can perform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DriverAction {
    Click { locator: String },
    Fill { locator: String, value: String },
    Select { locator: String, value: String },
    Hover { locator: String },
    Scroll { locator: String },
    Wait { ms: u64 },
    Navigate { url: String },
}

impl DriverAction {
    /// Stable action keyword, used in log entries and derived tool names.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Select { .. } => "select",
            Self::Hover { .. } => "hover",
            Self::Scroll { .. } => "scroll",
            Self::Wait { .. } => "wait",
            Self::Navigate { .. } => "navigate",
        }
    }

    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::Click { locator }
            | Self::Fill { locator, .. }
            | Self::Select { locator, .. }
            | Self::Hover { locator }
            | Self::Scroll { locator } => Some(locator),
            Self::Wait { .. } | Self::Navigate { .. } => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Fill { value, .. } | Self::Select { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Serializable handle for re-attaching to the live browser session from a
/// later process invocation. The WebDriver session outlives any single
/// command; [`AttachedSession`] issues commands against it by id, so page
/// state mutated by earlier steps stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectHandle {
    pub webdriver_url: String,
    #[serde(default)]
    pub session_id: String,
    /// Last recorded page URL, kept for session state display.
    #[serde(default)]
    pub last_url: Option<String>,
}

/// Contract consumed by extraction and the session recorder.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and return an immutable capture of the resulting page state.
    async fn navigate(&self, url: &str) -> Result<PageSnapshot>;
    /// Perform exactly one UI action.
    async fn act(&self, action: &DriverAction) -> Result<()>;
    /// Capture a PNG screenshot of the current page.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Run a script in page context and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<Value>;
    /// Read the current page URL.
    async fn current_url(&self) -> Result<String>;
}

/// WebDriver-backed [`PageDriver`].
pub struct WebDriverSession {
    client: Client,
    webdriver_url: String,
}

impl WebDriverSession {
    /// Connect to a WebDriver endpoint and open a fresh browser session.
    pub async fn connect(
        webdriver_url: &str,
        headless: bool,
        chrome_path: Option<&str>,
    ) -> Result<Self> {
        let mut capabilities: Map<String, Value> = Map::new();
        let mut chrome_options: Map<String, Value> = Map::new();
        let mut args: Vec<Value> = Vec::new();

        if headless {
            args.push(Value::String("--headless=new".to_string()));
            args.push(Value::String("--disable-gpu".to_string()));
        }
        if !args.is_empty() {
            chrome_options.insert("args".to_string(), Value::Array(args));
        }
        if let Some(path) = chrome_path {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                chrome_options.insert("binary".to_string(), Value::String(trimmed.to_string()));
            }
        }
        if !chrome_options.is_empty() {
            capabilities.insert(
                "goog:chromeOptions".to_string(),
                Value::Object(chrome_options),
            );
        }

        let mut builder = ClientBuilder::rustls().context("Failed to initialize rustls connector")?;
        if !capabilities.is_empty() {
            builder.capabilities(capabilities);
        }

        let client = builder.connect(webdriver_url).await.with_context(|| {
            format!(
                "Failed to connect to WebDriver at {webdriver_url}. Start chromedriver/geckodriver first"
            )
        })?;

        Ok(Self {
            client,
            webdriver_url: webdriver_url.to_string(),
        })
    }

    /// Handle for re-attaching to this session from a later process
    /// invocation.
    pub async fn reconnect_handle(&self) -> ReconnectHandle {
        ReconnectHandle {
            webdriver_url: self.webdriver_url.clone(),
            session_id: self
                .client
                .session_id()
                .await
                .ok()
                .flatten()
                .unwrap_or_default(),
            last_url: self.client.current_url().await.ok().map(|u| u.to_string()),
        }
    }

    /// Terminate the browser session. Tolerates an already-closed process.
    pub async fn close(self) {
        let _ = self.client.close().await;
    }

    async fn find_element(&self, locator: &str) -> Result<fantoccini::elements::Element> {
        match parse_locator(locator) {
            LocatorKind::Css(css) => self
                .client
                .find(Locator::Css(&css))
                .await
                .with_context(|| format!("Failed to find element by CSS '{css}'")),
            LocatorKind::XPath(xpath) => self
                .client
                .find(Locator::XPath(&xpath))
                .await
                .with_context(|| format!("Failed to find element by XPath '{xpath}'")),
        }
    }
}

#[async_trait]
impl PageDriver for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<PageSnapshot> {
        self.client
            .goto(url)
            .await
            .with_context(|| format!("Failed to open URL: {url}"))?;

        let current = self
            .client
            .current_url()
            .await
            .context("Failed to read current URL after navigation")?;
        let title = self.client.title().await.unwrap_or_default();
        let html = self.client.source().await.unwrap_or_default();

        let mut snapshot = PageSnapshot::new(current.as_str(), title, html);
        snapshot.accessibility = self
            .evaluate(ACCESSIBILITY_TREE_SCRIPT)
            .await
            .ok()
            .and_then(|value| serde_json::from_value::<AccessibilityNode>(value).ok());
        snapshot.screenshot_base64 = self
            .screenshot()
            .await
            .ok()
            .map(|png| base64::engine::general_purpose::STANDARD.encode(png));
        Ok(snapshot)
    }

    async fn act(&self, action: &DriverAction) -> Result<()> {
        match action {
            DriverAction::Click { locator } => {
                self.find_element(locator).await?.click().await?;
            }
            DriverAction::Fill { locator, value } => {
                let element = self.find_element(locator).await?;
                let _ = element.clear().await;
                element.send_keys(value).await?;
            }
            DriverAction::Select { locator, value } => {
                let element = self.find_element(locator).await?;
                element
                    .select_by_value(value)
                    .await
                    .with_context(|| format!("Failed to select '{value}'"))?;
            }
            DriverAction::Hover { locator } => {
                let element = self.find_element(locator).await?;
                let actions =
                    MouseActions::new("mouse".to_string()).then(PointerAction::MoveToElement {
                        element: element.clone(),
                        duration: Some(Duration::from_millis(150)),
                        x: 0.0,
                        y: 0.0,
                    });
                self.client
                    .perform_actions(actions)
                    .await
                    .context("Failed to perform hover action")?;
                let _ = self.client.release_actions().await;
            }
            DriverAction::Scroll { locator } => {
                let script = format!(
                    "const el = document.querySelector({}); if (el) el.scrollIntoView({{behavior: 'instant', block: 'center'}});",
                    serde_json::to_string(locator).unwrap_or_else(|_| "\"\"".into())
                );
                self.client
                    .execute(&script, vec![])
                    .await
                    .context("Failed to execute scroll script")?;
            }
            DriverAction::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            DriverAction::Navigate { url } => {
                self.client
                    .goto(url)
                    .await
                    .with_context(|| format!("Failed to open URL: {url}"))?;
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .context("Failed to capture screenshot")
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.client
            .execute(script, vec![])
            .await
            .context("Failed to evaluate script in page context")
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .client
            .current_url()
            .await
            .context("Failed to read current URL")?
            .to_string())
    }
}

// ── Locator dialects ────────────────────────────────────────────

pub(crate) enum LocatorKind {
    Css(String),
    XPath(String),
}

pub(crate) fn parse_locator(locator: &str) -> LocatorKind {
    let trimmed = locator.trim();
    if let Some(text_query) = trimmed.strip_prefix("text=") {
        return LocatorKind::XPath(xpath_contains_text(text_query));
    }
    if let Some(label_query) = trimmed.strip_prefix("label=") {
        let literal = xpath_literal(label_query);
        return LocatorKind::XPath(format!(
            "(//label[contains(normalize-space(.), {literal})]/following::*[self::input or self::textarea or self::select][1] | //*[@aria-label and contains(normalize-space(@aria-label), {literal})])"
        ));
    }
    LocatorKind::Css(trimmed.to_string())
}

fn xpath_contains_text(text: &str) -> String {
    format!("//*[contains(normalize-space(.), {})]", xpath_literal(text))
}

fn xpath_literal(input: &str) -> String {
    if !input.contains('"') {
        return format!("\"{input}\"");
    }
    if !input.contains('\'') {
        return format!("'{input}'");
    }

    let segments: Vec<&str> = input.split('"').collect();
    let mut parts: Vec<String> = Vec::new();
    for (index, part) in segments.iter().enumerate() {
        if !part.is_empty() {
            parts.push(format!("\"{part}\""));
        }
        if index + 1 < segments.len() {
            parts.push("'\"'".to_string());
        }
    }

    if parts.is_empty() {
        "\"\"".to_string()
    } else {
        format!("concat({})", parts.join(","))
    }
}

/// Page-side probe that mirrors the browser's accessibility computation
/// closely enough for region grouping: explicit roles win, implicit roles
/// come from tag mapping, names from aria-label/text. Returns null when the
/// document has no body. The leading `return` is required — WebDriver runs
/// the string as a function body and a bare expression yields null.
pub(crate) const ACCESSIBILITY_TREE_SCRIPT: &str = r#"return (() => {
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || 'text').toLowerCase();
    switch (tag) {
      case 'a': return el.hasAttribute('href') ? 'link' : null;
      case 'button': return 'button';
      case 'select': return el.multiple ? 'listbox' : 'combobox';
      case 'textarea': return 'textbox';
      case 'option': return 'option';
      case 'nav': return 'navigation';
      case 'main': return 'main';
      case 'aside': return 'complementary';
      case 'form': return 'form';
      case 'dialog': return 'dialog';
      case 'header': return 'banner';
      case 'footer': return 'contentinfo';
      case 'section': return el.hasAttribute('aria-label') ? 'region' : null;
      case 'input':
        if (type === 'checkbox') return 'checkbox';
        if (type === 'radio') return 'radio';
        if (type === 'search') return 'searchbox';
        if (type === 'range') return 'slider';
        if (type === 'number') return 'spinbutton';
        if (type === 'submit' || type === 'button' || type === 'reset') return 'button';
        if (type === 'hidden') return null;
        return 'textbox';
      default: return null;
    }
  };
  const accessibleName = (el) => {
    const label = el.getAttribute('aria-label');
    if (label) return label.trim();
    if (el.labels && el.labels.length > 0) return el.labels[0].textContent.trim();
    const text = (el.textContent || '').trim().replace(/\s+/g, ' ');
    return text.length > 0 && text.length <= 120 ? text : null;
  };
  const build = (el) => {
    let role = el.getAttribute('role') || implicitRole(el);
    const children = [];
    for (const child of el.children) {
      const built = build(child);
      if (built) children.push(built);
    }
    if (!role && children.length === 0) return null;
    if (!role) role = 'generic';
    const node = { role, children };
    const name = accessibleName(el);
    if (name) node.name = name;
    if ('value' in el && typeof el.value === 'string' && el.value) node.value = el.value;
    if (el.disabled) node.disabled = true;
    return node;
  };
  const root = document.body;
  if (!root) return null;
  return build(root) || null;
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_action_serde_is_tagged() {
        let action = DriverAction::Fill {
            locator: "#email".into(),
            value: "a@b.com".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "fill");
        assert_eq!(json["locator"], "#email");

        let parsed: DriverAction =
            serde_json::from_value(json!({"action": "wait", "ms": 500})).unwrap();
        assert_eq!(parsed, DriverAction::Wait { ms: 500 });
    }

    #[test]
    fn action_kind_and_accessors() {
        let fill = DriverAction::Fill {
            locator: "[name=\"q\"]".into(),
            value: "rust".into(),
        };
        assert_eq!(fill.kind(), "fill");
        assert_eq!(fill.locator(), Some("[name=\"q\"]"));
        assert_eq!(fill.value(), Some("rust"));

        let wait = DriverAction::Wait { ms: 100 };
        assert!(wait.locator().is_none());
        assert!(wait.value().is_none());
    }

    #[test]
    fn text_locator_becomes_xpath() {
        match parse_locator("text=Add to cart") {
            LocatorKind::XPath(xpath) => {
                assert!(xpath.contains("normalize-space"));
                assert!(xpath.contains("Add to cart"));
            }
            LocatorKind::Css(_) => panic!("expected xpath"),
        }
    }

    #[test]
    fn css_locator_passes_through() {
        match parse_locator("  #buy  ") {
            LocatorKind::Css(css) => assert_eq!(css, "#buy"),
            LocatorKind::XPath(_) => panic!("expected css"),
        }
    }

    #[test]
    fn xpath_literal_handles_mixed_quotes() {
        assert_eq!(xpath_literal("plain"), "\"plain\"");
        assert_eq!(xpath_literal("it\"s"), "'it\"s'");
        assert!(xpath_literal("a\"b'c").starts_with("concat("));
    }

    #[test]
    fn reconnect_handle_roundtrips() {
        let handle = ReconnectHandle {
            webdriver_url: "http://127.0.0.1:9515".into(),
            session_id: "3f2a".into(),
            last_url: Some("https://example.com/cart".into()),
        };
        let json = serde_json::to_string(&handle).unwrap();
        let parsed: ReconnectHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.webdriver_url, handle.webdriver_url);
        assert_eq!(parsed.session_id, "3f2a");
        assert_eq!(parsed.last_url, handle.last_url);
    }

    #[test]
    fn accessibility_probe_returns_its_payload() {
        // Execute-script runs this as a function body; without the return
        // the capture comes back null and the tree pass never runs.
        assert!(ACCESSIBILITY_TREE_SCRIPT.trim_start().starts_with("return ("));
    }
}
