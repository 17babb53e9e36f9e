//! Attaching to an existing WebDriver session over raw HTTP.
//!
//! fantoccini can only create sessions, but the recorder needs every
//! invocation after `start` to command the browser session the previous
//! invocation left behind — re-creating the session (or reloading the page)
//! would wipe live page state such as filled form fields. The W3C command
//! set is small and stable, so a thin reqwest client against
//! `/session/{id}/...` covers what the recorder performs.

use super::{parse_locator, DriverAction, LocatorKind, PageDriver, ReconnectHandle};
use crate::model::{AccessibilityNode, PageSnapshot};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;

/// W3C element-reference key in find-element replies.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// [`PageDriver`] over an already-running WebDriver session.
pub struct AttachedSession {
    http: reqwest::Client,
    webdriver_url: String,
    session_id: String,
}

impl AttachedSession {
    /// Attach to the session a persisted handle names, verifying it still
    /// answers before any command runs against it.
    pub async fn attach(handle: &ReconnectHandle) -> Result<Self> {
        if handle.session_id.is_empty() {
            bail!("Reconnect handle carries no session id");
        }
        let session = Self {
            http: reqwest::Client::new(),
            webdriver_url: handle.webdriver_url.trim_end_matches('/').to_string(),
            session_id: handle.session_id.clone(),
        };
        session
            .get("url")
            .await
            .context("Recorded browser session is no longer reachable")?;
        Ok(session)
    }

    /// Handle for the next invocation, refreshed with the current URL.
    pub async fn reconnect_handle(&self) -> ReconnectHandle {
        ReconnectHandle {
            webdriver_url: self.webdriver_url.clone(),
            session_id: self.session_id.clone(),
            last_url: self.current_url().await.ok(),
        }
    }

    /// Terminate the browser session. Tolerates an already-dead process.
    pub async fn close(self) {
        let _ = self
            .http
            .delete(format!(
                "{}/session/{}",
                self.webdriver_url, self.session_id
            ))
            .send()
            .await;
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/session/{}/{}",
            self.webdriver_url, self.session_id, path
        )
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.endpoint(path))
            .send()
            .await
            .with_context(|| format!("WebDriver request failed: GET {path}"))?;
        let ok = response.status().is_success();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        unwrap_value(ok, body, path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("WebDriver request failed: POST {path}"))?;
        let ok = response.status().is_success();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        unwrap_value(ok, body, path)
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn find_element(&self, locator: &str) -> Result<String> {
        let (using, value) = match parse_locator(locator) {
            LocatorKind::Css(css) => ("css selector", css),
            LocatorKind::XPath(xpath) => ("xpath", xpath),
        };
        let reply = self
            .post("element", json!({ "using": using, "value": value }))
            .await
            .with_context(|| format!("Failed to find element '{locator}'"))?;
        extract_element_id(&reply)
            .ok_or_else(|| anyhow!("Malformed element reference for '{locator}'"))
    }
}

#[async_trait]
impl PageDriver for AttachedSession {
    async fn navigate(&self, url: &str) -> Result<PageSnapshot> {
        self.post("url", json!({ "url": url }))
            .await
            .with_context(|| format!("Failed to open URL: {url}"))?;

        let current = self.current_url().await?;
        let title = self
            .get("title")
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let html = self
            .get("source")
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let mut snapshot = PageSnapshot::new(current, title, html);
        snapshot.accessibility = self
            .evaluate(super::ACCESSIBILITY_TREE_SCRIPT)
            .await
            .ok()
            .and_then(|value| serde_json::from_value::<AccessibilityNode>(value).ok());
        snapshot.screenshot_base64 = self
            .get("screenshot")
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        Ok(snapshot)
    }

    async fn act(&self, action: &DriverAction) -> Result<()> {
        match action {
            DriverAction::Click { locator } => {
                let id = self.find_element(locator).await?;
                self.post(&format!("element/{id}/click"), json!({})).await?;
            }
            DriverAction::Fill { locator, value } => {
                let id = self.find_element(locator).await?;
                let _ = self.post(&format!("element/{id}/clear"), json!({})).await;
                self.post(&format!("element/{id}/value"), json!({ "text": value }))
                    .await?;
            }
            DriverAction::Select { locator, value } => {
                let id = self.find_element(locator).await?;
                self.execute(
                    "const el = arguments[0]; el.value = arguments[1]; \
                     el.dispatchEvent(new Event('input', { bubbles: true })); \
                     el.dispatchEvent(new Event('change', { bubbles: true }));",
                    vec![json!({ ELEMENT_KEY: id }), json!(value)],
                )
                .await
                .with_context(|| format!("Failed to select '{value}'"))?;
            }
            DriverAction::Hover { locator } => {
                let id = self.find_element(locator).await?;
                self.execute(
                    "const el = arguments[0]; \
                     el.dispatchEvent(new MouseEvent('mouseover', { bubbles: true })); \
                     el.dispatchEvent(new MouseEvent('mouseenter', { bubbles: true }));",
                    vec![json!({ ELEMENT_KEY: id })],
                )
                .await
                .context("Failed to perform hover action")?;
            }
            DriverAction::Scroll { locator } => {
                let id = self.find_element(locator).await?;
                self.execute(
                    "arguments[0].scrollIntoView({ behavior: 'instant', block: 'center' });",
                    vec![json!({ ELEMENT_KEY: id })],
                )
                .await
                .context("Failed to scroll element into view")?;
            }
            DriverAction::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            DriverAction::Navigate { url } => {
                self.post("url", json!({ "url": url }))
                    .await
                    .with_context(|| format!("Failed to open URL: {url}"))?;
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let encoded = self
            .get("screenshot")
            .await
            .context("Failed to capture screenshot")?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| anyhow!("Screenshot reply is not a string"))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Screenshot reply is not valid base64")
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.execute(script, vec![])
            .await
            .context("Failed to evaluate script in page context")
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.get("url").await.context("Failed to read current URL")?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("URL reply is not a string"))
    }
}

/// Unwrap the `{ "value": ... }` envelope every WebDriver reply carries;
/// error replies put `{ "error", "message" }` inside it.
fn unwrap_value(ok: bool, mut body: Value, path: &str) -> Result<Value> {
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if ok {
        return Ok(value);
    }
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown WebDriver error");
    bail!("WebDriver command '{path}' failed: {message}")
}

fn extract_element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY).and_then(Value::as_str).map(str::to_string)
}
