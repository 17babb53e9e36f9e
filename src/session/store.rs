//! On-disk session state: the durable record that lets each recorder
//! operation run as a separate process invocation.
//!
//! Every file is rewritten wholesale on update; the append-only action log is
//! a full read-modify-write of `action-log.json`. The store assumes a single
//! writer at a time — the external driver serializes invocations, and a
//! concurrent second writer would race on these files (unsupported).

use crate::driver::{DriverAction, ReconnectHandle};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STATE_FILE: &str = "session.json";
pub const LOG_FILE: &str = "action-log.json";
pub const TOOLS_FILE: &str = "tools.json";
pub const SCREENSHOT_FILE: &str = "screenshot-latest.png";

/// Persisted session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub goal: String,
    pub current_url: String,
    #[serde(default)]
    pub step_count: u32,
    pub started_at: String,
    /// Handle for re-establishing the driver connection.
    pub handle: ReconnectHandle,
}

/// One entry of the append-only action log. The log, not the live browser,
/// is the single source of truth session-tools are derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub index: u32,
    #[serde(flatten)]
    pub action: DriverAction,
    /// Tool name this action was tagged with, when recording a tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_tag: Option<String>,
    /// Page URL after the action completed (or failed).
    pub result_url: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Relative path of the screenshot captured after this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

/// File-backed accessor for one session directory.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the session directory. Fatal when it cannot be created.
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create session directory {}", self.dir.display()))
    }

    pub fn load_state(&self) -> Result<SessionState> {
        let path = self.dir.join(STATE_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Malformed {}", path.display()))
    }

    pub fn save_state(&self, state: &SessionState) -> Result<()> {
        self.write_json(STATE_FILE, state)
    }

    pub fn load_log(&self) -> Result<Vec<ActionLogEntry>> {
        let path = self.dir.join(LOG_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Malformed {}", path.display()))
    }

    /// Append one entry: whole-file read-modify-write, never a partial write.
    pub fn append_log(&self, entry: ActionLogEntry) -> Result<()> {
        let mut log = self.load_log()?;
        log.push(entry);
        self.write_json(LOG_FILE, &log)
    }

    pub fn save_tools<T: Serialize>(&self, tools: &[T]) -> Result<()> {
        self.write_json(TOOLS_FILE, &tools)
    }

    pub fn write_screenshot(&self, png: &[u8]) -> Result<()> {
        let path = self.dir.join(SCREENSHOT_FILE);
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.dir.join(file);
        let raw = serde_json::to_string_pretty(value).context("Failed to serialize state")?;
        std::fs::write(&path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> SessionState {
        SessionState {
            goal: "order a pizza".into(),
            current_url: "https://pizza.example".into(),
            step_count: 0,
            started_at: chrono::Utc::now().to_rfc3339(),
            handle: ReconnectHandle {
                webdriver_url: "http://127.0.0.1:9515".into(),
                session_id: "3f2a".into(),
                last_url: Some("https://pizza.example".into()),
            },
        }
    }

    fn entry(index: u32, action: DriverAction) -> ActionLogEntry {
        ActionLogEntry {
            index,
            action,
            tool_tag: None,
            result_url: "https://pizza.example".into(),
            success: true,
            error: None,
            screenshot: Some(SCREENSHOT_FILE.into()),
        }
    }

    #[test]
    fn state_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        store.init().unwrap();
        store.save_state(&sample_state()).unwrap();

        let loaded = store.load_state().unwrap();
        assert_eq!(loaded.goal, "order a pizza");
        assert_eq!(loaded.handle.webdriver_url, "http://127.0.0.1:9515");
        // The session id is what later invocations re-attach with.
        assert_eq!(loaded.handle.session_id, "3f2a");
    }

    #[test]
    fn log_appends_preserve_order() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        store.init().unwrap();

        assert!(store.load_log().unwrap().is_empty());
        store
            .append_log(entry(0, DriverAction::Click { locator: "#a".into() }))
            .unwrap();
        store
            .append_log(entry(
                1,
                DriverAction::Fill {
                    locator: "#b".into(),
                    value: "x".into(),
                },
            ))
            .unwrap();

        let log = store.load_log().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].index, 0);
        assert_eq!(log[1].action.kind(), "fill");
    }

    #[test]
    fn log_entry_serializes_action_inline() {
        let serialized = serde_json::to_value(entry(
            0,
            DriverAction::Fill {
                locator: "[name=\"q\"]".into(),
                value: "rust".into(),
            },
        ))
        .unwrap();
        assert_eq!(serialized["action"], "fill");
        assert_eq!(serialized["locator"], "[name=\"q\"]");
        assert_eq!(serialized["value"], "rust");
        assert_eq!(serialized["success"], true);
    }

    #[test]
    fn missing_state_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        assert!(store.load_state().is_err());
    }

    #[test]
    fn screenshot_writes_file() {
        let tmp = TempDir::new().unwrap();
        let store = SessionStore::new(tmp.path());
        store.init().unwrap();
        store.write_screenshot(&[137, 80, 78, 71]).unwrap();
        assert!(tmp.path().join(SCREENSHOT_FILE).exists());
    }
}
