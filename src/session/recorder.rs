//! Session recorder: Uninitialized → Started → (Stepping)* → Closed.
//!
//! Each operation is a discrete process invocation. State lives on disk
//! between invocations and each one re-attaches to the live browser session
//! by id, so page state mutated by earlier steps carries forward; nothing
//! is held only in memory.

use super::derive::{derive_tools, SessionTool};
use super::store::{ActionLogEntry, SessionState, SessionStore, SCREENSHOT_FILE};
use crate::config::DriverConfig;
use crate::driver::{AttachedSession, DriverAction, PageDriver, WebDriverSession};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Post-action settle delay. Fixed by design, not caller-configurable.
const SETTLE_DELAY_MS: u64 = 400;

/// One recording session, identified by its directory.
pub struct SessionRecorder {
    store: SessionStore,
    driver: DriverConfig,
}

impl SessionRecorder {
    pub fn new(dir: impl Into<PathBuf>, driver: DriverConfig) -> Self {
        Self {
            store: SessionStore::new(dir),
            driver,
        }
    }

    /// Open a browser, navigate, and persist the initial session state.
    /// Directory-creation and navigation failures are fatal.
    pub async fn start(&self, url: &str, goal: &str) -> Result<SessionState> {
        self.store.init()?;

        let session = WebDriverSession::connect(
            &self.driver.webdriver_url,
            self.driver.headless,
            self.driver.chrome_path.as_deref(),
        )
        .await?;
        let snapshot = session.navigate(url).await?;

        match session.screenshot().await {
            Ok(png) => self.store.write_screenshot(&png)?,
            Err(e) => warn!("Initial screenshot failed: {e:#}"),
        }

        let state = SessionState {
            goal: goal.to_string(),
            current_url: snapshot.url.clone(),
            step_count: 0,
            started_at: chrono::Utc::now().to_rfc3339(),
            handle: session.reconnect_handle().await,
        };
        self.store.save_state(&state)?;

        info!(
            url = %state.current_url,
            dir = %self.store.dir().display(),
            "Session started"
        );
        Ok(state)
    }

    /// Perform exactly one action. Action failure is recorded, not raised;
    /// a post-action screenshot is captured regardless of success.
    pub async fn step(
        &self,
        action: DriverAction,
        tool_tag: Option<String>,
    ) -> Result<ActionLogEntry> {
        let mut state = self.store.load_state().context("Session not started")?;
        let session = AttachedSession::attach(&state.handle).await?;

        let outcome = session.act(&action).await;
        tokio::time::sleep(Duration::from_millis(SETTLE_DELAY_MS)).await;

        let screenshot = match session.screenshot().await {
            Ok(png) => {
                self.store.write_screenshot(&png)?;
                Some(SCREENSHOT_FILE.to_string())
            }
            Err(e) => {
                warn!("Post-action screenshot failed: {e:#}");
                None
            }
        };

        let result_url = session
            .current_url()
            .await
            .unwrap_or_else(|_| state.current_url.clone());

        let entry = ActionLogEntry {
            index: state.step_count,
            action,
            tool_tag,
            result_url: result_url.clone(),
            success: outcome.is_ok(),
            error: outcome.err().map(|e| format!("{e:#}")),
            screenshot,
        };
        self.store.append_log(entry.clone())?;

        state.step_count += 1;
        state.current_url = result_url;
        state.handle = session.reconnect_handle().await;
        self.store.save_state(&state)?;

        if entry.success {
            info!(step = entry.index, action = entry.action.kind(), "Step recorded");
        } else {
            warn!(
                step = entry.index,
                action = entry.action.kind(),
                error = entry.error.as_deref().unwrap_or(""),
                "Step failed (recorded)"
            );
        }
        Ok(entry)
    }

    /// Capture the current page image. No log mutation.
    pub async fn screenshot(&self) -> Result<PathBuf> {
        let state = self.store.load_state().context("Session not started")?;
        let session = AttachedSession::attach(&state.handle).await?;
        let png = session.screenshot().await?;
        self.store.write_screenshot(&png)?;
        Ok(self.store.dir().join(SCREENSHOT_FILE))
    }

    /// Terminate the browser (tolerating an already-dead process), replay the
    /// log, and persist the derived session-tools.
    pub async fn close(&self) -> Result<Vec<SessionTool>> {
        match self.store.load_state() {
            Ok(state) => match AttachedSession::attach(&state.handle).await {
                Ok(session) => session.close().await,
                Err(e) => warn!("Browser already gone at close: {e:#}"),
            },
            Err(e) => warn!("No session state at close: {e:#}"),
        }

        let log = self.store.load_log()?;
        let tools = derive_tools(&log);
        self.store.save_tools(&tools)?;

        info!(
            actions = log.len(),
            tools = tools.len(),
            "Session closed"
        );
        Ok(tools)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}
