use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

/// Top-level PageForge configuration, loaded from `pageforge.toml`.
///
/// Every field has a working default; a missing config file is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Browser driver settings (`[driver]`).
    #[serde(default)]
    pub driver: DriverConfig,

    /// Extraction pass behavior (`[extraction]`).
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Output locations (`[output]`).
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            extraction: ExtractionConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults when the file does not
    /// exist. A present-but-malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

// ── Driver ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// WebDriver endpoint (chromedriver/geckodriver).
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Run the browser headless.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Explicit browser binary path, when not on PATH.
    #[serde(default)]
    pub chrome_path: Option<String>,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_headless() -> bool {
    true
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            chrome_path: None,
        }
    }
}

// ── Extraction ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// On locator collision between the two DOM passes, the tree pass wins.
    /// Set false to let the markup pass win instead.
    #[serde(default = "default_prefer_tree_pass")]
    pub prefer_tree_pass: bool,
}

fn default_prefer_tree_pass() -> bool {
    true
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            prefer_tree_pass: default_prefer_tree_pass(),
        }
    }
}

// ── Output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory generated tool sources are written to.
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,
    /// Directory recorded sessions live under.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("generated-tools")
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tools_dir: default_tools_dir(),
            sessions_dir: default_sessions_dir(),
        }
    }
}
