//! Script-surface extraction: the page's global namespace into a catalog of
//! callables, data stores, inline handlers, and exposed API objects.
//!
//! Four read-only sub-scans run concurrently against the same page handle and
//! their results are joined. Every scan is best-effort: a property access that
//! throws page-side (cross-origin, proxy traps) is caught per-property inside
//! the probe and skipped, so one hostile getter never discards a pass. The
//! catalog is a lossy summary by design — duplicates and false positives are
//! acceptable, silent omission of a real capability is the failure mode to
//! guard against.

use crate::driver::PageDriver;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Result caps keep prompt size bounded on pathological pages.
const MAX_GLOBALS: usize = 50;
const MAX_HANDLERS: usize = 30;
const MAX_METHODS: usize = 20;

/// A callable or object found in the page's global namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GlobalEntry {
    Function {
        path: String,
        params: Vec<String>,
    },
    Object {
        path: String,
        methods: Vec<String>,
    },
}

impl GlobalEntry {
    pub fn path(&self) -> &str {
        match self {
            Self::Function { path, .. } | Self::Object { path, .. } => path,
        }
    }
}

/// A recognized framework-specific state container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLayerEntry {
    pub path: String,
    /// Framework tag: "gtm", "nextjs", "nuxt", "redux", "generic".
    pub framework: String,
    pub keys: Vec<String>,
    pub is_array: bool,
}

/// An inline event-handler attribute found in the DOM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHandlerEntry {
    pub locator: String,
    pub event: String,
    /// Truncated handler source snippet.
    pub snippet: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// An object matching conventional API naming, with enumerated methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposedApiEntry {
    pub path: String,
    pub methods: Vec<ApiMethod>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMethod {
    pub name: String,
    pub params: Vec<String>,
}

/// Joined output of all four sub-scans.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JsSurface {
    pub url: String,
    pub globals: Vec<GlobalEntry>,
    pub data_layers: Vec<DataLayerEntry>,
    pub event_handlers: Vec<EventHandlerEntry>,
    pub exposed_apis: Vec<ExposedApiEntry>,
}

impl JsSurface {
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
            && self.data_layers.is_empty()
            && self.event_handlers.is_empty()
            && self.exposed_apis.is_empty()
    }
}

/// Run all four sub-scans concurrently and join their results.
///
/// Individual scan failures degrade to empty sections; only reading the
/// current URL is required to succeed.
pub async fn scan(driver: &dyn PageDriver) -> anyhow::Result<JsSurface> {
    let url = driver.current_url().await?;

    let (globals, data_layers, event_handlers, exposed_apis) = tokio::join!(
        driver.evaluate(GLOBALS_SCRIPT),
        driver.evaluate(DATA_LAYERS_SCRIPT),
        driver.evaluate(EVENT_HANDLERS_SCRIPT),
        driver.evaluate(EXPOSED_APIS_SCRIPT),
    );

    Ok(JsSurface {
        url,
        globals: globals
            .map(|v| parse_globals(&v))
            .unwrap_or_else(|e| {
                debug!(error = %e, "globals scan failed");
                Vec::new()
            }),
        data_layers: data_layers
            .map(|v| parse_data_layers(&v))
            .unwrap_or_else(|e| {
                debug!(error = %e, "data layer scan failed");
                Vec::new()
            }),
        event_handlers: event_handlers
            .map(|v| parse_event_handlers(&v))
            .unwrap_or_else(|e| {
                debug!(error = %e, "event handler scan failed");
                Vec::new()
            }),
        exposed_apis: exposed_apis
            .map(|v| parse_exposed_apis(&v))
            .unwrap_or_else(|e| {
                debug!(error = %e, "exposed API scan failed");
                Vec::new()
            }),
    })
}

// ── Raw-result parsing ──────────────────────────────────────────

fn parse_globals(raw: &Value) -> Vec<GlobalEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .take(MAX_GLOBALS)
        .filter_map(|item| {
            let path = item.get("path")?.as_str()?.to_string();
            match item.get("kind")?.as_str()? {
                "function" => {
                    let src = item.get("src").and_then(Value::as_str).unwrap_or("");
                    Some(GlobalEntry::Function {
                        path,
                        params: sniff_params(src),
                    })
                }
                "object" => {
                    let methods = item
                        .get("methods")
                        .and_then(Value::as_array)
                        .map(|list| {
                            list.iter()
                                .filter_map(Value::as_str)
                                .take(MAX_METHODS)
                                .map(str::to_string)
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default();
                    (!methods.is_empty()).then_some(GlobalEntry::Object { path, methods })
                }
                _ => None,
            }
        })
        .collect()
}

fn parse_data_layers(raw: &Value) -> Vec<DataLayerEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            Some(DataLayerEntry {
                path: item.get("path")?.as_str()?.to_string(),
                framework: item
                    .get("framework")
                    .and_then(Value::as_str)
                    .unwrap_or("generic")
                    .to_string(),
                keys: item
                    .get("keys")
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                is_array: item
                    .get("is_array")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}

fn parse_event_handlers(raw: &Value) -> Vec<EventHandlerEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .take(MAX_HANDLERS)
        .filter_map(|item| {
            Some(EventHandlerEntry {
                locator: item.get("locator")?.as_str()?.to_string(),
                event: item.get("event")?.as_str()?.to_string(),
                snippet: item
                    .get("snippet")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                text: item
                    .get("text")
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            })
        })
        .collect()
}

fn parse_exposed_apis(raw: &Value) -> Vec<ExposedApiEntry> {
    let Some(items) = raw.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let path = item.get("path")?.as_str()?.to_string();
            let methods = item
                .get("methods")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .take(MAX_METHODS)
                        .filter_map(|m| {
                            Some(ApiMethod {
                                name: m.get("name")?.as_str()?.to_string(),
                                params: sniff_params(
                                    m.get("src").and_then(Value::as_str).unwrap_or(""),
                                ),
                            })
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            (!methods.is_empty()).then_some(ExposedApiEntry { path, methods })
        })
        .collect()
}

/// Extract declared parameter names from a short prefix of a function's
/// textual form. Best-effort: defaults, destructuring, and rest params
/// degrade to a placeholder name rather than failing the entry.
pub fn sniff_params(src: &str) -> Vec<String> {
    static PAREN_RE: OnceLock<Regex> = OnceLock::new();
    static ARROW_RE: OnceLock<Regex> = OnceLock::new();

    let paren_re = PAREN_RE.get_or_init(|| {
        Regex::new(r"^\s*(?:async\s+)?(?:function\s*\*?\s*[\w$]*\s*)?\(([^)]*)\)")
            .expect("static regex")
    });
    let arrow_re = ARROW_RE
        .get_or_init(|| Regex::new(r"^\s*(?:async\s+)?([\w$]+)\s*=>").expect("static regex"));

    let captured = paren_re
        .captures(src)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| {
            arrow_re
                .captures(src)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        });

    let Some(list) = captured else {
        return Vec::new();
    };

    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            // Strip default values; normalize anything non-identifier.
            let name = p.split('=').next().unwrap_or(p).trim();
            let name = name.trim_start_matches("...");
            if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
                && !name.is_empty()
            {
                name.to_string()
            } else {
                "arg".to_string()
            }
        })
        .collect()
}

// ── Page-side probes ────────────────────────────────────────────
//
// Each probe is an IIFE returning plain JSON. WebDriver executes the string
// as a function body, so the leading `return` is load-bearing: without it
// the command yields null and the whole scan comes back empty. Per-property
// try/catch lives inside the probe so an inaccessible member skips only
// itself.

const GLOBALS_SCRIPT: &str = r#"return (() => {
  const deny = new Set([
    'window','self','document','location','history','navigator','screen','frames',
    'top','parent','opener','closed','length','name','status','customElements',
    'localStorage','sessionStorage','indexedDB','caches','crypto','performance',
    'console','fetch','alert','confirm','prompt','print','open','close','focus',
    'blur','stop','scroll','scrollBy','scrollTo','moveBy','moveTo','resizeBy',
    'resizeTo','getSelection','getComputedStyle','matchMedia','requestAnimationFrame',
    'cancelAnimationFrame','requestIdleCallback','cancelIdleCallback','setTimeout',
    'clearTimeout','setInterval','clearInterval','queueMicrotask','structuredClone',
    'atob','btoa','postMessage','addEventListener','removeEventListener','dispatchEvent',
    'isSecureContext','origin','crossOriginIsolated','speechSynthesis','visualViewport',
    'event','external','screenX','screenY','innerWidth','innerHeight','outerWidth',
    'outerHeight','devicePixelRatio','pageXOffset','pageYOffset','scrollX','scrollY',
    'screenLeft','screenTop','styleMedia','onerror','globalThis','locationbar',
    'menubar','personalbar','scrollbars','statusbar','toolbar','clientInformation',
    'createImageBitmap','reportError','scheduler','trustedTypes','launchQueue',
    'navigation','cookieStore','documentPictureInPicture','sharedStorage','fence',
  ]);
  const denyPrefixes = ['webkit', 'moz', 'ms', 'chrome', '__react', '__vue', '__zone', '__core-js', 'ng'];
  const out = [];
  for (const key of Object.getOwnPropertyNames(window)) {
    if (out.length >= 50) break;
    if (deny.has(key)) continue;
    if (denyPrefixes.some((p) => key.startsWith(p))) continue;
    if (/^on[a-z]+$/.test(key)) continue;
    if (/^[A-Z][A-Za-z0-9]*$/.test(key) && key in window && typeof window[key] === 'function'
        && String(window[key]).includes('[native code]')) continue;
    try {
      const value = window[key];
      if (typeof value === 'function') {
        out.push({ path: key, kind: 'function', src: String(value).slice(0, 200) });
      } else if (value !== null && typeof value === 'object') {
        const methods = [];
        for (const prop of Object.getOwnPropertyNames(value)) {
          if (methods.length >= 20) break;
          try {
            if (typeof value[prop] === 'function') methods.push(prop);
          } catch (_) { /* inaccessible member */ }
        }
        if (methods.length > 0) out.push({ path: key, kind: 'object', methods });
      }
    } catch (_) { /* inaccessible property */ }
  }
  return out;
})()"#;

const DATA_LAYERS_SCRIPT: &str = r#"return (() => {
  const out = [];
  const keysOf = (obj) => {
    try { return Object.keys(obj).slice(0, 20); } catch (_) { return []; }
  };
  try {
    if (Array.isArray(window.dataLayer)) {
      const last = window.dataLayer[window.dataLayer.length - 1];
      out.push({ path: 'dataLayer', framework: 'gtm', is_array: true,
                 keys: last && typeof last === 'object' ? keysOf(last) : [] });
    }
  } catch (_) {}
  try {
    if (window.__NEXT_DATA__ && typeof window.__NEXT_DATA__ === 'object') {
      out.push({ path: '__NEXT_DATA__', framework: 'nextjs', is_array: false,
                 keys: keysOf(window.__NEXT_DATA__) });
    }
  } catch (_) {}
  try {
    if (window.__NUXT__ && typeof window.__NUXT__ === 'object') {
      out.push({ path: '__NUXT__', framework: 'nuxt', is_array: false,
                 keys: keysOf(window.__NUXT__) });
    }
  } catch (_) {}
  try {
    if (window.__INITIAL_STATE__ && typeof window.__INITIAL_STATE__ === 'object') {
      out.push({ path: '__INITIAL_STATE__', framework: 'generic',
                 is_array: Array.isArray(window.__INITIAL_STATE__),
                 keys: keysOf(window.__INITIAL_STATE__) });
    }
  } catch (_) {}
  try {
    if (window.store && typeof window.store.getState === 'function') {
      const state = window.store.getState();
      out.push({ path: 'store.getState()', framework: 'redux',
                 is_array: Array.isArray(state),
                 keys: state && typeof state === 'object' ? keysOf(state) : [] });
    }
  } catch (_) {}
  return out;
})()"#;

const EVENT_HANDLERS_SCRIPT: &str = r#"return (() => {
  const attrs = ['onclick','onsubmit','onchange','oninput','onkeydown','onkeyup','onmousedown','onmouseup'];
  const out = [];
  for (const attr of attrs) {
    if (out.length >= 30) break;
    for (const el of document.querySelectorAll('[' + attr + ']')) {
      if (out.length >= 30) break;
      try {
        let locator;
        if (el.id) locator = '#' + el.id;
        else if (el.getAttribute('name')) locator = '[name="' + el.getAttribute('name') + '"]';
        else locator = el.tagName.toLowerCase() + '[' + attr + ']';
        const text = (el.textContent || '').trim().replace(/\s+/g, ' ').slice(0, 60);
        out.push({ locator, event: attr.slice(2),
                   snippet: (el.getAttribute(attr) || '').slice(0, 120), text });
      } catch (_) {}
    }
  }
  return out;
})()"#;

const EXPOSED_APIS_SCRIPT: &str = r#"return (() => {
  const names = ['api','API','sdk','SDK','client','Client','service','Service','app','App','store','Store'];
  const out = [];
  for (const name of names) {
    try {
      const value = window[name];
      if (!value || typeof value !== 'object') continue;
      const methods = [];
      for (const prop of Object.getOwnPropertyNames(value)) {
        if (methods.length >= 20) break;
        try {
          if (typeof value[prop] === 'function') {
            methods.push({ name: prop, src: String(value[prop]).slice(0, 200) });
          }
        } catch (_) {}
      }
      const proto = Object.getPrototypeOf(value);
      if (proto && proto !== Object.prototype) {
        for (const prop of Object.getOwnPropertyNames(proto)) {
          if (methods.length >= 20) break;
          if (prop === 'constructor') continue;
          try {
            if (typeof proto[prop] === 'function') {
              methods.push({ name: prop, src: String(proto[prop]).slice(0, 200) });
            }
          } catch (_) {}
        }
      }
      if (methods.length > 0) out.push({ path: name, methods });
    } catch (_) {}
  }
  return out;
})()"#;
