//! Deterministic rendering of extraction output into the structured document
//! handed to the external reasoning agent.
//!
//! Four ordered sections: context header, DOM analysis, JS surface, and a
//! fixed instructions-plus-output-schema block. Empty inputs render explicit
//! placeholders instead of omitting their section, so the agent always sees
//! the same document structure.

use crate::extract::{GlobalEntry, JsSurface, PageModel};
use std::fmt::Write as _;

/// Extraction output for one captured page.
#[derive(Debug, Clone)]
pub struct PageAnalysis {
    pub url: String,
    /// Scenario step that produced the capture; -1 is the initial load.
    pub step_index: i32,
    pub dom: PageModel,
    pub js: JsSurface,
}

/// Decision rules and reply-shape description appended verbatim to every
/// prompt. Kept as a constant so tests can assert on its presence.
pub const INSTRUCTIONS: &str = r##"## Instructions

Propose tools an autonomous agent could invoke on this site. Rules:

1. Prefer a direct js-call over UI simulation whenever a matching global
   function or API method exists for the capability.
2. Group related form fields into a single tool rather than one tool per
   field.
3. Tag tools correctly: readOnly for pure reads, destructive for deletions
   or irreversible changes, requiresConfirmation for purchases and similar
   commitments, openWorld when effects reach beyond the current site.
4. Give every tool a concise camelCase name and a one-sentence description.

Reply with a JSON array (optionally fenced) of proposal objects:

```json
[{
  "name": "toolName",
  "description": "What it does",
  "inputSchema": {
    "properties": {"param": {"type": "string", "description": "..."}},
    "required": ["param"]
  },
  "actionType": "js-call" | "dom-action",
  "actionDetails":
    {"functionPath": "path.to.fn", "args": [{"name": "a", "property": "param"}], "returnType": "object"}
    | {"steps": [{"action": "fill", "locator": "#field", "inputProperty": "param"},
                 {"action": "click", "locator": "#submit"}]},
  "annotations": {"readOnly": false, "destructive": false, "requiresConfirmation": false, "openWorld": false},
  "urlPattern": "https://example.com/*"
}]
```"##;

/// Render the full prompt document for one or more captured pages.
pub fn build_prompt(scenario: &str, pages: &[PageAnalysis]) -> String {
    let mut out = String::new();

    // Context header.
    out.push_str("# Web Page Tool Analysis\n\n");
    if scenario.trim().is_empty() {
        out.push_str("Scenario: (none provided)\n");
    } else {
        let _ = writeln!(out, "Scenario: {}", scenario.trim());
    }
    if let Some(first) = pages.first() {
        let _ = writeln!(out, "Primary URL: {}", first.url);
    }
    out.push('\n');

    // DOM analysis.
    out.push_str("## DOM Analysis\n\n");
    if pages.iter().all(|p| p.dom.regions.is_empty()) {
        out.push_str("No DOM analysis available.\n\n");
    } else {
        for page in pages {
            let _ = writeln!(out, "### Page {} ({})", page_label(page.step_index), page.url);
            if page.dom.regions.is_empty() {
                out.push_str("No interactive elements found.\n");
            }
            for region in &page.dom.regions {
                match &region.label {
                    Some(label) => {
                        let _ = writeln!(
                            out,
                            "- Region: {} \"{}\" ({})",
                            region.kind.as_str(),
                            label,
                            region.locator
                        );
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "- Region: {} ({})",
                            region.kind.as_str(),
                            region.locator
                        );
                    }
                }
                for el in &region.elements {
                    let mut attrs: Vec<String> = Vec::new();
                    if let Some(t) = &el.input_type {
                        attrs.push(format!("type={t}"));
                    }
                    if let Some(n) = &el.name {
                        attrs.push(format!("name={n}"));
                    }
                    if let Some(p) = &el.placeholder {
                        attrs.push(format!("placeholder={p}"));
                    }
                    if let Some(h) = &el.href {
                        attrs.push(format!("href={h}"));
                    }
                    if let Some(t) = &el.text {
                        attrs.push(format!("text={t}"));
                    }
                    let _ = write!(
                        out,
                        "  - <{}> {} [{:?}]",
                        el.tag, el.locator, el.action_hint
                    );
                    if !attrs.is_empty() {
                        let _ = write!(out, " {}", attrs.join(" "));
                    }
                    if !el.options.is_empty() {
                        let _ = write!(out, " options: [{}]", el.options.join(", "));
                    }
                    out.push('\n');
                }
            }
            out.push('\n');
        }
    }

    // JS surface.
    out.push_str("## JavaScript Surface\n\n");
    if pages.iter().all(|p| p.js.is_empty()) {
        out.push_str("No JavaScript surface analysis available.\n\n");
    } else {
        for page in pages {
            let _ = writeln!(out, "### Page {} ({})", page_label(page.step_index), page.url);
            if page.js.is_empty() {
                out.push_str("No script surface found.\n\n");
                continue;
            }
            if !page.js.globals.is_empty() {
                out.push_str("Globals:\n");
                for global in &page.js.globals {
                    match global {
                        GlobalEntry::Function { path, params } => {
                            let _ = writeln!(out, "- function {path}({})", params.join(", "));
                        }
                        GlobalEntry::Object { path, methods } => {
                            let _ = writeln!(out, "- object {path} {{ {} }}", methods.join(", "));
                        }
                    }
                }
            }
            if !page.js.data_layers.is_empty() {
                out.push_str("Data layers:\n");
                for layer in &page.js.data_layers {
                    let shape = if layer.is_array { "array" } else { "object" };
                    let _ = writeln!(
                        out,
                        "- {} ({}, {shape}) keys: [{}]",
                        layer.path,
                        layer.framework,
                        layer.keys.join(", ")
                    );
                }
            }
            if !page.js.event_handlers.is_empty() {
                out.push_str("Inline handlers:\n");
                for handler in &page.js.event_handlers {
                    let _ = write!(
                        out,
                        "- {} on{}: {}",
                        handler.locator, handler.event, handler.snippet
                    );
                    if let Some(text) = &handler.text {
                        let _ = write!(out, " (\"{text}\")");
                    }
                    out.push('\n');
                }
            }
            if !page.js.exposed_apis.is_empty() {
                out.push_str("Exposed APIs:\n");
                for api in &page.js.exposed_apis {
                    let methods: Vec<String> = api
                        .methods
                        .iter()
                        .map(|m| format!("{}({})", m.name, m.params.join(", ")))
                        .collect();
                    let _ = writeln!(out, "- {}: {}", api.path, methods.join(", "));
                }
            }
            out.push('\n');
        }
    }

    out.push_str(INSTRUCTIONS);
    out.push('\n');
    out
}

fn page_label(step_index: i32) -> String {
    if step_index < 0 {
        "initial".to_string()
    } else {
        format!("step {step_index}")
    }
}
