//! Deriving reusable tools from a recorded action log, and converting them
//! into canonical tool proposals.
//!
//! Grouping: successful, tool-tagged log entries, grouped by tag in log
//! order. Fill/select steps that carried a concrete value become required
//! input-schema properties, named from the step's locator (name attribute,
//! else id, else placeholder, else `<action>Value`). Wait and navigate
//! entries are session scaffolding and are dropped from the derived step
//! list; the set of page URLs visited becomes the tool's applicability
//! patterns.

use super::store::ActionLogEntry;
use crate::driver::DriverAction;
use crate::proposal::{
    ActionDetails, DomActionDetails, DomStep, DomStepKind, InputSchema, PropertySchema,
    ToolProposal,
};
use crate::util::camel_case_ident;
use serde::{Deserialize, Serialize};

/// Description used for proposals converted from recorded sessions; the
/// recording driver has no richer text to offer.
const SESSION_TOOL_DESCRIPTION: &str = "Tool recorded from an interactive browser session.";

/// A tool derived from a tagged, recorded action sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTool {
    pub name: String,
    pub steps: Vec<SessionStep>,
    pub input_schema: InputSchema,
    /// Page URLs visited while the group's actions ran.
    pub url_patterns: Vec<String>,
}

/// One step of a session-tool, with the schema property that feeds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStep {
    pub kind: SessionStepKind,
    pub locator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStepKind {
    Click,
    Fill,
    Select,
    Hover,
    Scroll,
}

/// Derive session-tools from a full action log.
pub fn derive_tools(log: &[ActionLogEntry]) -> Vec<SessionTool> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<&ActionLogEntry>> =
        std::collections::HashMap::new();

    for entry in log {
        if !entry.success {
            continue;
        }
        let Some(tag) = entry.tool_tag.as_deref() else {
            continue;
        };
        if !groups.contains_key(tag) {
            order.push(tag.to_string());
        }
        groups.entry(tag.to_string()).or_default().push(entry);
    }

    order
        .into_iter()
        .map(|tag| {
            let entries = groups.remove(&tag).unwrap_or_default();
            build_tool(tag, &entries)
        })
        .collect()
}

fn build_tool(name: String, entries: &[&ActionLogEntry]) -> SessionTool {
    let mut steps = Vec::new();
    let mut schema = InputSchema::default();
    let mut url_patterns: Vec<String> = Vec::new();

    for entry in entries {
        if !entry.result_url.is_empty() {
            let pattern = url_pattern_of(&entry.result_url);
            if !url_patterns.contains(&pattern) {
                url_patterns.push(pattern);
            }
        }

        let (kind, locator) = match &entry.action {
            DriverAction::Click { locator } => (SessionStepKind::Click, locator.clone()),
            DriverAction::Fill { locator, .. } => (SessionStepKind::Fill, locator.clone()),
            DriverAction::Select { locator, .. } => (SessionStepKind::Select, locator.clone()),
            DriverAction::Hover { locator } => (SessionStepKind::Hover, locator.clone()),
            DriverAction::Scroll { locator } => (SessionStepKind::Scroll, locator.clone()),
            // Session-only scaffolding, not part of the reusable tool.
            DriverAction::Wait { .. } | DriverAction::Navigate { .. } => continue,
        };

        let property = entry.action.value().map(|_| {
            let name = property_name_for(&entry.action, &locator, &schema);
            schema
                .properties
                .insert(name.clone(), PropertySchema::string());
            schema.required.push(name.clone());
            name
        });

        steps.push(SessionStep {
            kind,
            locator,
            property,
        });
    }

    SessionTool {
        name,
        steps,
        input_schema: schema,
        url_patterns,
    }
}

/// Name a schema property from the step's locator: name attribute, else id,
/// else placeholder, else a `<action>Value` fallback. Collisions get a
/// numeric suffix so each valued step keeps its own property.
fn property_name_for(action: &DriverAction, locator: &str, schema: &InputSchema) -> String {
    let token = extract_attr(locator, "name")
        .or_else(|| locator.strip_prefix('#').map(str::to_string))
        .or_else(|| extract_attr(locator, "placeholder"))
        .unwrap_or_else(|| format!("{}Value", action.kind()));

    let base = camel_case_ident(&token);
    let base = if base.is_empty() {
        format!("{}Value", action.kind())
    } else {
        base
    };

    if !schema.properties.contains_key(&base) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}{suffix}");
        if !schema.properties.contains_key(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Applicability patterns ignore query strings and fragments; two captures of
/// the same page with different tracking parameters are one pattern.
fn url_pattern_of(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Pull `value` out of an `[attr="value"]` locator component.
fn extract_attr(locator: &str, attr: &str) -> Option<String> {
    let needle = format!("[{attr}=\"");
    let start = locator.find(&needle)? + needle.len();
    let rest = &locator[start..];
    let end = rest.find('"')?;
    let value = &rest[..end];
    (!value.is_empty()).then(|| value.to_string())
}

/// Convert session-tools into canonical dom-action proposals.
///
/// Hover steps are dropped (the canonical DOM-step vocabulary has no hover);
/// the first recorded URL pattern becomes the proposal's pattern.
pub fn to_proposals(tools: &[SessionTool]) -> Vec<ToolProposal> {
    tools
        .iter()
        .map(|tool| {
            let steps = tool
                .steps
                .iter()
                .filter_map(|step| {
                    let kind = match step.kind {
                        SessionStepKind::Click => DomStepKind::Click,
                        SessionStepKind::Fill => DomStepKind::Fill,
                        SessionStepKind::Select => DomStepKind::Select,
                        SessionStepKind::Scroll => DomStepKind::Scroll,
                        SessionStepKind::Hover => return None,
                    };
                    let mut dom_step = DomStep::new(kind, step.locator.clone());
                    dom_step.input_property = step.property.clone();
                    Some(dom_step)
                })
                .collect();

            ToolProposal {
                name: tool.name.clone(),
                description: SESSION_TOOL_DESCRIPTION.to_string(),
                input_schema: tool.input_schema.clone(),
                action: ActionDetails::DomAction(DomActionDetails { steps }),
                annotations: None,
                url_pattern: tool.url_patterns.first().cloned(),
            }
        })
        .collect()
}
