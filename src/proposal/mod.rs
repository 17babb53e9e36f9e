//! Canonical tool-proposal model: the stable contract between synthesis
//! (agent replies, recorded sessions) and code generation.
//!
//! Exactly one of the two action-detail shapes is present per proposal,
//! enforced by the adjacently-tagged [`ActionDetails`] enum. Argument and
//! step ordering is significant and preserved.

pub mod parse;
pub mod prompt;

pub use parse::{parse_proposals, ProposalParseError};
pub use prompt::{build_prompt, PageAnalysis};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One agent-invocable capability, independent of how it will be executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolProposal {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub input_schema: InputSchema,
    #[serde(flatten)]
    pub action: ActionDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
    /// URL-applicability pattern, when the tool only makes sense on some pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
}

/// The two execution strategies: invoke a page-global function directly, or
/// simulate a sequence of UI interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "actionType", content = "actionDetails")]
pub enum ActionDetails {
    #[serde(rename = "js-call")]
    JsCall(JsCallDetails),
    #[serde(rename = "dom-action")]
    DomAction(DomActionDetails),
}

impl ActionDetails {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::JsCall(_) => "js-call",
            Self::DomAction(_) => "dom-action",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCallDetails {
    /// Dotted path to the function in the page's global namespace.
    pub function_path: String,
    /// Positional arguments, each naming the schema property that feeds it.
    #[serde(default)]
    pub args: Vec<JsCallArg>,
    /// Declared return shape: "object", "string", "number", "void", ...
    #[serde(default = "default_return_type")]
    pub return_type: String,
}

fn default_return_type() -> String {
    "object".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsCallArg {
    /// Declared argument name (documentation only; invocation is positional).
    pub name: String,
    /// Schema property whose value feeds this argument.
    pub property: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomActionDetails {
    pub steps: Vec<DomStep>,
}

/// One simulated UI interaction within a dom-action tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomStep {
    pub action: DomStepKind,
    pub locator: String,
    /// Schema property whose value feeds this step (fill/select).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_property: Option<String>,
    /// Literal value when the step is not parameterized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal_value: Option<String>,
    /// Attribute to extract for `read` steps (textContent, value, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Post-step settle delay applied before the next step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl DomStep {
    pub fn new(action: DomStepKind, locator: impl Into<String>) -> Self {
        Self {
            action,
            locator: locator.into(),
            input_property: None,
            literal_value: None,
            attribute: None,
            delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomStepKind {
    Click,
    Fill,
    Select,
    Check,
    Submit,
    Scroll,
    Read,
}

/// JSON-Schema-like input description.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InputSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl PropertySchema {
    pub fn string() -> Self {
        Self {
            kind: PropertyKind::String,
            description: None,
            enum_values: Vec::new(),
            minimum: None,
            maximum: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    String,
    Number,
    Integer,
    Boolean,
}

/// Behavioral annotations carried through to the generated tool.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub destructive: bool,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub open_world: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn js_call_proposal_roundtrips() {
        let raw = json!({
            "name": "getMenu",
            "description": "Read the menu",
            "inputSchema": {"properties": {}, "required": []},
            "actionType": "js-call",
            "actionDetails": {
                "functionPath": "theMenuGetter",
                "args": [],
                "returnType": "object"
            },
            "annotations": {"readOnly": true}
        });
        let proposal: ToolProposal = serde_json::from_value(raw).unwrap();
        assert_eq!(proposal.name, "getMenu");
        assert_eq!(proposal.action.type_name(), "js-call");
        assert!(proposal.annotations.as_ref().unwrap().read_only);

        let back = serde_json::to_value(&proposal).unwrap();
        assert_eq!(back["actionType"], "js-call");
        assert_eq!(back["actionDetails"]["functionPath"], "theMenuGetter");
    }

    #[test]
    fn dom_action_proposal_preserves_step_order() {
        let raw = json!({
            "name": "addToCart",
            "description": "Add a pizza",
            "inputSchema": {
                "properties": {"pizzaId": {"type": "string"}},
                "required": ["pizzaId"]
            },
            "actionType": "dom-action",
            "actionDetails": {
                "steps": [
                    {"action": "fill", "locator": "#pizza-id", "inputProperty": "pizzaId"},
                    {"action": "click", "locator": "#add"}
                ]
            }
        });
        let proposal: ToolProposal = serde_json::from_value(raw).unwrap();
        let ActionDetails::DomAction(details) = &proposal.action else {
            panic!("expected dom-action");
        };
        assert_eq!(details.steps.len(), 2);
        assert_eq!(details.steps[0].action, DomStepKind::Fill);
        assert_eq!(details.steps[0].input_property.as_deref(), Some("pizzaId"));
        assert_eq!(details.steps[1].action, DomStepKind::Click);
    }

    #[test]
    fn mismatched_action_details_shape_is_rejected() {
        let raw = json!({
            "name": "bad",
            "description": "wrong details for type",
            "actionType": "js-call",
            "actionDetails": {"steps": []}
        });
        assert!(serde_json::from_value::<ToolProposal>(raw).is_err());
    }

    #[test]
    fn return_type_defaults_to_object() {
        let raw = json!({
            "name": "t",
            "description": "d",
            "actionType": "js-call",
            "actionDetails": {"functionPath": "f"}
        });
        let proposal: ToolProposal = serde_json::from_value(raw).unwrap();
        let ActionDetails::JsCall(details) = &proposal.action else {
            panic!("expected js-call");
        };
        assert_eq!(details.return_type, "object");
        assert!(details.args.is_empty());
    }
}
