//! Decoding the reasoning agent's reply into typed tool proposals.
//!
//! Replies arrive as free text that usually carries a fenced JSON block.
//! The parser locates the fence when present (else treats the whole text as
//! the payload) and accepts either a bare proposal list or an object wrapping
//! one under a `tools`/`proposals` key. Malformed JSON and wrong shapes fail
//! loudly with distinct, matchable errors — agent replies are the one input
//! this system refuses to silently coerce.

use super::ToolProposal;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProposalParseError {
    /// The payload is not valid JSON.
    #[error("reply payload is not valid JSON: {0}")]
    Decode(String),
    /// The payload decoded, but is neither a proposal list nor a wrapper
    /// object carrying one.
    #[error("reply has unexpected shape: {0}")]
    Shape(String),
}

/// Keys accepted on a wrapper object carrying the proposal list.
const LIST_KEYS: &[&str] = &["tools", "proposals"];

/// Parse an agent reply into tool proposals.
pub fn parse_proposals(reply: &str) -> Result<Vec<ToolProposal>, ProposalParseError> {
    let payload = extract_fenced_block(reply).unwrap_or_else(|| reply.trim());

    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProposalParseError::Decode(e.to_string()))?;

    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let found = LIST_KEYS.iter().find_map(|key| map.remove(*key));
            match found {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(ProposalParseError::Shape(format!(
                        "wrapper key holds {} instead of a list",
                        type_name(&other)
                    )))
                }
                None => {
                    return Err(ProposalParseError::Shape(
                        "object has no 'tools' or 'proposals' list".to_string(),
                    ))
                }
            }
        }
        other => {
            return Err(ProposalParseError::Shape(format!(
                "expected a list or wrapper object, got {}",
                type_name(&other)
            )))
        }
    };

    list.into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).map_err(|e| {
                ProposalParseError::Shape(format!("proposal at index {index} is invalid: {e}"))
            })
        })
        .collect()
}

/// Locate the first fenced code block and return its inner text.
/// An optional language tag after the opening fence is skipped.
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];
    let end = content.find("```")?;
    Some(content[..end].trim())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
