//! Raw LLM text to JSON
//!
//! Models wrap their JSON in code fences or surround it with prose. The first
//! JSON object found in the text wins.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Remove a surrounding ``` fence (with optional language tag)
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().is_some_and(|first| first.trim_start().starts_with("```")) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|last| last.trim_start().starts_with("```")) {
        lines.pop();
    }
    lines.join("\n").trim().to_string()
}

/// First JSON object embedded in the text
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_code_fences(raw);
    for (idx, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&text[idx..]);
        if let Ok(Value::Object(object)) = Value::deserialize(&mut deserializer) {
            return Some(object);
        }
    }
    None
}

/// Parse a conversation-phase reply
///
/// A reply with no JSON object at all is taken as the response text itself.
/// Blank output yields `None`.
pub fn parse_conversation(raw: &str) -> Option<Value> {
    debug!(len = raw.len(), "parse_conversation: called");
    if let Some(object) = extract_json_object(raw) {
        return Some(Value::Object(object));
    }
    let text = strip_code_fences(raw);
    if text.is_empty() {
        debug!("parse_conversation: blank output");
        return None;
    }
    debug!("parse_conversation: no JSON object, using plain text");
    let mut object = Map::new();
    object.insert("response".to_string(), Value::String(text));
    Some(Value::Object(object))
}

/// Parse a generation-phase reply
///
/// Fields may be at the top level or nested under `status`.
pub fn parse_generation(raw: &str) -> Option<Value> {
    debug!(len = raw.len(), "parse_generation: called");
    let mut object = extract_json_object(raw)?;
    if let Some(Value::Object(status)) = object.remove("status") {
        debug!("parse_generation: using nested status object");
        return Some(Value::Object(status));
    }
    Some(Value::Object(object))
}
