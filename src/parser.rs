//! Extraction of term records from chat-completion envelopes.
//!
//! Model output is untrusted: the payload may be clean JSON, JSON wrapped in
//! prose, or garbage. Every entry point here degrades to an empty list rather
//! than returning an error, so callers can always fall back to the raw text.

use crate::terms::TermRecord;
use serde_json::Value;
use tracing::debug;

/// Returns `choices[0].message.content` when it is a non-empty string.
pub fn extract_content(envelope: &Value) -> Option<&str> {
    envelope
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .filter(|content| !content.is_empty())
}

/// Parses a chat-completion envelope into term records.
pub fn parse_response(envelope: &Value) -> Vec<TermRecord> {
    match extract_content(envelope) {
        Some(content) => parse_content(content),
        None => {
            debug!("model response carried no textual content");
            Vec::new()
        }
    }
}

/// Same as [`parse_response`] for an envelope that has not been decoded yet.
pub fn parse_response_str(raw: &str) -> Vec<TermRecord> {
    match serde_json::from_str::<Value>(raw) {
        Ok(envelope) => parse_response(&envelope),
        Err(err) => {
            debug!(error = %err, "model response envelope is not JSON");
            Vec::new()
        }
    }
}

/// Parses the textual payload the model produced.
pub fn parse_content(content: &str) -> Vec<TermRecord> {
    let Some(parsed) = decode_payload(content) else {
        debug!(len = content.len(), "no JSON object found in model content");
        return Vec::new();
    };
    let Some(items) = parsed.get("terms").and_then(Value::as_array) else {
        debug!("model content has no `terms` array");
        return Vec::new();
    };
    parse_terms(items)
}

/// Validates raw `terms` array elements, keeping the valid ones in order.
pub fn parse_terms(items: &[Value]) -> Vec<TermRecord> {
    items.iter().filter_map(record_from_value).collect()
}

fn decode_payload(content: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content) {
        return Some(value);
    }
    let candidate = outermost_braces(content)?;
    debug!("retrying model content with the outermost brace block");
    serde_json::from_str::<Value>(candidate).ok()
}

/// Slice from the first `{` to the last `}`, inclusive.
fn outermost_braces(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn record_from_value(item: &Value) -> Option<TermRecord> {
    let term = item.get("term")?.as_str()?;
    let definition = item.get("definition")?.as_str()?;
    let category = item.get("category").and_then(category_text);
    TermRecord::new(term, definition, category.as_deref())
}

fn category_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
