//! Wrapping tool payloads into MCP call results.

use rmcp::model::{CallToolResult, Content};
use serde_json::Value;

/// Successful call: structured content plus a pretty-printed text copy for clients that only
/// read `content[0].text`.
pub fn tool_result(payload: Value) -> CallToolResult {
    let text = pretty(&payload);
    let mut r = CallToolResult::structured(payload);
    r.content = vec![Content::text(text)];
    r
}

/// Same envelope with `isError: true`.
pub fn tool_error(payload: Value) -> CallToolResult {
    let text = pretty(&payload);
    let mut r = CallToolResult::structured_error(payload);
    r.content = vec![Content::text(text)];
    r
}

pub fn is_error(r: &CallToolResult) -> bool {
    r.is_error.unwrap_or(false)
}

/// The JSON payload of a result, from `structuredContent` or else from the first text block
/// that parses.
pub fn payload_from_result(r: &CallToolResult) -> Value {
    if let Some(v) = r.structured_content.clone() {
        return v;
    }
    for c in &r.content {
        if let Some(t) = c.as_text() {
            if let Ok(v) = serde_json::from_str::<Value>(&t.text) {
                return v;
            }
        }
    }
    serde_json::json!({})
}

fn pretty(v: &Value) -> String {
    serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_of(r: &CallToolResult) -> String {
        r.content
            .first()
            .and_then(|c| c.as_text())
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn success_carries_structured_and_pretty_text() {
        let r = tool_result(json!({"results": [], "total": 0}));
        assert!(!is_error(&r));
        assert_eq!(r.structured_content, Some(json!({"results": [], "total": 0})));
        let text = text_of(&r);
        assert!(text.contains("\n  \"results\": []"), "{text}");
        assert_eq!(payload_from_result(&r), json!({"results": [], "total": 0}));
    }

    #[test]
    fn error_sets_flag() {
        let r = tool_error(json!({"error": "boom"}));
        assert!(is_error(&r));
        assert_eq!(payload_from_result(&r)["error"], "boom");
    }

    #[test]
    fn payload_falls_back_to_text() {
        let mut r = tool_result(json!({"a": 1}));
        r.structured_content = None;
        assert_eq!(payload_from_result(&r), json!({"a": 1}));
    }
}
