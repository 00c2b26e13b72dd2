//! Reshapes upstream bodies into what the caller sees.

use serde_json::{json, Map, Value};

use crate::safety;
use crate::tools::ToolKind;
use crate::validate::{
    ChatFormat, ChatRequest, Choice, ReaderRequest, SearchRequest, SearchScope, ValidatedRequest,
};

pub const READER_MAX_CONTENT_CHARS: usize = 1_000_000;
pub const TRUNCATION_MARKER: &str = "\n\n[Content truncated due to length...]";

pub fn format(req: &ValidatedRequest, body: Value) -> Value {
    match req {
        ValidatedRequest::Search(r) => search(body, r),
        ValidatedRequest::Reader(r) => reader(body, r),
        ValidatedRequest::Chat(r) => chat(body, r),
    }
}

/// Drop results pointing at unsafe targets (silently) and echo a non-default scope.
///
/// A result without a link (`url` absent, null or empty) is kept; a `url` that is not a
/// string is treated as unsafe.
pub fn search(body: Value, req: &SearchRequest) -> Value {
    let Value::Object(mut obj) = body else {
        return body;
    };
    if let Some(Value::Array(results)) = obj.get_mut("results") {
        results.retain(|r| match r.get("url") {
            None | Some(Value::Null) => true,
            Some(Value::String(u)) => u.is_empty() || safety::is_safe(u),
            Some(_) => false,
        });
    }
    if req.scope != SearchScope::Webpage {
        obj.insert("scope".to_string(), json!(req.scope.as_str()));
    }
    Value::Object(obj)
}

pub fn reader(body: Value, req: &ReaderRequest) -> Value {
    match body {
        // Markdown mode: the upstream answers with bare text.
        Value::String(content) => json!({ "content": content, "url": req.url }),
        Value::Object(mut obj) => {
            obj.insert("url".to_string(), json!(req.url));
            if let Some(Value::String(content)) = obj.get_mut("content") {
                truncate_content(content);
            }
            Value::Object(obj)
        }
        Value::Null => json!({ "url": req.url }),
        other => json!({ "content": other.to_string(), "url": req.url }),
    }
}

pub fn chat(body: Value, req: &ChatRequest) -> Value {
    if req.format == ChatFormat::Simple {
        return body;
    }
    let Value::Object(mut obj) = body else {
        return body;
    };
    let has_model = obj
        .get("model")
        .and_then(Value::as_str)
        .is_some_and(|m| !m.is_empty());
    if !has_model {
        obj.insert("model".to_string(), json!(req.model.as_str()));
    }
    Value::Object(obj)
}

/// Cut to `READER_MAX_CONTENT_CHARS` characters and append the marker. Returns whether
/// anything was cut.
pub fn truncate_content(content: &mut String) -> bool {
    match content.char_indices().nth(READER_MAX_CONTENT_CHARS) {
        Some((idx, _)) => {
            content.truncate(idx);
            content.push_str(TRUNCATION_MARKER);
            true
        }
        None => false,
    }
}

/// Error body in the shape each tool uses for success, so clients can keep a single parser.
pub fn error_response(kind: Option<ToolKind>, message: &str) -> Value {
    let mut obj = Map::new();
    obj.insert("error".to_string(), json!(message));
    match kind {
        Some(ToolKind::Search) => {
            obj.insert("results".to_string(), json!([]));
        }
        Some(ToolKind::Chat) => {
            obj.insert("choices".to_string(), json!([]));
        }
        Some(ToolKind::Reader) | None => {}
    }
    Value::Object(obj)
}

/// Error body for a failed call of `kind`, picked from the raw arguments so it also applies
/// when validation failed. Simple-format chat answers with a bare `{error}`.
pub fn call_error(kind: ToolKind, args: Option<&Map<String, Value>>, message: &str) -> Value {
    let simple_chat = kind == ToolKind::Chat
        && args
            .and_then(|a| a.get("format"))
            .and_then(Value::as_str)
            == Some(ChatFormat::Simple.as_str());
    if simple_chat {
        error_response(None, message)
    } else {
        error_response(Some(kind), message)
    }
}
