use serde_json::{json, Value};

use crate::validate::{
    ChatFormat, ChatRequest, Choice, ReaderFormat, ReaderRequest, SearchRequest, ValidatedRequest,
};

pub const SEARCH_PATH: &str = "/api/v1/search";
pub const READER_PATH: &str = "/api/v1/reader";
pub const CHAT_PATH: &str = "/api/v1/chat/completions";

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_TEXT: &str = "text/plain";

/// One upstream request: endpoint path, JSON body and the `Accept` header to send.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamPayload {
    pub path: &'static str,
    pub body: Value,
    pub accept: &'static str,
}

pub fn build(req: &ValidatedRequest) -> UpstreamPayload {
    match req {
        ValidatedRequest::Search(r) => search(r),
        ValidatedRequest::Reader(r) => reader(r),
        ValidatedRequest::Chat(r) => chat(r),
    }
}

pub fn search(req: &SearchRequest) -> UpstreamPayload {
    let mut body = json!({
        "q": req.query,
        "scope": req.scope.as_str(),
        "includeSummary": req.include_summary,
        "includeRowContent": req.include_row_content,
    });
    // Validation guarantees at most one of the two.
    if let Some(page) = req.page {
        body["page"] = json!(page);
    } else if let Some(size) = req.size {
        body["size"] = json!(size);
    }
    UpstreamPayload {
        path: SEARCH_PATH,
        body,
        accept: ACCEPT_JSON,
    }
}

pub fn reader(req: &ReaderRequest) -> UpstreamPayload {
    UpstreamPayload {
        path: READER_PATH,
        body: json!({ "url": req.url }),
        accept: match req.format {
            ReaderFormat::Markdown => ACCEPT_TEXT,
            ReaderFormat::Json => ACCEPT_JSON,
        },
    }
}

pub fn chat(req: &ChatRequest) -> UpstreamPayload {
    let mut body = match req.format {
        ChatFormat::Simple => json!({
            "q": req.query,
            "model": req.model.as_str(),
            "format": "simple",
        }),
        ChatFormat::ChatCompletions => json!({
            "model": req.model.as_str(),
            "stream": req.stream,
            "messages": [{ "role": "user", "content": req.query }],
        }),
    };
    if let Some(scope) = req.scope {
        body["scope"] = json!(scope.as_str());
    }
    UpstreamPayload {
        path: CHAT_PATH,
        body,
        accept: ACCEPT_JSON,
    }
}
