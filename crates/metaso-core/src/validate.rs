//! Turns untyped tool arguments into typed, fully defaulted requests.
//!
//! Every field is checked and all violations are reported together, so a caller can fix
//! its arguments in one round trip.

use serde_json::{Map, Value};
use std::fmt;

use crate::safety;
use crate::tools::ToolKind;
use crate::{Error, Result};

pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_PAGE: u32 = 100;
pub const MAX_SIZE: u32 = 50;
pub const MAX_URL_CHARS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(Violation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|v| v.field).collect()
    }

    fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid arguments: ")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", v.field, v.message)?;
        }
        Ok(())
    }
}

/// Closed set of string values accepted for an enum-typed argument.
pub trait Choice: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }

    fn expected() -> String {
        Self::ALL
            .iter()
            .map(|c| format!("'{}'", c.as_str()))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Webpage,
    Document,
    Scholar,
    Image,
    Video,
    Podcast,
}

impl Choice for SearchScope {
    const ALL: &'static [Self] = &[
        Self::Webpage,
        Self::Document,
        Self::Scholar,
        Self::Image,
        Self::Video,
        Self::Podcast,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Webpage => "webpage",
            Self::Document => "document",
            Self::Scholar => "scholar",
            Self::Image => "image",
            Self::Video => "video",
            Self::Podcast => "podcast",
        }
    }
}

/// Chat has no `webpage`/`image` scope: webpage is the implicit upstream default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    Document,
    Scholar,
    Video,
    Podcast,
}

impl Choice for ChatScope {
    const ALL: &'static [Self] = &[Self::Document, Self::Scholar, Self::Video, Self::Podcast];

    fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Scholar => "scholar",
            Self::Video => "video",
            Self::Podcast => "podcast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatModel {
    Fast,
    FastThinking,
    DsR1,
}

impl Choice for ChatModel {
    const ALL: &'static [Self] = &[Self::Fast, Self::FastThinking, Self::DsR1];

    fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::FastThinking => "fast_thinking",
            Self::DsR1 => "ds-r1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFormat {
    ChatCompletions,
    Simple,
}

impl Choice for ChatFormat {
    const ALL: &'static [Self] = &[Self::ChatCompletions, Self::Simple];

    fn as_str(self) -> &'static str {
        match self {
            Self::ChatCompletions => "chat_completions",
            Self::Simple => "simple",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderFormat {
    Markdown,
    Json,
}

impl Choice for ReaderFormat {
    const ALL: &'static [Self] = &[Self::Markdown, Self::Json];

    fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub scope: SearchScope,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub include_summary: bool,
    pub include_row_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderRequest {
    pub url: String,
    pub format: ReaderFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub query: String,
    pub model: ChatModel,
    pub scope: Option<ChatScope>,
    pub format: ChatFormat,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRequest {
    Search(SearchRequest),
    Reader(ReaderRequest),
    Chat(ChatRequest),
}

impl ValidatedRequest {
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::Search(_) => ToolKind::Search,
            Self::Reader(_) => ToolKind::Reader,
            Self::Chat(_) => ToolKind::Chat,
        }
    }
}

/// Validate raw arguments for `kind`. `None` is treated as an empty argument object.
pub fn validate(kind: ToolKind, args: Option<&Map<String, Value>>) -> Result<ValidatedRequest> {
    let empty = Map::new();
    let args = args.unwrap_or(&empty);
    match kind {
        ToolKind::Search => SearchRequest::from_args(args).map(ValidatedRequest::Search),
        ToolKind::Reader => ReaderRequest::from_args(args).map(ValidatedRequest::Reader),
        ToolKind::Chat => ChatRequest::from_args(args).map(ValidatedRequest::Chat),
    }
}

impl SearchRequest {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        let mut f = Fields::new(args);
        let query = f.query("query");
        let scope = f.choice_or("scope", SearchScope::Webpage);
        let page = f.positive_int("page", MAX_PAGE, "Page number cannot exceed 100.");
        let size = f.positive_int("size", MAX_SIZE, "Size cannot exceed 50 results per request.");
        let include_summary = f.bool_or("include_summary", true);
        let include_row_content = f.bool_or("include_row_content", false);
        if f.is_present("page") && f.is_present("size") {
            f.violations
                .push("page", "page and size cannot be used together");
        }
        f.violations.into_result()?;
        Ok(Self {
            query: query.unwrap_or_default(),
            scope,
            page,
            size,
            include_summary,
            include_row_content,
        })
    }
}

impl ReaderRequest {
    /// A well-formed URL pointing at a private or loopback target is rejected as unsafe
    /// outright. Every other problem (syntax, length, domain, format) is reported together.
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        let mut f = Fields::new(args);
        let url = match f.required_str("url") {
            Some(raw) => match url::Url::parse(&raw) {
                Ok(u) => {
                    if !safety::is_safe_url(&u) {
                        return Err(Error::UnsafeUrl(raw));
                    }
                    if u.as_str().chars().count() > MAX_URL_CHARS {
                        f.violations.push(
                            "url",
                            "URL is too long. Maximum length is 2048 characters.",
                        );
                    } else if !u.host_str().is_some_and(|h| h.contains('.')) {
                        f.violations.push("url", "Invalid domain name.");
                    }
                    Some(raw)
                }
                Err(_) => {
                    f.violations.push("url", "Invalid URL format");
                    None
                }
            },
            None => None,
        };
        let format = f.choice_or("format", ReaderFormat::Markdown);
        match url {
            Some(url) if f.violations.is_empty() => Ok(Self { url, format }),
            _ => Err(Error::Validation(f.violations)),
        }
    }
}

impl ChatRequest {
    pub fn from_args(args: &Map<String, Value>) -> Result<Self> {
        let mut f = Fields::new(args);
        let query = f.query("query");
        let model = f.choice_or("model", ChatModel::Fast);
        let scope = f.optional_choice::<ChatScope>("scope");
        let format = f.choice_or("format", ChatFormat::ChatCompletions);
        let stream = f.bool_or("stream", false);
        f.violations.into_result()?;
        Ok(Self {
            query: query.unwrap_or_default(),
            model,
            scope,
            format,
            stream,
        })
    }
}

/// Field reader that records violations instead of stopping at the first one.
struct Fields<'a> {
    args: &'a Map<String, Value>,
    violations: Violations,
}

impl<'a> Fields<'a> {
    fn new(args: &'a Map<String, Value>) -> Self {
        Self {
            args,
            violations: Violations::default(),
        }
    }

    // `null` counts as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.args.get(key).filter(|v| !v.is_null())
    }

    fn is_present(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn required_str(&mut self, key: &'static str) -> Option<String> {
        match self.get(key) {
            None => {
                self.violations.push(key, "Required");
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                self.violations
                    .push(key, format!("Expected string, received {}", type_name(other)));
                None
            }
        }
    }

    fn query(&mut self, key: &'static str) -> Option<String> {
        let q = self.required_str(key)?;
        let n = q.chars().count();
        if n == 0 {
            self.violations.push(key, "Query is required");
            return None;
        }
        if n > MAX_QUERY_CHARS {
            self.violations
                .push(key, "Query is too long. Maximum length is 1000 characters.");
            return None;
        }
        Some(q)
    }

    fn optional_choice<T: Choice>(&mut self, key: &'static str) -> Option<T> {
        match self.get(key)? {
            Value::String(s) => match T::parse(s) {
                Some(c) => Some(c),
                None => {
                    self.violations.push(
                        key,
                        format!(
                            "Invalid enum value. Expected {}, received '{s}'",
                            T::expected()
                        ),
                    );
                    None
                }
            },
            other => {
                self.violations
                    .push(key, format!("Expected string, received {}", type_name(other)));
                None
            }
        }
    }

    fn choice_or<T: Choice>(&mut self, key: &'static str, default: T) -> T {
        self.optional_choice(key).unwrap_or(default)
    }

    fn bool_or(&mut self, key: &'static str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                self.violations
                    .push(key, format!("Expected boolean, received {}", type_name(other)));
                default
            }
        }
    }

    fn positive_int(&mut self, key: &'static str, max: u32, too_big: &str) -> Option<u32> {
        let v = self.get(key)?;
        let Some(n) = v.as_u64().or_else(|| {
            v.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u64)
        }) else {
            let msg = match v {
                Value::Number(_) => "Expected a positive integer".to_string(),
                other => format!("Expected number, received {}", type_name(other)),
            };
            self.violations.push(key, msg);
            return None;
        };
        if n == 0 {
            self.violations.push(key, "Expected a positive integer");
            return None;
        }
        if n > u64::from(max) {
            self.violations.push(key, too_big);
            return None;
        }
        u32::try_from(n).ok()
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
