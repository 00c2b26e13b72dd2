//! Static tool surface exposed to MCP clients for discovery.

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Search,
    Reader,
    Chat,
}

impl ToolKind {
    /// Discovery order.
    pub const ALL: [ToolKind; 3] = [ToolKind::Search, ToolKind::Reader, ToolKind::Chat];

    pub fn name(self) -> &'static str {
        match self {
            Self::Search => "metaso_search",
            Self::Reader => "metaso_reader",
            Self::Chat => "metaso_chat",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn definition(self) -> ToolDefinition {
        match self {
            Self::Search => search_definition(),
            Self::Reader => reader_definition(),
            Self::Chat => chat_definition(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn input_schema_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.input_schema.as_object().cloned().unwrap_or_default()
    }
}

/// All tool definitions, in discovery order (search, reader, chat).
pub fn definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(ToolKind::definition).collect()
}

fn search_definition() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Search.name(),
        description: "Search the internet using Metaso AI search engine. Supports multiple search scopes including webpages, documents, academic papers, images, videos, and podcasts.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query content",
                    "minLength": 1,
                    "maxLength": 1000
                },
                "scope": {
                    "type": "string",
                    "enum": ["webpage", "document", "scholar", "image", "video", "podcast"],
                    "default": "webpage",
                    "description": "Search scope/domain"
                },
                "page": {
                    "type": "number",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Page number for pagination (mutually exclusive with size)"
                },
                "size": {
                    "type": "number",
                    "minimum": 1,
                    "maximum": 50,
                    "description": "Number of results to return (mutually exclusive with page)"
                },
                "include_summary": {
                    "type": "boolean",
                    "default": true,
                    "description": "Whether to include AI-generated summary"
                },
                "include_row_content": {
                    "type": "boolean",
                    "default": false,
                    "description": "Whether to include raw webpage content"
                }
            },
            "required": ["query"],
            "not": {
                "allOf": [
                    { "required": ["page"] },
                    { "required": ["size"] }
                ]
            }
        }),
    }
}

fn reader_definition() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Reader.name(),
        description: "Read and extract content from web pages using Metaso API. Returns the full text content of the specified webpage in markdown or JSON format.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "format": "uri",
                    "description": "URL of the webpage to read",
                    "pattern": "^https?://"
                },
                "format": {
                    "type": "string",
                    "enum": ["markdown", "json"],
                    "default": "markdown",
                    "description": "Format of the returned content"
                }
            },
            "required": ["url"]
        }),
    }
}

fn chat_definition() -> ToolDefinition {
    ToolDefinition {
        name: ToolKind::Chat.name(),
        description: "Chat with Metaso AI assistant. Get intelligent responses based on search-enhanced AI models. Supports multiple models and output formats.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Question or prompt for the AI assistant",
                    "minLength": 1,
                    "maxLength": 1000
                },
                "model": {
                    "type": "string",
                    "enum": ["fast", "fast_thinking", "ds-r1"],
                    "default": "fast",
                    "description": "AI model to use for the response"
                },
                "scope": {
                    "type": "string",
                    "enum": ["document", "scholar", "video", "podcast"],
                    "description": "Search scope for enhanced responses (webpage is default)"
                },
                "format": {
                    "type": "string",
                    "enum": ["chat_completions", "simple"],
                    "default": "chat_completions",
                    "description": "Response format"
                },
                "stream": {
                    "type": "boolean",
                    "default": false,
                    "description": "Enable streaming output (for compatible formats)"
                }
            },
            "required": ["query"]
        }),
    }
}
