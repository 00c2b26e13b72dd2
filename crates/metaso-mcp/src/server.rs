//! Tool dispatcher and the rmcp server handler around it.

use std::sync::Arc;
use std::time::Instant;

use metaso_core::{format, pipeline, tools, Config, Error, ToolKind, Upstream};
use metaso_local::MetasoHttpClient;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, JsonObject, ListToolsResult, PaginatedRequestParam,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer};

use crate::envelope::{tool_error, tool_result};

const INSTRUCTIONS: &str = "Metaso AI search. metaso_search searches the web (and other scopes), \
metaso_reader extracts the content of a public web page, metaso_chat answers questions with \
sources. Outputs are JSON.";

#[derive(Clone)]
pub struct MetasoMcp {
    upstream: Arc<dyn Upstream>,
}

impl MetasoMcp {
    pub fn new(config: Config) -> metaso_core::Result<Self> {
        Ok(Self::with_upstream(Arc::new(MetasoHttpClient::new(config)?)))
    }

    pub fn with_upstream(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// The three tool definitions, in their fixed order.
    pub fn tools() -> Vec<Tool> {
        tools::definitions()
            .into_iter()
            .map(|d| {
                Tool::new(
                    d.name,
                    d.description,
                    Arc::new(d.input_schema_object()),
                )
            })
            .collect()
    }

    /// Run one tool call to completion. Every failure comes back as an error envelope.
    pub async fn dispatch(&self, name: &str, args: Option<&JsonObject>) -> CallToolResult {
        let Some(kind) = ToolKind::from_name(name) else {
            let err = Error::UnknownTool(name.to_string());
            tracing::warn!(tool = name, code = err.code(), "unknown tool");
            return tool_error(format::error_response(None, &err.to_string()));
        };

        let t0 = Instant::now();
        tracing::info!(tool = name, "tool call");
        match pipeline::run(self.upstream.as_ref(), kind, args).await {
            Ok(payload) => {
                tracing::debug!(
                    tool = name,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "tool call ok"
                );
                tool_result(payload)
            }
            Err(e) => {
                tracing::warn!(
                    tool = name,
                    code = e.code(),
                    status = e.status(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    error = %e,
                    "tool call failed"
                );
                tool_error(format::call_error(kind, args, &e.to_string()))
            }
        }
    }
}

impl rmcp::ServerHandler for MetasoMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(Self::tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.dispatch(&request.name, request.arguments.as_ref()).await)
    }
}

/// Serve MCP over stdin/stdout until the client disconnects or `shutdown` resolves.
#[cfg(feature = "stdio")]
pub async fn serve_stdio(
    config: Config,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    let svc = MetasoMcp::new(config)?;
    let running = svc
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("MCP initialize failed: {e}"))?;
    let names: Vec<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
    tracing::info!(tools = ?names, "Metaso MCP server running on stdio");

    tokio::select! {
        res = running.waiting() => {
            let reason = res?;
            tracing::info!(?reason, "MCP client disconnected");
        }
        _ = shutdown => {
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
