use std::sync::Arc;

use executors::{ExecutionBridge, ExecutionResult};
use rmcp::{
    Error as RmcpError, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListToolsResult, PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
        Tool,
    },
    service::{RequestContext, RoleServer},
};

use crate::mcp::tools::{self, ToolCall};

pub const SERVER_NAME: &str = "applescript-mcp";

#[derive(Debug, Clone)]
pub struct AppleScriptServer {
    bridge: Arc<ExecutionBridge>,
}

impl AppleScriptServer {
    pub fn new(bridge: ExecutionBridge) -> Self {
        Self {
            bridge: Arc::new(bridge),
        }
    }

    pub fn tools(&self) -> Vec<Tool> {
        tools::catalog(self.bridge.config().default_timeout_secs)
    }

    /// Resolve a tool call by name and run it. Unknown tools and undecodable
    /// arguments come back as `InvalidRequest` results, not protocol errors.
    pub async fn dispatch(&self, name: &str, arguments: Option<JsonObject>) -> ExecutionResult {
        match ToolCall::parse(name, arguments) {
            Ok(call) => {
                tracing::debug!(tool = %call.tool(), "Dispatching tool call");
                match call {
                    ToolCall::ApplescriptExecute(request) => self.bridge.execute(request).await,
                }
            }
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "Rejected tool call");
                ExecutionResult::invalid_request(err)
            }
        }
    }
}

/// Wrap a result as a single text block, flagged as an error unless it succeeded.
pub fn to_call_tool_result(result: &ExecutionResult) -> CallToolResult {
    let content = vec![Content::text(result.text())];
    if result.is_ok() {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    }
}

impl ServerHandler for AppleScriptServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some("Runs AppleScript on this Mac through osascript. Call 'applescript_execute' with the complete script in 'script' and an optional 'timeout_seconds'. Script output is returned as text; failures and timeouts are returned as error results describing what went wrong.".to_string()),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, RmcpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tools(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, RmcpError> {
        let result = self.dispatch(&request.name, request.arguments).await;
        Ok(to_call_tool_result(&result))
    }
}
