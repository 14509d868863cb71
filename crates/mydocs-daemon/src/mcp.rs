//! Agent-facing stdio server.
//!
//! Newline-delimited JSON-RPC 2.0 speaking the Model Context Protocol
//! subset agents need: `initialize`, `ping`, `tools/list` and `tools/call`
//! for the `search` and `list_documents` tools. Logs go to stderr only.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mydocs_search::{
    format_document_list, format_search_report, SearchParams, SearchService, DEFAULT_CANDIDATES,
    DEFAULT_LIMIT, MAX_CANDIDATES, MAX_LIMIT,
};

/// Protocol revision announced when the client does not name one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "mydocs";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    rerank: Option<bool>,
    #[serde(default)]
    candidates: Option<i64>,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        SearchParams {
            query: args.query,
            limit: args.limit,
            candidates: args.candidates,
            rerank: args.rerank,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Stdio tool server over one [`SearchService`].
pub struct McpServer {
    service: Arc<SearchService>,
    cancel: CancellationToken,
}

impl McpServer {
    pub fn new(service: Arc<SearchService>, cancel: CancellationToken) -> Self {
        Self { service, cancel }
    }

    /// Serve until `reader` reaches EOF or the token is cancelled.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(
            reranker = self.service.has_reranker(),
            "Serving tools over stdio"
        );
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                info!("Input closed");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle one message; `None` when no response is due.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let message: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable message");
                return Some(error_response(
                    Value::Null,
                    RpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = message.get("id").cloned();
        if message.get("method").is_none() {
            // Responses from the client need no answer.
            if message.get("result").is_some() || message.get("error").is_some() {
                return None;
            }
            return Some(error_response(
                id.unwrap_or(Value::Null),
                RpcError::new(INVALID_REQUEST, "Invalid request: missing method"),
            ));
        }

        let request: Request = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return Some(error_response(
                    id.unwrap_or(Value::Null),
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification");
            return None;
        };

        debug!(method = %request.method, "Request");
        let response = match self.dispatch(&request.method, request.params).await {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(e) => error_response(id, e),
        };
        Some(response)
    }

    async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tool_definitions() })),
            "tools/call" => self.call_tool(params).await,
            _ => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
            )),
        }
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn tool_definitions(&self) -> Value {
        let mut search_desc = "Search indexed markdown documents using semantic similarity. \
                               Returns relevant passages with file paths and similarity scores."
            .to_string();
        if self.service.has_reranker() {
            search_desc.push_str(" Uses cross-encoder reranking for improved relevance.");
        }

        json!([
            {
                "name": "search",
                "description": search_desc,
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The search query to find relevant documents",
                        },
                        "limit": {
                            "type": "integer",
                            "description": format!(
                                "Maximum number of results to return (default: {}, max: {})",
                                DEFAULT_LIMIT, MAX_LIMIT
                            ),
                        },
                        "rerank": {
                            "type": "boolean",
                            "description": "Enable cross-encoder reranking for better relevance (default: true when available)",
                        },
                        "candidates": {
                            "type": "integer",
                            "description": format!(
                                "Number of candidates to fetch before reranking (default: {}, max: {})",
                                DEFAULT_CANDIDATES, MAX_CANDIDATES
                            ),
                        },
                    },
                    "required": ["query"],
                },
            },
            {
                "name": "list_documents",
                "description": "List all indexed documents with their titles and file paths.",
                "inputSchema": { "type": "object", "properties": {} },
            },
        ])
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let call: ToolCall = serde_json::from_value(params)
            .map_err(|e| RpcError::new(INVALID_PARAMS, format!("Invalid tool call: {}", e)))?;
        let arguments = call.arguments.unwrap_or_else(|| json!({}));

        match call.name.as_str() {
            "search" => Ok(self.search_tool(arguments).await),
            "list_documents" => Ok(self.list_documents_tool().await),
            other => Err(RpcError::new(
                INVALID_PARAMS,
                format!("Unknown tool: {}", other),
            )),
        }
    }

    async fn search_tool(&self, arguments: Value) -> Value {
        let args: SearchArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => return tool_error(format!("Invalid arguments: {}", e)),
        };
        let params = SearchParams::from(args);

        let service = self.service.clone();
        let cancel = self.cancel.clone();
        let outcome =
            tokio::task::spawn_blocking(move || service.search(&params, &cancel)).await;

        match outcome {
            Ok(Ok(outcome)) => tool_text(format_search_report(&outcome)),
            Ok(Err(e)) => {
                warn!(error = %e, "Search tool failed");
                tool_error(e.to_string())
            }
            Err(e) => tool_error(format!("Search task failed: {}", e)),
        }
    }

    async fn list_documents_tool(&self) -> Value {
        let service = self.service.clone();
        match tokio::task::spawn_blocking(move || service.list_documents()).await {
            Ok(Ok(docs)) => tool_text(format_document_list(&docs)),
            Ok(Err(e)) => {
                warn!(error = %e, "List documents tool failed");
                tool_error(e.to_string())
            }
            Err(e) => tool_error(format!("List task failed: {}", e)),
        }
    }
}

fn tool_text(text: String) -> Value {
    json!({ "content": [{ "type": "text", "text": text }] })
}

fn tool_error(message: String) -> Value {
    json!({ "content": [{ "type": "text", "text": message }], "isError": true })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": error.code, "message": error.message },
    })
}
