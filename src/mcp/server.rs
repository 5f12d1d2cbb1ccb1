//! MCP server implementation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::*;
use crate::mcp::transport::{Message, Transport};
use crate::VERSION;

/// MCP server.
///
/// Every request runs on its own task, so a slow lookup never blocks `ping`
/// or a `notifications/cancelled` aimed at it.
#[derive(Clone)]
pub struct McpServer {
    handler: Arc<McpHandler>,
    name: String,
    version: String,
    /// Cancellation handles of in-flight requests.
    active_requests: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(handler: McpHandler, name: impl Into<String>) -> Self {
        Self {
            handler: Arc::new(handler),
            name: name.into(),
            version: VERSION.to_string(),
            active_requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of requests still being handled.
    pub async fn active_count(&self) -> usize {
        self.active_requests.lock().await.len()
    }

    /// Run the server with the given transport until its input closes.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.name, self.version);

        let (mut incoming, outgoing) = transport.start().await?;
        let mut tasks = JoinSet::new();

        while let Some(msg) = incoming.recv().await {
            match msg {
                Message::Request(req) => {
                    let cancel = CancellationToken::new();
                    self.active_requests
                        .lock()
                        .await
                        .insert(req.id.clone(), cancel.clone());

                    let server = self.clone();
                    let outgoing = outgoing.clone();
                    tasks.spawn(async move {
                        let id = req.id.clone();
                        let response = server.handle_request(req, cancel.clone()).await;
                        server.active_requests.lock().await.remove(&id);

                        if cancel.is_cancelled() {
                            debug!("Dropping response to cancelled request {:?}", id);
                            return;
                        }
                        if outgoing.send(Message::Response(response)).await.is_err() {
                            error!("Failed to send response");
                        }
                    });
                }
                Message::Notification(notif) => {
                    self.handle_notification(notif).await;
                }
                Message::Response(_) => {
                    warn!("Received unexpected response");
                }
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    error!("Request task failed: {}", e);
                }
            }
        }

        // input closed: finish what is in flight
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Request task failed: {}", e);
            }
        }
        drop(outgoing);

        transport.stop().await?;
        info!("MCP server stopped");
        Ok(())
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&self, req: JsonRpcRequest, cancel: CancellationToken) -> JsonRpcResponse {
        debug!("Handling request: {} (id: {:?})", req.method, req.id);

        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(req.params, cancel).await,
            _ => {
                return JsonRpcResponse::failure(
                    req.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", req.method),
                )
            }
        };

        match result {
            Ok(value) => JsonRpcResponse::success(req.id, value),
            Err(e) => {
                let code = match e {
                    Error::InvalidToolArguments(_) | Error::ToolNotFound(_) => {
                        error_codes::INVALID_PARAMS
                    }
                    Error::Cancelled => error_codes::REQUEST_CANCELLED,
                    _ => error_codes::INTERNAL_ERROR,
                };
                JsonRpcResponse::failure(req.id, code, e.to_string())
            }
        }
    }

    /// Handle a notification.
    async fn handle_notification(&self, notif: JsonRpcNotification) {
        debug!("Handling notification: {}", notif.method);

        match notif.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                let Some(params) = notif.params else {
                    return;
                };
                match serde_json::from_value::<CancelledParams>(params) {
                    Ok(cancelled) => {
                        let token = self.active_requests.lock().await.remove(&cancelled.request_id);
                        match token {
                            Some(token) => {
                                info!(
                                    "Cancelling request {:?} ({})",
                                    cancelled.request_id,
                                    cancelled.reason.as_deref().unwrap_or("no reason")
                                );
                                token.cancel();
                            }
                            None => debug!("Cancel for unknown request {:?}", cancelled.request_id),
                        }
                    }
                    Err(e) => warn!("Invalid cancel notification: {}", e),
                }
            }
            _ => {
                debug!("Unknown notification: {}", notif.method);
            }
        }
    }

    /// Handle initialize request.
    fn handle_initialize(&self) -> Result<Value> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request.
    fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.handler.list_tools();
        let result = ListToolsResult { tools };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request.
    async fn handle_call_tool(&self, params: Option<Value>, cancel: CancellationToken) -> Result<Value> {
        let params: CallToolParams = params
            .ok_or_else(|| Error::InvalidToolArguments("Missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::InvalidToolArguments(e.to_string()))
            })?;

        let handler = self
            .handler
            .get_tool(&params.name)
            .ok_or_else(|| Error::ToolNotFound(params.name.clone()))?;

        let result = handler.execute(params.arguments, cancel).await?;
        Ok(serde_json::to_value(result)?)
    }
}
