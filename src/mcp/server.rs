//! MCP Server Implementation
//!
//! This module provides the core MCP server: connection state, message
//! routing onto the [`Dispatcher`], and the newline-delimited stdio
//! transport.

use crate::mcp::capability::{CapabilityKind, PromptDefinition, ResourceDefinition, ToolDefinition};
use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::notifier::Subscription;
use crate::mcp::protocol::*;
use crate::mcp::store::CapabilityStore;
use crate::mcp::validation::McpValidator;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// MCP Server state and configuration
#[derive(Debug)]
pub struct McpServer {
    /// Server implementation information
    pub server_info: Implementation,
    /// Server capabilities
    pub capabilities: ServerCapabilities,
    /// Usage hint returned from `initialize`
    pub instructions: Option<String>,
    store: Arc<CapabilityStore>,
    dispatcher: Dispatcher,
    validator: McpValidator,
    active_sessions: AtomicUsize,
}

/// Handshake progress of one client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Message handler for one client session. Clones share the session's
/// connection state.
#[derive(Debug, Clone)]
pub struct MessageHandler {
    server: Arc<McpServer>,
    state: Arc<RwLock<ConnectionState>>,
}

impl McpServer {
    /// Create a new MCP server with an empty capability store
    #[inline]
    pub fn new(name: String, version: String) -> Self {
        let store = Arc::new(CapabilityStore::default());

        let capabilities = ServerCapabilities {
            prompts: Some(PromptsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(true),
            }),
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
        };

        Self {
            server_info: Implementation { name, version },
            capabilities,
            instructions: None,
            dispatcher: Dispatcher::new(Arc::clone(&store)),
            store,
            validator: McpValidator::new(),
            active_sessions: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = Some(instructions.to_string());
        self
    }

    #[inline]
    pub fn store(&self) -> &Arc<CapabilityStore> {
        &self.store
    }

    #[inline]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[inline]
    pub fn validator(&self) -> &McpValidator {
        &self.validator
    }

    /// Register a tool with the server
    #[inline]
    pub async fn register_tool(&self, tool: ToolDefinition) -> McpResult<()> {
        self.store.register_tool(tool).await
    }

    /// Register a resource with the server
    #[inline]
    pub async fn register_resource(&self, resource: ResourceDefinition) -> McpResult<()> {
        self.store.register_resource(resource).await
    }

    /// Register a prompt with the server
    #[inline]
    pub async fn register_prompt(&self, prompt: PromptDefinition) -> McpResult<()> {
        self.store.register_prompt(prompt).await
    }

    /// Number of stdio sessions currently being served
    #[inline]
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    /// Snapshot of the server for health checks
    #[inline]
    pub async fn health_status(&self) -> ServerHealthStatus {
        ServerHealthStatus {
            active_sessions: self.active_sessions(),
            tools_registered: self.store.len(CapabilityKind::Tool).await,
            resources_registered: self.store.len(CapabilityKind::Resource).await,
            prompts_registered: self.store.len(CapabilityKind::Prompt).await,
            subscribers: self.store.notifier().subscriber_count(),
        }
    }

    /// Start the server using stdio transport
    #[inline]
    pub async fn serve_stdio(self: Arc<Self>) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        self.serve_io(BufReader::new(io::stdin()), io::stdout())
            .await
    }

    /// Serve newline-delimited JSON-RPC over any reader/writer pair.
    ///
    /// Each request is handled on its own task; replies and list-changed
    /// notifications share a single writer. Returns once the reader is
    /// exhausted and every in-flight request has been answered.
    #[inline]
    pub async fn serve_io<R, W>(self: Arc<Self>, mut reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing, queued) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_messages(writer, queued));
        let forwarder = tokio::spawn(forward_list_changes(
            self.store.notifier().subscribe(),
            outgoing.clone(),
        ));

        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        let session = MessageHandler::new(Arc::clone(&self));
        let mut in_flight = JoinSet::new();
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer).await {
                Ok(0) => {
                    info!("EOF reached, closing connection");
                    break;
                }
                Ok(_) => {
                    let parsed = match std::str::from_utf8(&buffer) {
                        Ok(line) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            self.validator.parse_message(line)
                        }
                        Err(e) => Err(McpError::ParseError {
                            message: format!("message is not valid UTF-8: {}", e),
                        }),
                    };

                    match parsed {
                        Ok(message) => {
                            let handler = session.clone();
                            let outgoing = outgoing.clone();
                            in_flight.spawn(async move {
                                if let Some(reply) = handler.handle_message(message).await {
                                    if outgoing.send(reply).is_err() {
                                        debug!("Writer closed before reply could be sent");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            e.log();
                            if outgoing.send(e.to_error_response(None)).is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from session input: {}", e);
                    break;
                }
            }

            while let Some(finished) = in_flight.try_join_next() {
                report_task_failure(finished);
            }
        }

        while let Some(finished) = in_flight.join_next().await {
            report_task_failure(finished);
        }

        forwarder.abort();
        if let Err(e) = forwarder.await {
            if !e.is_cancelled() {
                warn!("Notification forwarder failed: {}", e);
            }
        }
        drop(outgoing);
        let written = writer_task.await;

        session.set_connection_state(ConnectionState::Closed).await;
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
        info!("MCP session closed");
        written??;
        Ok(())
    }
}

/// Write queued messages as newline-delimited JSON until every sender is gone
async fn write_messages<W>(
    mut writer: W,
    mut queued: mpsc::UnboundedReceiver<JsonRpcMessage>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = queued.recv().await {
        let json = serde_json::to_string(&message)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn forward_list_changes(
    mut subscription: Subscription,
    outgoing: mpsc::UnboundedSender<JsonRpcMessage>,
) {
    while let Some(event) = subscription.recv().await {
        debug!("Forwarding {} list change to session", event.kind);
        let notification = JsonRpcMessage::Notification(event.to_notification());
        if outgoing.send(notification).is_err() {
            break;
        }
    }
}

fn report_task_failure(finished: std::result::Result<(), JoinError>) {
    if let Err(e) = finished {
        error!("Request task failed: {}", e);
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| McpError::InvalidParameters {
        message: e.to_string(),
    })
}

fn to_result<T: Serialize>(result: &T) -> McpResult<Value> {
    Ok(serde_json::to_value(result)?)
}

impl MessageHandler {
    /// Create a new message handler
    #[inline]
    pub fn new(server: Arc<McpServer>) -> Self {
        Self {
            server,
            state: Arc::new(RwLock::new(ConnectionState::Uninitialized)),
        }
    }

    /// Where this session is in the initialize handshake
    #[inline]
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn set_connection_state(&self, state: ConnectionState) {
        let mut current = self.state.write().await;
        *current = state;
    }

    /// Process an incoming message. Requests always produce a reply;
    /// notifications and stray responses never do.
    #[inline]
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::ErrorResponse(_) => {
                warn!("Received unexpected response message from client");
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    #[inline]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        match self.route(&method, params).await {
            Ok(result) => JsonRpcMessage::Response(JsonRpcResponse::new(result, id)),
            Err(e) => {
                debug!("Request {} failed", method);
                e.log();
                e.to_error_response(Some(id))
            }
        }
    }

    async fn route(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        self.server
            .validator
            .validate_params(method, params.as_ref())?;
        let dispatcher = &self.server.dispatcher;

        match method {
            "initialize" => self.handle_initialize(params).await,
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&dispatcher.list_tools().await),
            "tools/call" => {
                let params: CallToolParams = parse_params(params)?;
                to_result(&dispatcher.call_tool(&params.name, params.arguments).await?)
            }
            "resources/list" => to_result(&dispatcher.list_resources().await),
            "resources/templates/list" => to_result(&dispatcher.list_resource_templates().await),
            "resources/read" => {
                let params: ReadResourceParams = parse_params(params)?;
                to_result(&dispatcher.read_resource(&params.uri).await?)
            }
            "prompts/list" => to_result(&dispatcher.list_prompts().await),
            "prompts/get" => {
                let params: GetPromptParams = parse_params(params)?;
                to_result(&dispatcher.get_prompt(&params.name, params.arguments).await?)
            }
            _ => Err(McpError::MethodNotFound {
                method: method.to_string(),
            }),
        }
    }

    /// Handle a JSON-RPC notification
    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                self.set_connection_state(ConnectionState::Ready).await;
                info!("Server ready to handle requests");
            }
            "notifications/cancelled" => {
                // Handlers always run to completion.
                debug!("Received cancellation notification");
            }
            _ => {
                warn!("Unknown notification method: {}", notification.method);
            }
        }
    }

    /// Handle initialize request
    #[inline]
    pub async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;

        // Check protocol version compatibility
        let validator = &self.server.validator;
        if !validator.is_protocol_version_supported(&params.protocol_version) {
            return Err(McpError::UnsupportedProtocolVersion {
                version: params.protocol_version,
                supported: validator
                    .supported_protocol_versions()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        self.set_connection_state(ConnectionState::Initializing).await;

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: self.server.capabilities.clone(),
            server_info: self.server.server_info.clone(),
            instructions: self.server.instructions.clone(),
        };

        info!(
            "Client initialized: {} {}",
            params.client_info.name, params.client_info.version
        );
        to_result(&result)
    }
}
