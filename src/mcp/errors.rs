//! MCP Error Handling
//!
//! Every failure the registry or dispatcher can produce, and how each one is
//! reported back to a client as a JSON-RPC error.

use crate::mcp::capability::CapabilityKind;
use crate::mcp::protocol::*;
use itertools::Itertools;
use thiserror::Error;
use tracing::{error, warn};

/// Errors produced while registering or dispatching capabilities
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum McpError {
    #[error("A {kind} named '{id}' is already registered")]
    DuplicateIdentifier { kind: CapabilityKind, id: String },

    #[error("Invalid URI template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: CapabilityKind, id: String },

    #[error("Invalid arguments for tool '{tool}': {}", .problems.iter().join("; "))]
    InvalidArguments { tool: String, problems: Vec<String> },

    #[error("Prompt '{prompt}' is missing required argument '{argument}'")]
    MissingRequiredArgument { prompt: String, argument: String },

    #[error("{kind} '{id}' failed: {message}")]
    HandlerFailure {
        kind: CapabilityKind,
        id: String,
        message: String,
    },

    #[error("Protocol version not supported: {version}. Supported versions: {}", .supported.join(", "))]
    UnsupportedProtocolVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl McpError {
    /// JSON-RPC error code reported for this error
    #[inline]
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound {
                kind: CapabilityKind::Resource,
                ..
            } => mcp_error_codes::RESOURCE_NOT_FOUND,
            Self::NotFound { .. }
            | Self::InvalidArguments { .. }
            | Self::MissingRequiredArgument { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidTemplate { .. } => error_codes::INVALID_PARAMS,
            Self::UnsupportedProtocolVersion { .. } => mcp_error_codes::INVALID_PROTOCOL_VERSION,
            Self::ParseError { .. } => error_codes::PARSE_ERROR,
            Self::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            Self::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            Self::DuplicateIdentifier { .. }
            | Self::HandlerFailure { .. }
            | Self::InternalError { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        let data = match self {
            Self::InvalidArguments { problems, .. } => Some(serde_json::json!({ "problems": problems })),
            Self::NotFound { kind, id } => Some(serde_json::json!({ "kind": kind.to_string(), "id": id })),
            _ => None,
        };
        JsonRpcError::new(self.code(), self.to_string(), data)
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error_response = JsonRpcErrorResponse::new(self.to_jsonrpc_error(), id);
        JsonRpcMessage::ErrorResponse(error_response)
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::ParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidArguments { .. }
            | Self::MissingRequiredArgument { .. }
            | Self::MethodNotFound { .. } => {
                warn!("Client error: {}", self);
            }
            Self::NotFound { .. } => {
                warn!("Not found error: {}", self);
            }
            Self::HandlerFailure { .. } | Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
            _ => {
                error!("MCP error: {}", self);
            }
        }
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::InternalError {
            message: format!("Failed to serialize result: {}", error),
        }
    }
}
