//! MCP Message Validation
//!
//! Structural checks applied to every incoming message before it is routed:
//! the JSON-RPC envelope first, then the parameters of methods whose shape
//! the server depends on.

use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use serde_json::Value;
use tracing::debug;

/// Validator for incoming MCP messages
#[derive(Debug, Clone, Default)]
pub struct McpValidator;

/// A field a method's parameters must carry, and the JSON type it must have
struct RequiredField {
    name: &'static str,
    expected: &'static str,
    check: fn(&Value) -> bool,
}

const fn field(name: &'static str, expected: &'static str, check: fn(&Value) -> bool) -> RequiredField {
    RequiredField {
        name,
        expected,
        check,
    }
}

const INITIALIZE_FIELDS: &[RequiredField] = &[
    field("protocolVersion", "string", Value::is_string),
    field("clientInfo", "object", Value::is_object),
];
const CALL_TOOL_FIELDS: &[RequiredField] = &[field("name", "string", Value::is_string)];
const READ_RESOURCE_FIELDS: &[RequiredField] = &[field("uri", "string", Value::is_string)];
const GET_PROMPT_FIELDS: &[RequiredField] = &[field("name", "string", Value::is_string)];

impl McpValidator {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Parse a raw line or HTTP body into a validated message
    #[inline]
    pub fn parse_message(&self, raw: &str) -> McpResult<JsonRpcMessage> {
        let value: Value = serde_json::from_str(raw).map_err(|e| McpError::ParseError {
            message: e.to_string(),
        })?;
        self.validate_raw_message(&value)
    }

    /// Validate a raw JSON value as a JSON-RPC message
    #[inline]
    pub fn validate_raw_message(&self, value: &Value) -> McpResult<JsonRpcMessage> {
        let object = value.as_object().ok_or_else(|| McpError::InvalidRequest {
            message: "message must be a JSON object".to_string(),
        })?;

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            Some(other) => {
                return Err(McpError::InvalidRequest {
                    message: format!("unsupported jsonrpc version '{}'", other),
                });
            }
            None => {
                return Err(McpError::InvalidRequest {
                    message: "missing 'jsonrpc' field".to_string(),
                });
            }
        }

        if let Some(id) = object.get("id") {
            if !(id.is_string() || id.is_i64() || id.is_null()) {
                return Err(McpError::InvalidRequest {
                    message: "'id' must be a string or an integer".to_string(),
                });
            }
        }

        if let Some(method) = object.get("method") {
            if !method.is_string() {
                return Err(McpError::InvalidRequest {
                    message: "'method' must be a string".to_string(),
                });
            }
        }

        let message: JsonRpcMessage =
            serde_json::from_value(value.clone()).map_err(|_| McpError::InvalidRequest {
                message: "value does not match any known JSON-RPC message type".to_string(),
            })?;

        // Untagged parsing accepts a request with a null id as a notification
        if let JsonRpcMessage::Notification(_) = &message {
            if object.contains_key("id") {
                return Err(McpError::InvalidRequest {
                    message: "'id' must be a string or an integer".to_string(),
                });
            }
        }

        Ok(message)
    }

    /// Validate the parameters of a request whose shape the server relies on
    #[inline]
    pub fn validate_params(&self, method: &str, params: Option<&Value>) -> McpResult<()> {
        let fields = match method {
            "initialize" => INITIALIZE_FIELDS,
            "tools/call" => CALL_TOOL_FIELDS,
            "resources/read" => READ_RESOURCE_FIELDS,
            "prompts/get" => GET_PROMPT_FIELDS,
            _ => {
                debug!("No parameter validation for method: {}", method);
                return Ok(());
            }
        };

        let params = params
            .and_then(Value::as_object)
            .ok_or_else(|| McpError::InvalidParameters {
                message: format!("{} requires an object of parameters", method),
            })?;

        let problems: Vec<String> = fields
            .iter()
            .filter_map(|field| match params.get(field.name) {
                None => Some(format!("missing '{}'", field.name)),
                Some(value) if !(field.check)(value) => {
                    Some(format!("'{}' must be a {}", field.name, field.expected))
                }
                Some(_) => None,
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(McpError::InvalidParameters {
                message: format!("{}: {}", method, problems.join(", ")),
            })
        }
    }

    /// Check if a protocol version is supported
    #[inline]
    pub fn is_protocol_version_supported(&self, version: &str) -> bool {
        version == MCP_VERSION || COMPATIBLE_MCP_VERSIONS.contains(&version)
    }

    /// Get supported protocol versions, newest first
    #[inline]
    pub fn supported_protocol_versions(&self) -> Vec<&'static str> {
        std::iter::once(MCP_VERSION)
            .chain(COMPATIBLE_MCP_VERSIONS.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protocol_version_validation() {
        let validator = McpValidator::new();

        assert!(validator.is_protocol_version_supported(MCP_VERSION));
        assert!(validator.is_protocol_version_supported("2024-11-05"));
        assert!(!validator.is_protocol_version_supported("invalid-version"));
        assert_eq!(validator.supported_protocol_versions()[0], MCP_VERSION);
    }

    #[test]
    fn request_validation() {
        let validator = McpValidator::new();

        let message = validator
            .validate_raw_message(&json!({
                "jsonrpc": "2.0",
                "id": "test-id",
                "method": "test_method",
                "params": {"key": "value"}
            }))
            .expect("request is valid");
        assert!(matches!(message, JsonRpcMessage::Request(_)));

        let message = validator
            .validate_raw_message(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .expect("notification is valid");
        assert!(matches!(message, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn wrong_jsonrpc_version_is_rejected() {
        let validator = McpValidator::new();

        let error = validator
            .validate_raw_message(&json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}))
            .expect_err("version 1.0 is rejected");
        assert_eq!(error.code(), error_codes::INVALID_REQUEST);

        assert!(
            validator
                .validate_raw_message(&json!({"id": 1, "method": "ping"}))
                .is_err()
        );
        assert!(validator.validate_raw_message(&json!([1, 2])).is_err());
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let validator = McpValidator::new();

        assert!(
            validator
                .validate_raw_message(&json!({"jsonrpc": "2.0", "id": 1.5, "method": "ping"}))
                .is_err()
        );
        assert!(
            validator
                .validate_raw_message(&json!({"jsonrpc": "2.0", "id": null, "method": "ping"}))
                .is_err()
        );
    }

    #[test]
    fn unparseable_text_is_a_parse_error() {
        let validator = McpValidator::new();
        let error = validator
            .parse_message("{not json")
            .expect_err("invalid json");
        assert_eq!(error.code(), error_codes::PARSE_ERROR);
    }

    #[test]
    fn initialize_params_validation() {
        let validator = McpValidator::new();

        let params = json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        });
        assert!(validator.validate_params("initialize", Some(&params)).is_ok());

        let error = validator
            .validate_params("initialize", Some(&json!({"protocolVersion": 2025})))
            .expect_err("missing fields");
        let message = error.to_string();
        assert!(message.contains("'protocolVersion' must be a string"));
        assert!(message.contains("missing 'clientInfo'"));
    }

    #[test]
    fn method_params_validation() {
        let validator = McpValidator::new();

        assert!(validator.validate_params("tools/call", None).is_err());
        assert!(
            validator
                .validate_params("resources/read", Some(&json!({"uri": "info://server"})))
                .is_ok()
        );
        assert!(
            validator
                .validate_params("prompts/get", Some(&json!({"name": 1})))
                .is_err()
        );
        assert!(validator.validate_params("tools/list", None).is_ok());
    }
}
