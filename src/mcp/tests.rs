//! MCP Protocol Implementation Tests
//!
//! Unit tests for the workshop capabilities and the message handler,
//! including protocol compliance and error cases.

#[cfg(test)]
mod workshop_tool_tests {
    use crate::config::WorkshopConfig;
    use crate::mcp::protocol::Arguments;
    use crate::mcp::tools::*;
    use crate::mcp::{CapabilityKind, CapabilityStore, Dispatcher, McpError};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn arguments(value: serde_json::Value) -> Option<Arguments> {
        value.as_object().cloned()
    }

    fn fast_settings() -> WorkshopConfig {
        WorkshopConfig {
            long_task_steps: 2,
            long_task_step_delay_ms: 1,
        }
    }

    async fn dispatcher() -> Dispatcher {
        let store = Arc::new(CapabilityStore::default());
        register_workshop_tools(&store, &fast_settings())
            .await
            .expect("tools register");
        Dispatcher::new(store)
    }

    #[test]
    fn add_tool_definition() {
        let tool = AddTool::definition().descriptor();

        assert_eq!(tool.name, "add");
        let schema = tool.input_schema;
        assert_eq!(schema["properties"]["a"]["type"], "number");
        assert_eq!(schema["properties"]["b"]["type"], "number");
        assert_eq!(schema["required"], json!(["a", "b"]));

        let annotations = tool.annotations.expect("has annotations");
        assert_eq!(annotations.read_only_hint, Some(true));
        assert_eq!(annotations.idempotent_hint, Some(true));
    }

    #[tokio::test]
    async fn greet_requires_a_name() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .call_tool("greet", arguments(json!({"name": "Ada"})))
            .await
            .expect("greet succeeds");
        assert!(result.text_content().contains("Hello, Ada!"));

        // No silent "World" default
        let error = dispatcher
            .call_tool("greet", None)
            .await
            .expect_err("name is required");
        assert!(matches!(error, McpError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn add_sums_numbers() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .call_tool("add", arguments(json!({"a": 2, "b": 3.5})))
            .await
            .expect("add succeeds");
        assert_eq!(result.text_content(), "2 + 3.5 = 5.5");

        let error = dispatcher
            .call_tool("add", arguments(json!({"a": "2", "b": 3})))
            .await
            .expect_err("strings are not numbers");
        assert!(matches!(error, McpError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn long_task_runs_requested_steps() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .call_tool("long_task", None)
            .await
            .expect("long_task succeeds");
        assert_eq!(result.text_content(), "Long task completed after 2 steps");

        let result = dispatcher
            .call_tool("long_task", arguments(json!({"steps": 3})))
            .await
            .expect("long_task succeeds");
        assert_eq!(result.text_content(), "Long task completed after 3 steps");

        let result = dispatcher
            .call_tool("long_task", arguments(json!({"steps": 0})))
            .await
            .expect("out of range steps are a tool error");
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn long_task_does_not_block_greet() {
        let store = Arc::new(CapabilityStore::default());
        register_workshop_tools(
            &store,
            &WorkshopConfig {
                long_task_steps: 10,
                long_task_step_delay_ms: 500,
            },
        )
        .await
        .expect("tools register");
        let dispatcher = Dispatcher::new(store);

        let slow: Vec<_> = (0..3)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.call_tool("long_task", None).await })
            })
            .collect();

        let greeting = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.call_tool("greet", arguments(json!({"name": "Grace"}))),
        )
        .await
        .expect("greet is not blocked by long tasks")
        .expect("greet succeeds");
        assert!(greeting.text_content().contains("Grace"));

        for task in slow {
            task.abort();
        }
    }

    #[tokio::test]
    async fn load_bonus_tool_registers_once() {
        let dispatcher = dispatcher().await;
        let mut subscription = dispatcher.store().notifier().subscribe();

        assert!(matches!(
            dispatcher.call_tool(BONUS_TOOL_NAME, None).await,
            Err(McpError::NotFound { .. })
        ));

        let first = dispatcher
            .call_tool("load_bonus_tool", None)
            .await
            .expect("load succeeds");
        assert_eq!(first.is_error, Some(false));
        assert!(first.text_content().starts_with("Loaded"));

        let second = dispatcher
            .call_tool("load_bonus_tool", None)
            .await
            .expect("second load succeeds");
        assert_eq!(second.is_error, Some(false));
        assert!(second.text_content().contains("already loaded"));

        assert_eq!(
            subscription.try_recv().map(|change| change.kind),
            Some(CapabilityKind::Tool)
        );
        assert!(subscription.try_recv().is_none());

        let bonus = dispatcher
            .call_tool(BONUS_TOOL_NAME, None)
            .await
            .expect("bonus tool is callable");
        assert!(bonus.text_content().contains("bonus tool"));

        let names: Vec<_> = dispatcher
            .list_tools()
            .await
            .tools
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(
            names,
            vec!["greet", "add", "long_task", "load_bonus_tool", "bonus_tool"]
        );
    }
}

#[cfg(test)]
mod workshop_resource_tests {
    use crate::mcp::protocol::Implementation;
    use crate::mcp::resources::register_workshop_resources;
    use crate::mcp::{CapabilityKind, CapabilityStore, Dispatcher, McpError};
    use std::sync::Arc;

    async fn dispatcher() -> Dispatcher {
        let store = Arc::new(CapabilityStore::default());
        let info = Implementation {
            name: "test-server".to_string(),
            version: "1.2.3".to_string(),
        };
        register_workshop_resources(&store, &info)
            .await
            .expect("resources register");
        Dispatcher::new(store)
    }

    #[tokio::test]
    async fn server_info_is_static() {
        let dispatcher = dispatcher().await;

        let resources = dispatcher.list_resources().await.resources;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "info://server");
        assert_eq!(resources[0].mime_type.as_deref(), Some("text/plain"));

        let result = dispatcher
            .read_resource("info://server")
            .await
            .expect("info reads");
        let text = result.contents[0].text.as_deref().expect("text contents");
        assert!(text.starts_with("test-server v1.2.3"));
    }

    #[tokio::test]
    async fn templates_are_listed_separately() {
        let dispatcher = dispatcher().await;

        let templates: Vec<_> = dispatcher
            .list_resource_templates()
            .await
            .resource_templates
            .into_iter()
            .map(|template| template.uri_template)
            .collect();
        assert_eq!(templates, vec!["greeting://{name}", "item://{id}"]);
    }

    #[tokio::test]
    async fn item_resource_returns_json_for_the_id() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .read_resource("item://42")
            .await
            .expect("item reads");
        let contents = &result.contents[0];
        assert_eq!(contents.uri, "item://42");
        assert_eq!(contents.mime_type.as_deref(), Some("application/json"));

        let item: serde_json::Value =
            serde_json::from_str(contents.text.as_deref().expect("text contents"))
                .expect("contents are json");
        assert_eq!(item["id"], "42");
        assert_eq!(item["name"], "Item 42");
    }

    #[tokio::test]
    async fn greeting_needs_a_name() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .read_resource("greeting://Ada")
            .await
            .expect("greeting reads");
        assert!(
            result.contents[0]
                .text
                .as_deref()
                .is_some_and(|text| text.starts_with("Hello, Ada!"))
        );

        let error = dispatcher
            .read_resource("greeting://")
            .await
            .expect_err("empty name is not found");
        assert!(matches!(
            error,
            McpError::NotFound {
                kind: CapabilityKind::Resource,
                ..
            }
        ));
    }
}

#[cfg(test)]
mod workshop_prompt_tests {
    use crate::mcp::prompts::*;
    use crate::mcp::protocol::{ContentBlock, PromptArguments, Role};
    use crate::mcp::{CapabilityStore, Dispatcher, McpError};
    use std::sync::Arc;

    async fn dispatcher() -> Dispatcher {
        let store = Arc::new(CapabilityStore::default());
        register_workshop_prompts(&store)
            .await
            .expect("prompts register");
        Dispatcher::new(store)
    }

    fn arguments(pairs: &[(&str, &str)]) -> Option<PromptArguments> {
        Some(
            pairs
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        )
    }

    fn text(content: &ContentBlock) -> &str {
        match content {
            ContentBlock::Text { text } => text,
            other => panic!("expected text content, got {:?}", other),
        }
    }

    #[test]
    fn greet_prompt_definition() {
        let prompt = GreetPrompt::definition().descriptor();
        assert_eq!(prompt.name, "greet");
        assert_eq!(prompt.arguments.len(), 2);
        assert!(prompt.arguments[0].required);
        assert_eq!(prompt.arguments[0].title.as_deref(), Some("Name"));
        assert!(!prompt.arguments[1].required);
    }

    #[tokio::test]
    async fn greet_without_style() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .get_prompt("greet", arguments(&[("name", "Ada")]))
            .await
            .expect("prompt renders");
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].role, Role::User);
        assert_eq!(text(&result.messages[0].content), "Write a greeting for Ada.");

        let result = dispatcher
            .get_prompt("greet", arguments(&[("name", "Ada"), ("style", "formal")]))
            .await
            .expect("prompt renders");
        assert_eq!(
            text(&result.messages[0].content),
            "Write a formal greeting for Ada."
        );
    }

    #[tokio::test]
    async fn code_review_includes_the_code() {
        let dispatcher = dispatcher().await;

        let result = dispatcher
            .get_prompt(
                "code_review",
                arguments(&[("code", "fn main() {}"), ("language", "rust")]),
            )
            .await
            .expect("prompt renders");
        assert_eq!(result.messages.len(), 2);
        let request = text(&result.messages[0].content);
        assert!(request.contains("rust code"));
        assert!(request.contains("```rust\nfn main() {}\n```"));
        assert_eq!(result.messages[1].role, Role::Assistant);

        let error = dispatcher
            .get_prompt("code_review", arguments(&[("language", "rust")]))
            .await
            .expect_err("code is required");
        assert!(matches!(
            error,
            McpError::MissingRequiredArgument { ref argument, .. } if argument == "code"
        ));
    }
}

#[cfg(test)]
mod message_handler_tests {
    use crate::commands::build_server;
    use crate::config::Config;
    use crate::mcp::protocol::*;
    use crate::mcp::{ConnectionState, McpServer, MessageHandler};
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn handler() -> (Arc<McpServer>, MessageHandler) {
        let server = build_server(&Config::default())
            .await
            .expect("server builds");
        (Arc::clone(&server), MessageHandler::new(server))
    }

    fn request(method: &str, params: Value) -> JsonRpcMessage {
        JsonRpcMessage::Request(JsonRpcRequest::new(
            method.to_string(),
            Some(params),
            RequestId::Number(1),
        ))
    }

    async fn result(handler: &MessageHandler, method: &str, params: Value) -> Value {
        match handler.handle_message(request(method, params)).await {
            Some(JsonRpcMessage::Response(response)) => response.result,
            other => panic!("expected a response to {}, got {:?}", method, other),
        }
    }

    async fn error(handler: &MessageHandler, method: &str, params: Value) -> JsonRpcError {
        match handler.handle_message(request(method, params)).await {
            Some(JsonRpcMessage::ErrorResponse(response)) => {
                assert_eq!(response.id, Some(RequestId::Number(1)));
                response.error
            }
            other => panic!("expected an error for {}, got {:?}", method, other),
        }
    }

    #[tokio::test]
    async fn initialize_handshake() {
        let (_, handler) = handler().await;
        assert_eq!(handler.connection_state().await, ConnectionState::Uninitialized);

        let initialized = result(
            &handler,
            "initialize",
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"}
            }),
        )
        .await;
        assert_eq!(initialized["protocolVersion"], "2025-03-26");
        assert_eq!(initialized["serverInfo"]["name"], "mcp-workshop");
        assert_eq!(initialized["capabilities"]["tools"]["listChanged"], true);
        assert_eq!(initialized["capabilities"]["prompts"]["listChanged"], true);
        let advertised: Vec<&str> = initialized["capabilities"]
            .as_object()
            .expect("capabilities object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(advertised, vec!["prompts", "resources", "tools"]);
        assert_eq!(handler.connection_state().await, ConnectionState::Initializing);

        let notification = JsonRpcMessage::Notification(JsonRpcNotification::new(
            "notifications/initialized".to_string(),
            None,
        ));
        assert!(handler.handle_message(notification).await.is_none());
        assert_eq!(handler.connection_state().await, ConnectionState::Ready);
    }

    #[tokio::test]
    async fn sessions_track_their_own_handshake() {
        let (server, first) = handler().await;
        let second = MessageHandler::new(Arc::clone(&server));
        let same_session = first.clone();

        result(
            &first,
            "initialize",
            json!({
                "protocolVersion": "2025-06-18",
                "clientInfo": {"name": "first", "version": "1.0.0"}
            }),
        )
        .await;

        assert_eq!(same_session.connection_state().await, ConnectionState::Initializing);
        assert_eq!(second.connection_state().await, ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn unadvertised_logging_methods_are_unknown() {
        let (_, handler) = handler().await;
        let set_level = error(&handler, "logging/setLevel", json!({"level": "debug"})).await;
        assert_eq!(set_level.code, error_codes::METHOD_NOT_FOUND);
    }

    #[test]
    fn descriptors_omit_absent_fields() {
        let resource = serde_json::to_value(Resource {
            uri: "info://bare".to_string(),
            name: "Bare".to_string(),
            description: None,
            mime_type: None,
        })
        .expect("resource serializes");
        assert_eq!(resource, json!({"uri": "info://bare", "name": "Bare"}));

        let template = serde_json::to_value(ResourceTemplate {
            uri_template: "bare://{id}".to_string(),
            name: "Bare".to_string(),
            description: None,
            mime_type: None,
        })
        .expect("template serializes");
        assert_eq!(template, json!({"uriTemplate": "bare://{id}", "name": "Bare"}));

        let prompt = serde_json::to_value(Prompt {
            name: "bare".to_string(),
            description: None,
            arguments: Vec::new(),
        })
        .expect("prompt serializes");
        assert_eq!(prompt, json!({"name": "bare", "arguments": []}));
    }

    #[tokio::test]
    async fn unsupported_protocol_version() {
        let (_, handler) = handler().await;
        let error = error(
            &handler,
            "initialize",
            json!({
                "protocolVersion": "1999-01-01",
                "clientInfo": {"name": "old-client", "version": "0.1"}
            }),
        )
        .await;
        assert_eq!(error.code, mcp_error_codes::INVALID_PROTOCOL_VERSION);
        assert!(error.message.contains("2025-06-18"));
    }

    #[tokio::test]
    async fn routes_every_list_method() {
        let (_, handler) = handler().await;

        let tools = result(&handler, "tools/list", json!({})).await;
        assert_eq!(tools["tools"].as_array().map(Vec::len), Some(4));
        let resources = result(&handler, "resources/list", json!({})).await;
        assert_eq!(resources["resources"].as_array().map(Vec::len), Some(1));
        let templates = result(&handler, "resources/templates/list", json!({})).await;
        assert_eq!(
            templates["resourceTemplates"].as_array().map(Vec::len),
            Some(2)
        );
        let prompts = result(&handler, "prompts/list", json!({})).await;
        assert_eq!(prompts["prompts"].as_array().map(Vec::len), Some(2));
        assert_eq!(result(&handler, "ping", json!({})).await, json!({}));
    }

    #[tokio::test]
    async fn tool_call_results_and_errors() {
        let (_, handler) = handler().await;

        let called = result(
            &handler,
            "tools/call",
            json!({"name": "add", "arguments": {"a": 1, "b": 2}}),
        )
        .await;
        assert_eq!(called["isError"], false);
        assert_eq!(called["content"][0]["type"], "text");
        assert_eq!(called["content"][0]["text"], "1 + 2 = 3");

        let missing = error(&handler, "tools/call", json!({"name": "nope"})).await;
        assert_eq!(missing.code, error_codes::INVALID_PARAMS);

        let invalid = error(
            &handler,
            "tools/call",
            json!({"name": "add", "arguments": {"a": 1}}),
        )
        .await;
        assert_eq!(invalid.code, error_codes::INVALID_PARAMS);
        assert_eq!(
            invalid.data.expect("problems are attached")["problems"],
            json!(["missing required parameter 'b'"])
        );
    }

    #[tokio::test]
    async fn resource_and_prompt_requests() {
        let (_, handler) = handler().await;

        let read = result(&handler, "resources/read", json!({"uri": "item://7"})).await;
        assert_eq!(read["contents"][0]["uri"], "item://7");
        assert_eq!(read["contents"][0]["mimeType"], "application/json");

        let missing = error(&handler, "resources/read", json!({"uri": "greeting://"})).await;
        assert_eq!(missing.code, mcp_error_codes::RESOURCE_NOT_FOUND);

        let prompt = result(
            &handler,
            "prompts/get",
            json!({"name": "greet", "arguments": {"name": "Ada"}}),
        )
        .await;
        assert_eq!(prompt["messages"][0]["role"], "user");

        let incomplete = error(&handler, "prompts/get", json!({"name": "greet"})).await;
        assert_eq!(incomplete.code, error_codes::INVALID_PARAMS);
        assert!(incomplete.message.contains("'name'"));
    }

    #[tokio::test]
    async fn unknown_method_and_bad_params() {
        let (_, handler) = handler().await;

        let unknown = error(&handler, "tools/delete", json!({})).await;
        assert_eq!(unknown.code, error_codes::METHOD_NOT_FOUND);

        let bad = error(&handler, "resources/read", json!({"uri": 7})).await;
        assert_eq!(bad.code, error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn responses_from_clients_are_ignored() {
        let (_, handler) = handler().await;
        let response = JsonRpcMessage::Response(JsonRpcResponse::new(
            json!({}),
            RequestId::String("client".to_string()),
        ));
        assert!(handler.handle_message(response).await.is_none());
    }

    #[tokio::test]
    async fn health_status_counts_capabilities() {
        let (server, _) = handler().await;
        let _subscription = server.store().notifier().subscribe();

        let health = server.health_status().await;
        assert_eq!(health.active_sessions, 0);
        assert_eq!(health.tools_registered, 4);
        assert_eq!(health.resources_registered, 3);
        assert_eq!(health.prompts_registered, 2);
        assert_eq!(health.subscribers, 1);
    }
}
