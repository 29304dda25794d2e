//! Request Dispatcher
//!
//! Resolves a tool call, resource read or prompt request to its registered
//! handler, validates the input, and runs the handler on its own task. All
//! failures are settled here; nothing is retried.


use crate::mcp::capability::{CapabilityKind, HandlerContext};
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::store::CapabilityStore;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes invocations to the handlers held by a [`CapabilityStore`]
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<CapabilityStore>,
}

impl Dispatcher {
    #[inline]
    pub fn new(store: Arc<CapabilityStore>) -> Self {
        Self { store }
    }

    #[inline]
    pub fn store(&self) -> &Arc<CapabilityStore> {
        &self.store
    }

    fn context(&self) -> HandlerContext {
        HandlerContext {
            store: Arc::clone(&self.store),
        }
    }

    /// Invoke a tool.
    ///
    /// Unknown tools and invalid arguments are protocol errors. A handler that
    /// fails or panics produces a successful response whose result carries
    /// `isError: true`.
    #[inline]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Arguments>,
    ) -> McpResult<CallToolResult> {
        let tool = self
            .store
            .tool(name)
            .await
            .ok_or_else(|| McpError::NotFound {
                kind: CapabilityKind::Tool,
                id: name.to_string(),
            })?;

        let arguments = arguments.unwrap_or_default();
        if let Some(schema) = &tool.input_schema {
            let problems = schema.check(&arguments);
            if !problems.is_empty() {
                return Err(McpError::InvalidArguments {
                    tool: name.to_string(),
                    problems,
                });
            }
        }

        debug!("Calling tool '{}'", name);
        let handler = Arc::clone(&tool.handler);
        let ctx = self.context();
        match run_isolated(async move { handler.handle(ctx, arguments).await }).await {
            Ok(result) => Ok(result),
            Err(message) => {
                warn!("Tool '{}' failed: {}", name, message);
                Ok(CallToolResult::error(format!(
                    "Tool '{}' failed: {}",
                    name, message
                )))
            }
        }
    }

    /// Read a resource by exact URI or through a matching template
    #[inline]
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let (resource, params) =
            self.store
                .resolve_resource(uri)
                .await
                .ok_or_else(|| McpError::NotFound {
                    kind: CapabilityKind::Resource,
                    id: uri.to_string(),
                })?;

        debug!("Reading resource '{}' via '{}'", uri, resource.key());
        let handler = Arc::clone(&resource.handler);
        let owned_uri = uri.to_string();
        let contents = run_isolated(async move { handler.read(owned_uri, params).await })
            .await
            .map_err(|message| McpError::HandlerFailure {
                kind: CapabilityKind::Resource,
                id: uri.to_string(),
                message,
            })?;

        Ok(ReadResourceResult { contents })
    }

    /// Render a prompt. Required arguments must be present; optional ones
    /// reach the handler only if the caller supplied them.
    #[inline]
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<PromptArguments>,
    ) -> McpResult<GetPromptResult> {
        let prompt = self
            .store
            .prompt(name)
            .await
            .ok_or_else(|| McpError::NotFound {
                kind: CapabilityKind::Prompt,
                id: name.to_string(),
            })?;

        let arguments = arguments.unwrap_or_default();
        if let Some(missing) = prompt.missing_argument(&arguments) {
            return Err(McpError::MissingRequiredArgument {
                prompt: name.to_string(),
                argument: missing.to_string(),
            });
        }

        debug!("Rendering prompt '{}'", name);
        let handler = Arc::clone(&prompt.handler);
        let messages = run_isolated(async move { handler.render(arguments).await })
            .await
            .map_err(|message| McpError::HandlerFailure {
                kind: CapabilityKind::Prompt,
                id: name.to_string(),
                message,
            })?;

        Ok(GetPromptResult {
            description: prompt.description.clone(),
            messages,
        })
    }

    #[inline]
    pub async fn list_tools(&self) -> ListToolsResult {
        let tools = self.store.tools().await;
        ListToolsResult {
            tools: tools.iter().map(|tool| tool.descriptor()).collect(),
        }
    }

    /// Static resources only; templates are listed separately
    #[inline]
    pub async fn list_resources(&self) -> ListResourcesResult {
        let resources = self.store.resources().await;
        ListResourcesResult {
            resources: resources
                .iter()
                .filter_map(|resource| resource.resource_descriptor())
                .collect(),
        }
    }

    #[inline]
    pub async fn list_resource_templates(&self) -> ListResourceTemplatesResult {
        let resources = self.store.resources().await;
        ListResourceTemplatesResult {
            resource_templates: resources
                .iter()
                .filter_map(|resource| resource.template_descriptor())
                .collect(),
        }
    }

    #[inline]
    pub async fn list_prompts(&self) -> ListPromptsResult {
        let prompts = self.store.prompts().await;
        ListPromptsResult {
            prompts: prompts.iter().map(|prompt| prompt.descriptor()).collect(),
        }
    }
}

/// Run a handler future on its own task so a slow handler cannot hold up
/// other requests and a panicking one is reported instead of propagated.
async fn run_isolated<T, F>(future: F) -> Result<T, String>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(format!("{:#}", error)),
        Err(join_error) if join_error.is_panic() => Err(format!(
            "handler panicked: {}",
            panic_message(join_error.into_panic().as_ref())
        )),
        Err(join_error) => Err(join_error.to_string()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
