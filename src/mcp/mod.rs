//! MCP (Model Context Protocol) Server Implementation
//!
//! A capability registry of tools, resources and prompts, a dispatcher that
//! routes invocations to their handlers, and stdio and HTTP transports
//! following the JSON-RPC 2.0 specification and MCP protocol version
//! 2025-06-18.

#[cfg(test)]
mod tests;

pub mod capability;
pub mod dispatcher;
pub mod errors;
pub mod http;
pub mod notifier;
pub mod prompts;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod store;
pub mod template;
pub mod tools;
pub mod validation;

pub use capability::{
    Capability, CapabilityKind, HandlerContext, InputSchema, ParameterType, PromptDefinition,
    PromptHandler, ResourceDefinition, ResourceHandler, ToolDefinition, ToolHandler,
};
pub use dispatcher::Dispatcher;
pub use errors::{McpError, McpResult};
pub use notifier::{ChangeNotifier, ListChanged, Subscription};
pub use server::{ConnectionState, McpServer, MessageHandler};
pub use store::CapabilityStore;
pub use template::{TemplateParams, UriTemplate};

use crate::config::WorkshopConfig;

/// Register the workshop's tools, resources and prompts on `server`
#[inline]
pub async fn register_workshop_capabilities(
    server: &McpServer,
    settings: &WorkshopConfig,
) -> McpResult<()> {
    let store = server.store();
    tools::register_workshop_tools(store, settings).await?;
    resources::register_workshop_resources(store, &server.server_info).await?;
    prompts::register_workshop_prompts(store).await?;
    Ok(())
}
