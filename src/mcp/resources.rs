//! MCP Resources Implementation
//!
//! A static description of the server and two templated resource families.

use crate::mcp::capability::{ResourceDefinition, ResourceHandler};
use crate::mcp::errors::McpResult;
use crate::mcp::protocol::{Implementation, ResourceContents};
use crate::mcp::store::CapabilityStore;
use crate::mcp::template::TemplateParams;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::json;

fn param<'a>(params: &'a TemplateParams, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("URI is missing '{}'", name))
}

/// `info://server`
#[inline]
pub fn server_info(info: &Implementation) -> ResourceDefinition {
    let text = format!(
        "{} v{}\n\nA Model Context Protocol workshop server exposing tools, \
         resources and prompts over stdio and HTTP.",
        info.name, info.version
    );
    ResourceDefinition::text("info://server", "Server Information", "text/plain", &text)
        .with_description("Basic information about this server")
}

/// Personal greeting for whoever is named in the URI
pub struct GreetingResource;

impl GreetingResource {
    #[inline]
    pub fn definition() -> McpResult<ResourceDefinition> {
        Ok(
            ResourceDefinition::templated("greeting://{name}", "Personal Greeting", Self)?
                .with_description("A greeting for the person named in the URI")
                .with_mime_type("text/plain"),
        )
    }
}

#[async_trait]
impl ResourceHandler for GreetingResource {
    #[inline]
    async fn read(&self, uri: String, params: TemplateParams) -> Result<Vec<ResourceContents>> {
        let name = param(&params, "name")?;
        let text = format!("Hello, {}! This greeting was generated for {}.", name, uri);
        Ok(vec![ResourceContents::text(
            uri,
            Some("text/plain".to_string()),
            text,
        )])
    }
}

/// Catalogue item looked up by id
pub struct ItemResource;

impl ItemResource {
    #[inline]
    pub fn definition() -> McpResult<ResourceDefinition> {
        Ok(
            ResourceDefinition::templated("item://{id}", "Catalogue Item", Self)?
                .with_description("Details of a catalogue item")
                .with_mime_type("application/json"),
        )
    }
}

#[async_trait]
impl ResourceHandler for ItemResource {
    #[inline]
    async fn read(&self, uri: String, params: TemplateParams) -> Result<Vec<ResourceContents>> {
        let id = param(&params, "id")?;
        let item = json!({
            "id": id,
            "name": format!("Item {}", id),
            "description": format!("Sample catalogue entry for item {}", id),
        });
        Ok(vec![ResourceContents::text(
            uri,
            Some("application/json".to_string()),
            serde_json::to_string_pretty(&item)?,
        )])
    }
}

/// Register every resource available at startup
#[inline]
pub async fn register_workshop_resources(
    store: &CapabilityStore,
    info: &Implementation,
) -> McpResult<()> {
    store.register_resource(server_info(info)).await?;
    store
        .register_resource(GreetingResource::definition()?)
        .await?;
    store.register_resource(ItemResource::definition()?).await?;
    Ok(())
}
