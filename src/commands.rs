use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::mcp::{Capability, CapabilityKind, McpServer, register_workshop_capabilities};

/// Load the configuration from `config_dir`, or the default directory
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = get_config_dir(config_dir)?;
    Config::load(&dir).with_context(|| format!("Failed to load configuration from {}", dir.display()))
}

/// Write the stored configuration to `config.toml`. Environment overrides
/// such as `PORT` only apply to the running process and are not saved.
#[inline]
pub fn init_config(config_dir: Option<&Path>) -> Result<Config> {
    let dir = get_config_dir(config_dir)?;
    let stored = Config::load_stored(&dir)
        .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;
    stored.save()?;
    info!("Wrote {}", stored.config_file_path().display());
    Ok(stored)
}

/// Build a server with every workshop capability registered
#[inline]
pub async fn build_server(config: &Config) -> Result<Arc<McpServer>> {
    let server = McpServer::new(config.server.name.clone(), config.server.version.clone())
        .with_instructions(
            "Workshop server: try the greet, add and long_task tools, then call \
             load_bonus_tool to add a tool at runtime.",
        );

    register_workshop_capabilities(&server, &config.workshop)
        .await
        .context("Failed to register workshop capabilities")?;

    Ok(Arc::new(server))
}

/// Start MCP server on stdio
#[inline]
pub async fn serve_stdio(config: &Config) -> Result<()> {
    let server = build_server(config).await?;
    server.serve_stdio().await
}

/// Start MCP server on HTTP, overriding the configured port with `port`
#[inline]
pub async fn serve_http(config: &Config, port: Option<u16>) -> Result<()> {
    let mut server_config = config.server.clone();
    if let Some(port) = port {
        server_config.set_port(port)?;
    }
    let addr = server_config.bind_address()?;

    let server = build_server(config).await?;
    info!(
        "Serving '{}' v{} over HTTP",
        server.server_info.name, server.server_info.version
    );
    crate::mcp::http::serve_http(server, addr).await
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", crate::config::show_config(config)?);
    Ok(())
}

/// Human-readable listing of the capabilities registered at startup
#[inline]
pub async fn describe_capabilities(server: &McpServer) -> String {
    let store = server.store();
    let mut lines = Vec::new();

    for (kind, heading) in [
        (CapabilityKind::Tool, "Tools"),
        (CapabilityKind::Resource, "Resources"),
        (CapabilityKind::Prompt, "Prompts"),
    ] {
        let capabilities = store.list(kind).await;
        lines.push(format!("{} ({}):", heading, capabilities.len()));
        for capability in &capabilities {
            let description = match capability {
                Capability::Tool(tool) => tool.description.clone(),
                Capability::Resource(resource) => resource.description.clone(),
                Capability::Prompt(prompt) => prompt.description.clone(),
            };
            lines.push(format!(
                "  {:<20} {}",
                capability.identifier(),
                description.unwrap_or_default()
            ));
        }
    }

    lines.join("\n")
}

/// Print the capabilities registered at startup
#[inline]
pub async fn list_capabilities(config: &Config) -> Result<()> {
    let server = build_server(config).await?;
    println!("{}", describe_capabilities(&server).await);
    Ok(())
}
