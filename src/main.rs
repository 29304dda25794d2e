use clap::{Parser, Subcommand};
use mcp_workshop::Result;
use mcp_workshop::commands::{
    init_config, list_capabilities, load_config, serve_http, serve_stdio, show_config,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcp-workshop")]
#[command(about = "Workshop MCP server exposing tools, resources and prompts over stdio or HTTP")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio
    ServeStdio,
    /// Start MCP server on HTTP with an event stream for notifications
    ServeHttp {
        /// Port to listen on, overriding PORT and the config file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to config.toml
        #[arg(long)]
        init: bool,
    },
    /// List the capabilities registered at startup
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol traffic when serving over stdio
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::ServeStdio => {
            serve_stdio(&config).await?;
        }
        Commands::ServeHttp { port } => {
            serve_http(&config, port).await?;
        }
        Commands::Config { init } => {
            if init {
                let stored = init_config(cli.config_dir.as_deref())?;
                println!("Wrote {}", stored.config_file_path().display());
            }
            show_config(&config)?;
        }
        Commands::List => {
            list_capabilities(&config).await?;
        }
    }

    Ok(())
}
