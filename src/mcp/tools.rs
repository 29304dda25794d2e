//! MCP Tools Implementation
//!
//! The workshop tools, including the pair that demonstrates registering a
//! tool while the server is running.

use crate::config::WorkshopConfig;
use crate::mcp::capability::{
    HandlerContext, InputSchema, ParameterType, ToolDefinition, ToolHandler,
};
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::store::CapabilityStore;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on the steps a single `long_task` call may run
pub const MAX_LONG_TASK_STEPS: u64 = 100;

/// Name of the tool `load_bonus_tool` registers
pub const BONUS_TOOL_NAME: &str = "bonus_tool";

fn required_str<'a>(arguments: &'a Arguments, name: &str) -> Result<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required parameter: {}", name))
}

fn required_f64(arguments: &Arguments, name: &str) -> Result<f64> {
    arguments
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| anyhow!("Missing required parameter: {}", name))
}

/// Greets a person by name
pub struct GreetTool;

impl GreetTool {
    #[inline]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new("greet", "Greet someone by name", Self)
            .with_schema(InputSchema::new().required(
                "name",
                ParameterType::String,
                "Name of the person to greet",
            ))
            .with_annotations(ToolAnnotations {
                title: Some("Greeter".to_string()),
                read_only_hint: Some(true),
                ..ToolAnnotations::default()
            })
    }
}

#[async_trait]
impl ToolHandler for GreetTool {
    #[inline]
    async fn handle(&self, _ctx: HandlerContext, arguments: Arguments) -> Result<CallToolResult> {
        let name = required_str(&arguments, "name")?;
        Ok(CallToolResult::text(format!(
            "Hello, {}! Welcome to the MCP workshop.",
            name
        )))
    }
}

/// Adds two numbers
pub struct AddTool;

impl AddTool {
    #[inline]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new("add", "Add two numbers together", Self)
            .with_schema(
                InputSchema::new()
                    .required("a", ParameterType::Number, "First number")
                    .required("b", ParameterType::Number, "Second number"),
            )
            .with_annotations(ToolAnnotations {
                title: Some("Calculator".to_string()),
                read_only_hint: Some(true),
                destructive_hint: Some(false),
                idempotent_hint: Some(true),
                open_world_hint: Some(false),
            })
    }
}

#[async_trait]
impl ToolHandler for AddTool {
    #[inline]
    async fn handle(&self, _ctx: HandlerContext, arguments: Arguments) -> Result<CallToolResult> {
        let a = required_f64(&arguments, "a")?;
        let b = required_f64(&arguments, "b")?;
        Ok(CallToolResult::text(format!("{} + {} = {}", a, b, a + b)))
    }
}

/// Simulates slow work by sleeping between steps
pub struct LongTaskTool {
    default_steps: u64,
    step_delay: Duration,
}

impl LongTaskTool {
    #[inline]
    pub fn new(default_steps: u64, step_delay: Duration) -> Self {
        Self {
            default_steps,
            step_delay,
        }
    }

    #[inline]
    pub fn definition(settings: &WorkshopConfig) -> ToolDefinition {
        let tool = Self::new(settings.long_task_steps, settings.step_delay());
        ToolDefinition::new(
            "long_task",
            "Run a task that takes a while, one step at a time",
            tool,
        )
        .with_schema(InputSchema::new().optional(
            "steps",
            ParameterType::Integer,
            "Number of steps to run",
        ))
        .with_annotations(ToolAnnotations {
            title: Some("Long Task".to_string()),
            read_only_hint: Some(true),
            ..ToolAnnotations::default()
        })
    }
}

#[async_trait]
impl ToolHandler for LongTaskTool {
    #[inline]
    async fn handle(&self, _ctx: HandlerContext, arguments: Arguments) -> Result<CallToolResult> {
        let steps = match arguments.get("steps") {
            None | Some(Value::Null) => self.default_steps,
            Some(value) => value
                .as_u64()
                .ok_or_else(|| anyhow!("steps must be a positive integer"))?,
        };
        if steps == 0 || steps > MAX_LONG_TASK_STEPS {
            bail!("steps must be between 1 and {}", MAX_LONG_TASK_STEPS);
        }

        for step in 1..=steps {
            tokio::time::sleep(self.step_delay).await;
            info!("long_task progress: step {}/{}", step, steps);
        }

        Ok(CallToolResult::text(format!(
            "Long task completed after {} steps",
            steps
        )))
    }
}

/// Registers [`BonusTool`] the first time it is called
pub struct LoadBonusTool;

impl LoadBonusTool {
    #[inline]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            "load_bonus_tool",
            "Load an extra tool into the server at runtime",
            Self,
        )
        .with_annotations(ToolAnnotations {
            title: Some("Load Bonus Tool".to_string()),
            idempotent_hint: Some(true),
            ..ToolAnnotations::default()
        })
    }
}

#[async_trait]
impl ToolHandler for LoadBonusTool {
    #[inline]
    async fn handle(&self, ctx: HandlerContext, _arguments: Arguments) -> Result<CallToolResult> {
        // Whether the tool is registered is the only record of it being loaded.
        match ctx.store.register_tool(BonusTool::definition()).await {
            Ok(()) => {
                info!("Loaded {}", BONUS_TOOL_NAME);
                Ok(CallToolResult::text(format!(
                    "Loaded '{}'. Refresh your tool list to use it.",
                    BONUS_TOOL_NAME
                )))
            }
            Err(McpError::DuplicateIdentifier { .. }) => {
                debug!("{} already loaded", BONUS_TOOL_NAME);
                Ok(CallToolResult::text(format!(
                    "'{}' is already loaded.",
                    BONUS_TOOL_NAME
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// The tool that only exists after `load_bonus_tool` runs
pub struct BonusTool;

impl BonusTool {
    #[inline]
    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            BONUS_TOOL_NAME,
            "A tool that was loaded while the server was running",
            Self,
        )
        .with_annotations(ToolAnnotations {
            read_only_hint: Some(true),
            idempotent_hint: Some(true),
            ..ToolAnnotations::default()
        })
    }
}

#[async_trait]
impl ToolHandler for BonusTool {
    #[inline]
    async fn handle(&self, _ctx: HandlerContext, _arguments: Arguments) -> Result<CallToolResult> {
        Ok(CallToolResult::text(
            "You found the bonus tool! It was registered at runtime.",
        ))
    }
}

/// Register every tool available at startup
#[inline]
pub async fn register_workshop_tools(
    store: &CapabilityStore,
    settings: &WorkshopConfig,
) -> McpResult<()> {
    store.register_tool(GreetTool::definition()).await?;
    store.register_tool(AddTool::definition()).await?;
    store
        .register_tool(LongTaskTool::definition(settings))
        .await?;
    store.register_tool(LoadBonusTool::definition()).await?;
    Ok(())
}
