//! MCP Prompts Implementation

use crate::mcp::capability::{PromptDefinition, PromptHandler};
use crate::mcp::errors::McpResult;
use crate::mcp::protocol::{PromptArguments, PromptMessage};
use crate::mcp::store::CapabilityStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;

fn required<'a>(arguments: &'a PromptArguments, name: &str) -> Result<&'a str> {
    arguments
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing required argument: {}", name))
}

/// Asks the model to greet someone in a chosen style
pub struct GreetPrompt;

impl GreetPrompt {
    #[inline]
    pub fn definition() -> PromptDefinition {
        PromptDefinition::new("greet", "Write a greeting for someone", Self)
            .argument("name", Some("Name"), "Who to greet", true)
            .argument(
                "style",
                Some("Style"),
                "Tone of the greeting, e.g. formal or casual",
                false,
            )
    }
}

#[async_trait]
impl PromptHandler for GreetPrompt {
    #[inline]
    async fn render(&self, arguments: PromptArguments) -> Result<Vec<PromptMessage>> {
        let name = required(&arguments, "name")?;
        let request = match arguments.get("style") {
            Some(style) => format!("Write a {} greeting for {}.", style, name),
            None => format!("Write a greeting for {}.", name),
        };
        Ok(vec![PromptMessage::user(request)])
    }
}

/// Asks the model to review a piece of code
pub struct CodeReviewPrompt;

impl CodeReviewPrompt {
    #[inline]
    pub fn definition() -> PromptDefinition {
        PromptDefinition::new("code_review", "Review a piece of code", Self)
            .argument("code", Some("Code"), "The code to review", true)
            .argument(
                "language",
                Some("Language"),
                "Programming language of the code",
                false,
            )
    }
}

#[async_trait]
impl PromptHandler for CodeReviewPrompt {
    #[inline]
    async fn render(&self, arguments: PromptArguments) -> Result<Vec<PromptMessage>> {
        let code = required(&arguments, "code")?;
        let language = arguments.get("language").map_or("", String::as_str);

        let subject = if language.is_empty() {
            "the following code".to_string()
        } else {
            format!("the following {} code", language)
        };
        Ok(vec![
            PromptMessage::user(format!(
                "Please review {}. Point out bugs, unclear naming and missing error handling.\n\n```{}\n{}\n```",
                subject, language, code
            )),
            PromptMessage::assistant(
                "I'll review the code for correctness first, then readability.",
            ),
        ])
    }
}

/// Register every prompt available at startup
#[inline]
pub async fn register_workshop_prompts(store: &CapabilityStore) -> McpResult<()> {
    store.register_prompt(GreetPrompt::definition()).await?;
    store.register_prompt(CodeReviewPrompt::definition()).await?;
    Ok(())
}
