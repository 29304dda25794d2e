//! Capability Definitions
//!
//! Tools, resources and prompts as the registry stores them: the metadata
//! advertised to clients plus the handler that serves each invocation.

use crate::mcp::errors::McpResult;
use crate::mcp::protocol::*;
use crate::mcp::store::CapabilityStore;
use crate::mcp::template::{TemplateParams, UriTemplate};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

/// The three kinds of capability an MCP server exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for CapabilityKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        })
    }
}

/// State handed to every handler invocation
#[derive(Clone)]
pub struct HandlerContext {
    /// The store the handler was dispatched from. Tools may register further
    /// capabilities through it while they run.
    pub store: Arc<CapabilityStore>,
}

/// Tool handler trait for implementing tool execution
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, ctx: HandlerContext, arguments: Arguments) -> Result<CallToolResult>;
}

/// Resource handler trait for implementing resource access
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: String, params: TemplateParams) -> Result<Vec<ResourceContents>>;
}

/// Prompt handler trait for rendering prompt messages
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, arguments: PromptArguments) -> Result<Vec<PromptMessage>>;
}

/// JSON type a tool parameter must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    /// JSON schema type name
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Whether `value` has this type
    #[inline]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One declared tool parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub description: Option<String>,
    pub required: bool,
}

/// Declared input parameters of a tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    pub parameters: Vec<SchemaParameter>,
}

impl InputSchema {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter the caller must supply
    #[inline]
    #[must_use]
    pub fn required(self, name: &str, parameter_type: ParameterType, description: &str) -> Self {
        self.parameter(name, parameter_type, description, true)
    }

    /// Add a parameter the caller may omit
    #[inline]
    #[must_use]
    pub fn optional(self, name: &str, parameter_type: ParameterType, description: &str) -> Self {
        self.parameter(name, parameter_type, description, false)
    }

    fn parameter(
        mut self,
        name: &str,
        parameter_type: ParameterType,
        description: &str,
        required: bool,
    ) -> Self {
        self.parameters.push(SchemaParameter {
            name: name.to_string(),
            parameter_type,
            description: (!description.is_empty()).then(|| description.to_string()),
            required,
        });
        self
    }

    /// Check arguments against the declared parameters. Every problem is
    /// reported, not just the first. Undeclared arguments are ignored.
    #[inline]
    pub fn check(&self, arguments: &Arguments) -> Vec<String> {
        let mut problems = Vec::new();

        for parameter in &self.parameters {
            match arguments.get(&parameter.name).filter(|value| !value.is_null()) {
                None if parameter.required => {
                    problems.push(format!("missing required parameter '{}'", parameter.name));
                }
                None => {}
                Some(value) if !parameter.parameter_type.accepts(value) => {
                    problems.push(format!(
                        "parameter '{}' must be of type {}",
                        parameter.name,
                        parameter.parameter_type.as_str()
                    ));
                }
                Some(_) => {}
            }
        }

        problems
    }

    /// JSON schema advertised in `tools/list`
    #[inline]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for parameter in &self.parameters {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(parameter.parameter_type.as_str()));
            if let Some(description) = &parameter.description {
                property.insert("description".to_string(), json!(description));
            }
            properties.insert(parameter.name.clone(), Value::Object(property));
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|parameter| parameter.required)
            .map(|parameter| parameter.name.as_str())
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }
}

/// A registered tool
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<InputSchema>,
    pub annotations: Option<ToolAnnotations>,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    #[inline]
    pub fn new<H>(name: &str, description: &str, handler: H) -> Self
    where
        H: ToolHandler + 'static,
    {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: None,
            annotations: None,
            handler: Arc::new(handler),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Descriptor advertised in `tools/list`
    #[inline]
    pub fn descriptor(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self
                .input_schema
                .as_ref()
                .map_or_else(|| json!({"type": "object", "properties": {}}), InputSchema::to_json_schema),
            annotations: self.annotations.clone(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

/// Where a resource lives: one exact URI or a family of URIs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    Static(String),
    Template(UriTemplate),
}

impl ResourceLocator {
    /// The URI or template string identifying the resource in the store
    #[inline]
    pub fn key(&self) -> &str {
        match self {
            Self::Static(uri) => uri,
            Self::Template(template) => template.as_str(),
        }
    }
}

/// A registered resource
#[derive(Clone)]
pub struct ResourceDefinition {
    pub locator: ResourceLocator,
    pub name: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub handler: Arc<dyn ResourceHandler>,
}

impl ResourceDefinition {
    /// A resource served from one exact URI
    #[inline]
    pub fn fixed<H>(uri: &str, name: &str, handler: H) -> Self
    where
        H: ResourceHandler + 'static,
    {
        Self {
            locator: ResourceLocator::Static(uri.to_string()),
            name: name.to_string(),
            description: None,
            mime_type: None,
            handler: Arc::new(handler),
        }
    }

    /// A resource served for every URI matching `template`
    #[inline]
    pub fn templated<H>(template: &str, name: &str, handler: H) -> McpResult<Self>
    where
        H: ResourceHandler + 'static,
    {
        Ok(Self {
            locator: ResourceLocator::Template(UriTemplate::compile(template)?),
            name: name.to_string(),
            description: None,
            mime_type: None,
            handler: Arc::new(handler),
        })
    }

    /// A static resource whose content never changes
    #[inline]
    pub fn text(uri: &str, name: &str, mime_type: &str, content: &str) -> Self {
        Self::fixed(
            uri,
            name,
            StaticContent {
                mime_type: mime_type.to_string(),
                text: content.to_string(),
            },
        )
        .with_mime_type(mime_type)
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    #[inline]
    pub fn key(&self) -> &str {
        self.locator.key()
    }

    #[inline]
    pub fn template(&self) -> Option<&UriTemplate> {
        match &self.locator {
            ResourceLocator::Template(template) => Some(template),
            ResourceLocator::Static(_) => None,
        }
    }

    /// Descriptor for `resources/list`, static resources only
    #[inline]
    pub fn resource_descriptor(&self) -> Option<Resource> {
        match &self.locator {
            ResourceLocator::Static(uri) => Some(Resource {
                uri: uri.clone(),
                name: self.name.clone(),
                description: self.description.clone(),
                mime_type: self.mime_type.clone(),
            }),
            ResourceLocator::Template(_) => None,
        }
    }

    /// Descriptor for `resources/templates/list`, templates only
    #[inline]
    pub fn template_descriptor(&self) -> Option<ResourceTemplate> {
        self.template().map(|template| ResourceTemplate {
            uri_template: template.as_str().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        })
    }
}

impl fmt::Debug for ResourceDefinition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("locator", &self.locator)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

/// Handler serving the same text for every read
struct StaticContent {
    mime_type: String,
    text: String,
}

#[async_trait]
impl ResourceHandler for StaticContent {
    async fn read(&self, uri: String, _params: TemplateParams) -> Result<Vec<ResourceContents>> {
        Ok(vec![ResourceContents::text(
            uri,
            Some(self.mime_type.clone()),
            self.text.clone(),
        )])
    }
}

/// A registered prompt
#[derive(Clone)]
pub struct PromptDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
    pub handler: Arc<dyn PromptHandler>,
}

impl PromptDefinition {
    #[inline]
    pub fn new<H>(name: &str, description: &str, handler: H) -> Self
    where
        H: PromptHandler + 'static,
    {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            arguments: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Declare an argument; `title` is the human-facing label
    #[inline]
    #[must_use]
    pub fn argument(mut self, name: &str, title: Option<&str>, description: &str, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.to_string(),
            title: title.map(str::to_string),
            description: Some(description.to_string()),
            required,
        });
        self
    }

    /// First required argument absent from `arguments`
    #[inline]
    pub fn missing_argument(&self, arguments: &PromptArguments) -> Option<&str> {
        self.arguments
            .iter()
            .find(|argument| argument.required && !arguments.contains_key(&argument.name))
            .map(|argument| argument.name.as_str())
    }

    /// Descriptor advertised in `prompts/list`
    #[inline]
    pub fn descriptor(&self) -> Prompt {
        Prompt {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

impl fmt::Debug for PromptDefinition {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptDefinition")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Any registered capability, tagged with its kind
#[derive(Debug, Clone)]
pub enum Capability {
    Tool(Arc<ToolDefinition>),
    Resource(Arc<ResourceDefinition>),
    Prompt(Arc<PromptDefinition>),
}

impl Capability {
    #[inline]
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Tool(_) => CapabilityKind::Tool,
            Self::Resource(_) => CapabilityKind::Resource,
            Self::Prompt(_) => CapabilityKind::Prompt,
        }
    }

    /// Name of a tool or prompt, URI or template string of a resource
    #[inline]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Tool(tool) => &tool.name,
            Self::Resource(resource) => resource.key(),
            Self::Prompt(prompt) => &prompt.name,
        }
    }
}
