//! Capability Store
//!
//! Holds every registered tool, resource and prompt in registration order.
//! Readers clone `Arc` handles out from under a shared lock, so a handler is
//! never invoked while the store is locked and may register further
//! capabilities itself.


use crate::mcp::capability::{
    Capability, CapabilityKind, PromptDefinition, ResourceDefinition, ResourceLocator,
    ToolDefinition,
};
use crate::mcp::errors::{McpError, McpResult};
use crate::mcp::notifier::ChangeNotifier;
use crate::mcp::template::{self, TemplateParams};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Insertion-ordered map from identifier to definition
#[derive(Debug)]
struct OrderedMap<T> {
    entries: Vec<Arc<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> OrderedMap<T> {
    /// Insert unless `key` is taken. Returns whether the value was inserted.
    fn insert(&mut self, key: String, value: T) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(Arc::new(value));
        true
    }

    fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.index.get(key).and_then(|&position| self.entries.get(position))
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Capabilities {
    tools: OrderedMap<ToolDefinition>,
    resources: OrderedMap<ResourceDefinition>,
    prompts: OrderedMap<PromptDefinition>,
}

/// Registry of every capability the server exposes
#[derive(Debug, Default)]
pub struct CapabilityStore {
    capabilities: RwLock<Capabilities>,
    notifier: ChangeNotifier,
}

impl CapabilityStore {
    #[inline]
    pub fn new(notifier: ChangeNotifier) -> Self {
        Self {
            capabilities: RwLock::new(Capabilities::default()),
            notifier,
        }
    }

    /// Notifier fired whenever a registration succeeds
    #[inline]
    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Register a tool. Fails if a tool with the same name exists.
    #[inline]
    pub async fn register_tool(&self, definition: ToolDefinition) -> McpResult<()> {
        let name = definition.name.clone();
        {
            let mut capabilities = self.capabilities.write().await;
            if !capabilities.tools.insert(name.clone(), definition) {
                return Err(McpError::DuplicateIdentifier {
                    kind: CapabilityKind::Tool,
                    id: name,
                });
            }
        }

        debug!("Registered tool: {}", name);
        self.notifier.notify_tools_changed();
        Ok(())
    }

    /// Register a resource. Fails if the URI or template string is taken.
    #[inline]
    pub async fn register_resource(&self, definition: ResourceDefinition) -> McpResult<()> {
        let key = definition.key().to_string();
        {
            let mut capabilities = self.capabilities.write().await;
            if !capabilities.resources.insert(key.clone(), definition) {
                return Err(McpError::DuplicateIdentifier {
                    kind: CapabilityKind::Resource,
                    id: key,
                });
            }
        }

        debug!("Registered resource: {}", key);
        self.notifier.notify(CapabilityKind::Resource);
        Ok(())
    }

    /// Register a prompt. Fails if a prompt with the same name exists.
    #[inline]
    pub async fn register_prompt(&self, definition: PromptDefinition) -> McpResult<()> {
        let name = definition.name.clone();
        {
            let mut capabilities = self.capabilities.write().await;
            if !capabilities.prompts.insert(name.clone(), definition) {
                return Err(McpError::DuplicateIdentifier {
                    kind: CapabilityKind::Prompt,
                    id: name,
                });
            }
        }

        debug!("Registered prompt: {}", name);
        self.notifier.notify(CapabilityKind::Prompt);
        Ok(())
    }

    /// Every capability of `kind`, in registration order
    #[inline]
    pub async fn list(&self, kind: CapabilityKind) -> Vec<Capability> {
        let capabilities = self.capabilities.read().await;
        match kind {
            CapabilityKind::Tool => capabilities
                .tools
                .iter()
                .map(|tool| Capability::Tool(Arc::clone(tool)))
                .collect(),
            CapabilityKind::Resource => capabilities
                .resources
                .iter()
                .map(|resource| Capability::Resource(Arc::clone(resource)))
                .collect(),
            CapabilityKind::Prompt => capabilities
                .prompts
                .iter()
                .map(|prompt| Capability::Prompt(Arc::clone(prompt)))
                .collect(),
        }
    }

    /// Look up a capability by identifier. Resources fall back to template
    /// resolution when no resource is registered under the exact URI.
    #[inline]
    pub async fn get(&self, kind: CapabilityKind, id: &str) -> Option<Capability> {
        match kind {
            CapabilityKind::Tool => self.tool(id).await.map(Capability::Tool),
            CapabilityKind::Resource => {
                let exact = self
                    .capabilities
                    .read()
                    .await
                    .resources
                    .get(id)
                    .map(Arc::clone);
                match exact {
                    Some(resource) => Some(Capability::Resource(resource)),
                    None => self
                        .resolve_resource(id)
                        .await
                        .map(|(resource, _)| Capability::Resource(resource)),
                }
            }
            CapabilityKind::Prompt => self.prompt(id).await.map(Capability::Prompt),
        }
    }

    #[inline]
    pub async fn contains(&self, kind: CapabilityKind, id: &str) -> bool {
        let capabilities = self.capabilities.read().await;
        match kind {
            CapabilityKind::Tool => capabilities.tools.contains(id),
            CapabilityKind::Resource => capabilities.resources.contains(id),
            CapabilityKind::Prompt => capabilities.prompts.contains(id),
        }
    }

    /// Number of registered capabilities of `kind`
    #[inline]
    pub async fn len(&self, kind: CapabilityKind) -> usize {
        let capabilities = self.capabilities.read().await;
        match kind {
            CapabilityKind::Tool => capabilities.tools.len(),
            CapabilityKind::Resource => capabilities.resources.len(),
            CapabilityKind::Prompt => capabilities.prompts.len(),
        }
    }

    #[inline]
    pub async fn tools(&self) -> Vec<Arc<ToolDefinition>> {
        self.capabilities.read().await.tools.iter().cloned().collect()
    }

    #[inline]
    pub async fn resources(&self) -> Vec<Arc<ResourceDefinition>> {
        self.capabilities
            .read()
            .await
            .resources
            .iter()
            .cloned()
            .collect()
    }

    #[inline]
    pub async fn prompts(&self) -> Vec<Arc<PromptDefinition>> {
        self.capabilities.read().await.prompts.iter().cloned().collect()
    }

    #[inline]
    pub async fn tool(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.capabilities.read().await.tools.get(name).cloned()
    }

    #[inline]
    pub async fn prompt(&self, name: &str) -> Option<Arc<PromptDefinition>> {
        self.capabilities.read().await.prompts.get(name).cloned()
    }

    /// Find the resource serving `uri`: a static resource registered under
    /// exactly that URI, otherwise the best matching template.
    #[inline]
    pub async fn resolve_resource(
        &self,
        uri: &str,
    ) -> Option<(Arc<ResourceDefinition>, TemplateParams)> {
        let capabilities = self.capabilities.read().await;

        if let Some(resource) = capabilities.resources.get(uri) {
            if matches!(resource.locator, ResourceLocator::Static(_)) {
                return Some((Arc::clone(resource), TemplateParams::new()));
            }
        }

        let templates = capabilities.resources.iter().filter_map(|resource| {
            resource
                .template()
                .map(|template| (template, resource))
        });
        template::resolve(templates, uri).map(|(resource, params)| (Arc::clone(resource), params))
    }
}
