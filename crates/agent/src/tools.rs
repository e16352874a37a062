use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use incidentfox_core::errors::{IntegrationError, NoContextError};
use incidentfox_core::resolver::{ConfigResolver, ResolvedConfig};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Integration(#[from] IntegrationError),
    #[error(transparent)]
    NoContext(#[from] NoContextError),
    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Everything a tool gets for one invocation.
#[derive(Clone, Copy, Debug)]
pub struct ToolCall<'a> {
    pub tool: &'static str,
    pub integration: &'static str,
    pub input: &'a Value,
    pub resolver: &'a ConfigResolver,
}

impl ToolCall<'_> {
    /// Resolves this tool's integration config through the precedence chain.
    pub fn resolve(&self) -> Result<ResolvedConfig, IntegrationError> {
        self.resolver.resolve(self.integration, Some(self.tool))
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn integration(&self) -> &'static str;
    async fn execute(&self, call: ToolCall<'_>) -> Result<Value, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::Value;

    use super::{Tool, ToolCall, ToolError, ToolRegistry};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn integration(&self) -> &'static str {
            "internal"
        }

        async fn execute(&self, call: ToolCall<'_>) -> Result<Value, ToolError> {
            Ok(call.input.clone())
        }
    }

    #[test]
    fn registry_indexes_tools_by_name() {
        let mut registry = ToolRegistry::default();
        assert!(registry.is_empty());

        registry.register(Echo);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), ["echo"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }
}
