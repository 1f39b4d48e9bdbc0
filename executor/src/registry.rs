use std::collections::HashMap;
use std::sync::Arc;

use relay_types::RelayError;

use crate::definition::{ToolDefinition, ToolDescriptor};
use crate::validate::{JsonSchemaValidator, ParamValidator};

/// Registered tools, keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<ToolDefinition>>,
    validator: Arc<dyn ParamValidator>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_validator(Arc::new(JsonSchemaValidator))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn with_validator(validator: Arc<dyn ParamValidator>) -> Self {
        Self {
            tools: HashMap::new(),
            validator,
        }
    }

    pub fn register(&mut self, tool: ToolDefinition) -> Result<(), RelayError> {
        if self.tools.contains_key(&tool.name) {
            return Err(RelayError::DuplicateTool { name: tool.name });
        }
        self.validator.check_schema(&tool.schema)?;
        tracing::debug!(tool = %tool.name, mode = tool.mode.as_str(), "Tool registered");
        self.tools.insert(tool.name.clone(), Arc::new(tool));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ToolDefinition>, RelayError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| RelayError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDescriptor> {
        let mut defs: Vec<ToolDescriptor> =
            self.tools.values().map(|tool| tool.descriptor()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}
