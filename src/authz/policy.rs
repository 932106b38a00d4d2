use std::collections::HashMap;
use std::sync::Arc;

use super::capability::Capability;
use crate::errors::AppResult;

/// A named policy bound to the capability it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRequirement {
    pub name: String,
    pub capability: Capability,
}

impl PolicyRequirement {
    pub fn new(capability: Capability) -> Self {
        Self {
            name: capability.name().to_string(),
            capability,
        }
    }
}

/// Policies registered at process start, one requirement per capability.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<PolicyRequirement>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all_capabilities() -> Self {
        let mut registry = Self::new();
        for capability in Capability::ALL {
            registry
                .policies
                .entry(capability.name().to_string())
                .or_insert_with(|| Arc::new(PolicyRequirement::new(*capability)));
        }
        registry
    }

    /// Registers `name`, returning the existing requirement when it is already
    /// known. Unknown capability names are configuration errors.
    pub fn register(&mut self, name: &str) -> AppResult<Arc<PolicyRequirement>> {
        if let Some(existing) = self.policies.get(name) {
            return Ok(Arc::clone(existing));
        }

        let capability: Capability = name.parse()?;
        let requirement = Arc::new(PolicyRequirement::new(capability));
        self.policies.insert(name.to_string(), Arc::clone(&requirement));
        tracing::debug!(policy = %name, "policy registered");
        Ok(requirement)
    }

    pub fn get(&self, name: &str) -> Option<Arc<PolicyRequirement>> {
        self.policies.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
