//! Static agent name → base URL registry (spec §4.2 "Resolve the target
//! agent via a static name→URL registry (or a discovery service returning
//! the same map)").

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::A2aError;

/// Maps agent names (`"service_impact"`, `"path_computer"`, ...) to the
/// base URL their A2A server listens on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistry {
    entries: HashMap<String, String>,
}

impl AgentRegistry {
    /// Builds an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from name/URL pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k, v.trim_end_matches('/').to_string())).collect(),
        }
    }

    /// Loads a registry from a JSON file of `{"agent_name": "http://host:port", ...}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not contain a
    /// valid JSON object of string values.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)?;
        Ok(Self::from_entries(entries))
    }

    /// Registers or overwrites a single agent's base URL.
    pub fn register(&mut self, agent_name: impl Into<String>, base_url: impl Into<String>) {
        let base_url = base_url.into();
        self.entries.insert(agent_name.into(), base_url.trim_end_matches('/').to_string());
    }

    /// Resolves `agent_name` to its base URL.
    ///
    /// # Errors
    ///
    /// Returns [`A2aError::UnknownAgent`] if no entry is registered.
    pub fn resolve(&self, agent_name: &str) -> Result<&str, A2aError> {
        self.entries
            .get(agent_name)
            .map(String::as_str)
            .ok_or_else(|| A2aError::UnknownAgent(agent_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_trims_trailing_slash_from_registration() {
        let mut registry = AgentRegistry::new();
        registry.register("path_computer", "http://localhost:8082/");
        assert_eq!(registry.resolve("path_computer").unwrap(), "http://localhost:8082");
    }

    #[test]
    fn resolve_unknown_agent_errors() {
        let registry = AgentRegistry::new();
        assert!(matches!(registry.resolve("ghost"), Err(A2aError::UnknownAgent(_))));
    }
}
