//! Hub configuration.
//!
//! Defaults suit a single Venus OS installation with the built-in descriptor
//! table. Values can come from a JSON file or be overlaid from the
//! environment variables listed in [`env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::builtin_topics::builtin_registry;
use crate::error::{Error, Result};
use crate::registry::TopicRegistry;

/// Environment variable names.
pub mod env_vars {
    pub const INSTALLATION_ID: &str = "VICTRON_MQTT_INSTALLATION_ID";
    pub const DESCRIPTOR_FILE: &str = "VICTRON_MQTT_DESCRIPTOR_FILE";
    pub const LOG_JSON: &str = "VICTRON_MQTT_LOG_JSON";
}

/// Configuration of a [`crate::hub::MetricHub`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Only accept messages from this installation. `None` accepts all.
    pub installation_id: Option<String>,
    /// JSON descriptor table loaded in addition to, or instead of, the built-in one
    pub descriptor_file: Option<PathBuf>,
    /// Load the built-in descriptor table
    pub include_builtin_topics: bool,
    /// Fire update callbacks for updates that do not change the value
    pub notify_unchanged: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            installation_id: None,
            descriptor_file: None,
            include_builtin_topics: true,
            notify_unchanged: false,
        }
    }
}

impl HubConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply environment variables on top of the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(id) = non_empty_var(env_vars::INSTALLATION_ID) {
            self.installation_id = Some(id);
        }
        if let Some(file) = non_empty_var(env_vars::DESCRIPTOR_FILE) {
            self.descriptor_file = Some(PathBuf::from(file));
        }
        self
    }

    /// Whether messages from `installation_id` pass the filter.
    pub fn accepts_installation(&self, installation_id: &str) -> bool {
        self.installation_id
            .as_deref()
            .map_or(true, |id| id == installation_id)
    }

    /// Build the descriptor registry this configuration describes.
    pub fn build_registry(&self) -> Result<TopicRegistry> {
        let mut registry = if self.include_builtin_topics {
            builtin_registry()?
        } else {
            TopicRegistry::new()
        };

        if let Some(path) = &self.descriptor_file {
            let extra = TopicRegistry::from_json_file(path).map_err(|e| {
                Error::Config(format!("Failed to load {}: {}", path.display(), e))
            })?;
            info!("Loaded {} descriptors from {}", extra.len(), path.display());
            registry.extend(extra)?;
        }

        if registry.is_empty() {
            return Err(Error::Config("No topic descriptors configured".to_string()));
        }
        Ok(registry)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
