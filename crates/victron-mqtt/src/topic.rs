//! Topic parsing and placeholder resolution.
//!
//! Topics look like `N/<installation_id>/<device_type>/<device_id>/.../<leaf>`,
//! optionally carrying an AC phase token (`L1`, `L2`, `L3`) somewhere after the
//! device id. Parsing yields the identifiers plus two registry lookup keys:
//!
//! ```text
//! N/123456789012/grid/30/Ac/L1/Energy/Forward
//!   with device type:    N/+/grid/+/Ac/+/Energy/Forward
//!   without device type: N/+/+/+/Ac/+/Energy/Forward
//! ```

use std::collections::HashMap;

use crate::constants::{
    DeviceType, Phase, PLACEHOLDER_NEXT_PHASE, PLACEHOLDER_PHASE, TOPIC_DELIMITER, TOPIC_WILDCARD,
};
use crate::descriptor::TopicDescriptor;
use crate::error::{Error, Result};

const MIN_SEGMENTS: usize = 4;
const INSTALLATION_INDEX: usize = 1;
const DEVICE_TYPE_INDEX: usize = 2;
const DEVICE_ID_INDEX: usize = 3;

/// Structured identifiers of a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub installation_id: String,
    pub device_id: String,
    pub device_type: DeviceType,
    /// Category token as found on the wire, with `platform` aliased to `system`
    pub native_device_type: String,
    pub phase: Option<Phase>,
    pub wildcards_with_device_type: String,
    pub wildcards_without_device_type: String,
}

impl ParsedTopic {
    /// Parse a raw topic. Returns `None` for topics with fewer than four segments.
    pub fn parse(topic: &str) -> Option<Self> {
        let parts: Vec<&str> = topic.split(TOPIC_DELIMITER).collect();
        if parts.len() < MIN_SEGMENTS {
            return None;
        }

        let mut wildcard_parts = parts.clone();

        let installation_id = parts[INSTALLATION_INDEX].to_string();
        wildcard_parts[INSTALLATION_INDEX] = TOPIC_WILDCARD;

        let native_device_type = match parts[DEVICE_TYPE_INDEX] {
            "platform" => "system",
            other => other,
        };
        let device_type = DeviceType::from_code(native_device_type);

        let device_id = parts[DEVICE_ID_INDEX].to_string();
        wildcard_parts[DEVICE_ID_INDEX] = TOPIC_WILDCARD;

        // first occurrence wins
        let phase = parts
            .iter()
            .enumerate()
            .skip(DEVICE_ID_INDEX + 1)
            .find_map(|(i, part)| Phase::from_token(part).map(|p| (i, p)));
        if let Some((index, _)) = phase {
            wildcard_parts[index] = TOPIC_WILDCARD;
        }

        let wildcards_with_device_type = wildcard_parts.join("/");
        wildcard_parts[DEVICE_TYPE_INDEX] = TOPIC_WILDCARD;
        let wildcards_without_device_type = wildcard_parts.join("/");

        Some(Self {
            installation_id,
            device_id,
            device_type,
            native_device_type: native_device_type.to_string(),
            phase: phase.map(|(_, p)| p),
            wildcards_with_device_type,
            wildcards_without_device_type,
        })
    }

    /// Key identifying the device this topic belongs to.
    pub fn device_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.installation_id, self.native_device_type, self.device_id
        )
    }

    /// Resolved short id of `desc` for this topic.
    pub fn short_id(&self, desc: &TopicDescriptor) -> Result<String> {
        self.resolve(desc.short_id())
    }

    /// Resolved display name of `desc`. Falls back to the short id for attributes.
    pub fn name(&self, desc: &TopicDescriptor) -> Result<String> {
        match desc.name() {
            Some(name) => self.resolve(name),
            None => self.short_id(desc),
        }
    }

    /// Unique id of the metric `desc` materializes from this topic.
    pub fn unique_id(&self, desc: &TopicDescriptor) -> Result<String> {
        Ok(format!("{}_{}", self.device_key(), self.short_id(desc)?))
    }

    /// Substitutions applied to the short id template, keyed by placeholder name.
    pub fn key_values(&self, desc: &TopicDescriptor) -> Result<HashMap<String, String>> {
        let template = desc.short_id();
        let mut result = HashMap::new();

        if template.contains(PLACEHOLDER_PHASE) {
            let phase = self.require_phase(template)?;
            result.insert(placeholder_key(PLACEHOLDER_PHASE), phase.to_string());
        }
        if template.contains(PLACEHOLDER_NEXT_PHASE) {
            let phase = self.require_phase(template)?;
            result.insert(placeholder_key(PLACEHOLDER_NEXT_PHASE), phase.next().to_string());
        }

        Ok(result)
    }

    /// Replace phase placeholders in `template`.
    pub fn resolve(&self, template: &str) -> Result<String> {
        let mut resolved = template.to_string();

        if resolved.contains(PLACEHOLDER_PHASE) {
            let phase = self.require_phase(template)?;
            resolved = resolved.replace(PLACEHOLDER_PHASE, phase.as_str());
        }
        if resolved.contains(PLACEHOLDER_NEXT_PHASE) {
            let phase = self.require_phase(template)?;
            resolved = resolved.replace(PLACEHOLDER_NEXT_PHASE, phase.next().as_str());
        }

        Ok(resolved)
    }

    fn require_phase(&self, template: &str) -> Result<Phase> {
        self.phase.ok_or_else(|| Error::MissingPhase {
            template: template.to_string(),
        })
    }
}

fn placeholder_key(placeholder: &str) -> String {
    placeholder.trim_matches(|c| c == '{' || c == '}').to_string()
}
