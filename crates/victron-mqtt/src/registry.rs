//! Descriptor Registry - canonical topic patterns mapped to descriptors.
//!
//! Keys are canonicalised through the topic parser when the registry is built,
//! so authored patterns may use concrete ids (`N/+/settings/0/...`) or `+`.
//! A key whose device-type segment is `+` matches any device type.
//!
//! ## Matching
//!
//! Lookups try the key that keeps the device type first, then the key with
//! the device type wildcarded. A device-type specific entry therefore always
//! wins over a generic one for the same topic.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::descriptor::{DescriptorSpec, TopicDescriptor};
use crate::error::{Error, Result};
use crate::topic::ParsedTopic;

/// Immutable mapping from canonical topic patterns to descriptors.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    entries: HashMap<String, Arc<TopicDescriptor>>,
}

impl TopicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, rejecting keys that collide.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = TopicDescriptor>,
    {
        let mut registry = Self::new();
        for desc in descriptors {
            registry.insert(desc)?;
        }
        debug!("Built topic registry with {} descriptors", registry.len());
        Ok(registry)
    }

    /// Build a registry from a JSON array of descriptor specs.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let specs: Vec<DescriptorSpec> = serde_json::from_str(json)?;
        let descriptors = specs
            .into_iter()
            .map(TopicDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_descriptors(descriptors)
    }

    /// Build a registry from a JSON descriptor table on disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Merge another registry into this one, rejecting collisions.
    pub fn extend(&mut self, other: TopicRegistry) -> Result<()> {
        for (key, desc) in other.entries {
            if self.entries.contains_key(&key) {
                return Err(Error::DuplicateTopic(key));
            }
            self.entries.insert(key, desc);
        }
        Ok(())
    }

    fn insert(&mut self, desc: TopicDescriptor) -> Result<()> {
        let key = canonical_key(desc.topic()).ok_or_else(|| Error::InvalidDescriptor {
            topic: desc.topic().to_string(),
            reason: "topic pattern needs at least four segments".to_string(),
        })?;
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateTopic(key));
        }
        self.entries.insert(key, Arc::new(desc));
        Ok(())
    }

    /// Find the descriptor for a parsed topic, device-type specific key first.
    pub fn lookup(&self, parsed: &ParsedTopic) -> Option<&Arc<TopicDescriptor>> {
        let found = self
            .entries
            .get(&parsed.wildcards_with_device_type)
            .or_else(|| self.entries.get(&parsed.wildcards_without_device_type));
        if found.is_none() {
            trace!("No descriptor for {}", parsed.wildcards_with_device_type);
        }
        found
    }

    /// Parse a raw topic and find its descriptor.
    pub fn resolve(&self, topic: &str) -> Option<(ParsedTopic, Arc<TopicDescriptor>)> {
        let parsed = ParsedTopic::parse(topic)?;
        let desc = self.lookup(&parsed)?.clone();
        Some((parsed, desc))
    }

    /// Descriptor registered under `pattern`, which is canonicalised first.
    pub fn get(&self, pattern: &str) -> Option<&Arc<TopicDescriptor>> {
        self.entries.get(&canonical_key(pattern)?)
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.get(pattern).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TopicDescriptor>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// MQTT subscription filters covering every registered pattern, sorted.
    pub fn subscription_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.entries.keys().cloned().collect();
        topics.sort();
        topics
    }
}

/// Canonical registry key of a topic pattern.
///
/// If the pattern's device-type segment is `+`, both wildcard forms are the
/// same string, so the device-type preserving form is always the key.
pub fn canonical_key(pattern: &str) -> Option<String> {
    ParsedTopic::parse(pattern).map(|parsed| parsed.wildcards_with_device_type)
}
