//! Devices group the metrics and attributes published under one
//! `<installation>/<device_type>/<device_id>` prefix.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::constants::DeviceType;
use crate::topic::ParsedTopic;
use crate::value::MetricValue;

const CUSTOM_NAME: &str = "custom_name";
const PRODUCT_NAME: &str = "product_name";

/// A device discovered from topic traffic.
#[derive(Debug)]
pub struct Device {
    key: String,
    installation_id: String,
    native_device_type: String,
    device_type: DeviceType,
    device_id: String,
    attributes: RwLock<HashMap<String, MetricValue>>,
    metric_ids: RwLock<Vec<String>>,
}

impl Device {
    pub(crate) fn from_topic(parsed: &ParsedTopic) -> Self {
        Self {
            key: parsed.device_key(),
            installation_id: parsed.installation_id.clone(),
            native_device_type: parsed.native_device_type.clone(),
            device_type: parsed.device_type,
            device_id: parsed.device_id.clone(),
            attributes: RwLock::new(HashMap::new()),
            metric_ids: RwLock::new(Vec::new()),
        }
    }

    /// `<installation>_<device_type>_<device_id>`, the prefix of every metric id.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    /// Device type token as published, e.g. `grid` or `vebus`.
    pub fn native_device_type(&self) -> &str {
        &self.native_device_type
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Custom name if set, else product name, else `<device_type> <device_id>`.
    pub fn display_name(&self) -> String {
        let attributes = self.attributes.read();
        [CUSTOM_NAME, PRODUCT_NAME]
            .iter()
            .filter_map(|key| attributes.get(*key))
            .map(ToString::to_string)
            .find(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{} {}", self.native_device_type, self.device_id))
    }

    pub fn attribute(&self, short_id: &str) -> Option<MetricValue> {
        self.attributes.read().get(short_id).cloned()
    }

    pub fn attributes(&self) -> HashMap<String, MetricValue> {
        self.attributes.read().clone()
    }

    /// Store an attribute value. Returns whether it changed.
    pub(crate) fn set_attribute(&self, short_id: &str, value: MetricValue) -> bool {
        let mut attributes = self.attributes.write();
        if attributes.get(short_id) == Some(&value) {
            return false;
        }
        debug!("Device {} attribute {} = {}", self.key, short_id, value);
        attributes.insert(short_id.to_string(), value);
        true
    }

    /// Unique ids of the metrics materialized for this device, in creation order.
    pub fn metric_ids(&self) -> Vec<String> {
        self.metric_ids.read().clone()
    }

    pub(crate) fn add_metric(&self, unique_id: &str) {
        let mut ids = self.metric_ids.write();
        if !ids.iter().any(|id| id == unique_id) {
            ids.push(unique_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        let parsed = ParsedTopic::parse("N/abc/vebus/276/Mode").unwrap();
        Device::from_topic(&parsed)
    }

    #[test]
    fn test_identity() {
        let device = device();
        assert_eq!(device.key(), "abc_vebus_276");
        assert_eq!(device.device_type(), DeviceType::Vebus);
        assert_eq!(device.device_id(), "276");
        assert_eq!(device.display_name(), "vebus 276");
    }

    #[test]
    fn test_attributes() {
        let device = device();
        assert!(device.set_attribute(PRODUCT_NAME, "MultiPlus-II".into()));
        assert!(!device.set_attribute(PRODUCT_NAME, "MultiPlus-II".into()));
        assert_eq!(device.display_name(), "MultiPlus-II");

        device.set_attribute(CUSTOM_NAME, "Garage".into());
        assert_eq!(device.display_name(), "Garage");
        assert_eq!(device.attributes().len(), 2);
    }

    #[test]
    fn test_metric_ids_dedup() {
        let device = device();
        device.add_metric("a");
        device.add_metric("b");
        device.add_metric("a");
        assert_eq!(device.metric_ids(), vec!["a".to_string(), "b".to_string()]);
    }
}
