//! Metric Hub - turns raw topic traffic into materialized metrics.
//!
//! The hub owns the descriptor registry, the metric and device maps, and the
//! callback context used to notify the host. The transport delivering
//! messages is the single writer; hosts read metrics concurrently.
//!
//! ## Message flow
//!
//! ```text
//! (topic, payload) -> decode -> parse -> registry lookup
//!                  -> attribute: stored on the Device
//!                  -> otherwise: create or update the Metric, notify on change
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::config::HubConfig;
use crate::constants::MetricKind;
use crate::descriptor::TopicDescriptor;
use crate::device::Device;
use crate::dispatch::CallbackContext;
use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::registry::TopicRegistry;
use crate::topic::ParsedTopic;
use crate::value::{decode_payload, MetricValue};

/// Callback invoked on the consumer's context when a metric is first seen.
pub type NewMetricCallback = Arc<dyn Fn(&Arc<Metric>) + Send + Sync>;

/// Registry of materialized metrics and devices.
pub struct MetricHub {
    registry: TopicRegistry,
    config: HubConfig,
    context: CallbackContext,
    metrics: DashMap<String, Arc<Metric>>,
    devices: DashMap<String, Arc<Device>>,
    on_new_metric: Mutex<Option<NewMetricCallback>>,
}

impl MetricHub {
    /// Create a hub over `registry` with default configuration.
    pub fn new(registry: TopicRegistry, context: CallbackContext) -> Self {
        Self::from_parts(registry, HubConfig::default(), context)
    }

    /// Create a hub whose registry is built from `config`.
    pub fn with_config(config: HubConfig, context: CallbackContext) -> Result<Self> {
        let registry = config.build_registry()?;
        Ok(Self::from_parts(registry, config, context))
    }

    pub fn from_parts(registry: TopicRegistry, config: HubConfig, context: CallbackContext) -> Self {
        debug!(
            "Metric hub ready: {} descriptors, installation filter {:?}",
            registry.len(),
            config.installation_id
        );
        Self {
            registry,
            config,
            context,
            metrics: DashMap::new(),
            devices: DashMap::new(),
            on_new_metric: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn context(&self) -> &CallbackContext {
        &self.context
    }

    /// Install the new-metric callback, replacing any previous one.
    pub fn set_on_new_metric<F>(&self, callback: F)
    where
        F: Fn(&Arc<Metric>) + Send + Sync + 'static,
    {
        *self.on_new_metric.lock() = Some(Arc::new(callback));
    }

    pub fn clear_on_new_metric(&self) {
        *self.on_new_metric.lock() = None;
    }

    /// Handle a raw MQTT message.
    ///
    /// Returns the affected metric, or `None` when the message was dropped,
    /// carried no value, or updated a device attribute.
    pub fn process_message(&self, topic: &str, payload: &[u8]) -> Option<Arc<Metric>> {
        match decode_payload(payload) {
            Ok(Some(value)) => self.process_value(topic, value),
            Ok(None) => {
                trace!("Empty payload on {}", topic);
                None
            }
            Err(e) => {
                warn!("Dropping message on {}: {}", topic, e);
                None
            }
        }
    }

    /// Handle an already decoded value.
    pub fn process_value(&self, topic: &str, value: MetricValue) -> Option<Arc<Metric>> {
        let Some(parsed) = ParsedTopic::parse(topic) else {
            trace!("Ignoring short topic {}", topic);
            return None;
        };
        if !self.config.accepts_installation(&parsed.installation_id) {
            trace!("Ignoring topic {} from another installation", topic);
            return None;
        }
        let descriptor = Arc::clone(self.registry.lookup(&parsed)?);

        let result = if descriptor.kind() == MetricKind::Attribute {
            self.update_attribute(&descriptor, &parsed, value).map(|_| None)
        } else {
            self.materialize(&descriptor, &parsed, topic, value).map(Some)
        };

        match result {
            Ok(metric) => metric,
            Err(e) => {
                error!("Failed to process {}: {}", topic, e);
                debug_assert!(
                    !matches!(e, Error::MissingPhase { .. }),
                    "descriptor {} uses a phase placeholder without a phase in the topic",
                    descriptor.topic()
                );
                None
            }
        }
    }

    /// Create the metric for `parsed`, or update it if it already exists.
    ///
    /// An existing metric keeps its identity; only its value changes.
    pub fn materialize(
        &self,
        descriptor: &Arc<TopicDescriptor>,
        parsed: &ParsedTopic,
        topic: &str,
        value: MetricValue,
    ) -> Result<Arc<Metric>> {
        let unique_id = parsed.unique_id(descriptor)?;

        let metric = match self.metrics.entry(unique_id) {
            Entry::Occupied(entry) => {
                let metric = Arc::clone(entry.get());
                drop(entry);
                metric.update(value, &self.context, self.config.notify_unchanged);
                return Ok(metric);
            }
            Entry::Vacant(entry) => {
                let metric = Arc::new(Metric::new(Arc::clone(descriptor), parsed, topic, value)?);
                entry.insert(Arc::clone(&metric));
                metric
            }
        };

        self.device_for(parsed).add_metric(metric.unique_id());
        self.notify_new_metric(&metric);
        Ok(metric)
    }

    fn update_attribute(
        &self,
        descriptor: &TopicDescriptor,
        parsed: &ParsedTopic,
        value: MetricValue,
    ) -> Result<()> {
        let short_id = parsed.short_id(descriptor)?;
        self.device_for(parsed).set_attribute(&short_id, value);
        Ok(())
    }

    fn device_for(&self, parsed: &ParsedTopic) -> Arc<Device> {
        let device = self
            .devices
            .entry(parsed.device_key())
            .or_insert_with(|| {
                debug!("New device: {}", parsed.device_key());
                Arc::new(Device::from_topic(parsed))
            });
        Arc::clone(device.value())
    }

    fn notify_new_metric(&self, metric: &Arc<Metric>) {
        let Some(callback) = self.on_new_metric.lock().clone() else {
            return;
        };
        let metric = Arc::clone(metric);
        self.context.submit(move || callback(&metric));
    }

    pub fn metric(&self, unique_id: &str) -> Option<Arc<Metric>> {
        self.metrics.get(unique_id).map(|m| Arc::clone(m.value()))
    }

    /// All metrics, ordered by unique id.
    pub fn metrics(&self) -> Vec<Arc<Metric>> {
        let mut metrics: Vec<_> = self.metrics.iter().map(|m| Arc::clone(m.value())).collect();
        metrics.sort_by(|a, b| a.unique_id().cmp(b.unique_id()));
        metrics
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    pub fn device(&self, key: &str) -> Option<Arc<Device>> {
        self.devices.get(key).map(|d| Arc::clone(d.value()))
    }

    /// All devices, ordered by key.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        let mut devices: Vec<_> = self.devices.iter().map(|d| Arc::clone(d.value())).collect();
        devices.sort_by(|a, b| a.key().cmp(b.key()));
        devices
    }

    /// Metrics of one device, in creation order.
    pub fn metrics_for_device(&self, key: &str) -> Vec<Arc<Metric>> {
        self.device(key)
            .map(|device| {
                device
                    .metric_ids()
                    .iter()
                    .filter_map(|id| self.metric(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MetricHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricHub")
            .field("descriptors", &self.registry.len())
            .field("metrics", &self.metrics.len())
            .field("devices", &self.devices.len())
            .field("context", &self.context)
            .finish()
    }
}
