//! Metrics: the stateful value holders exposed to the host application.
//!
//! A metric is created once per unique id and mutated in place afterwards, so
//! every `Arc<Metric>` a host holds observes later values. Reads may race with
//! an in-flight update and see the last fully written value.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DeviceType, MetricKind, MetricNature, MetricType, Phase, TOPIC_DELIMITER,
};
use crate::descriptor::TopicDescriptor;
use crate::dispatch::CallbackContext;
use crate::error::{Error, Result};
use crate::topic::ParsedTopic;
use crate::value::{encode_payload, MetricValue};

/// Callback invoked on the consumer's context after a value change.
pub type UpdateCallback = Arc<dyn Fn(&Arc<Metric>) + Send + Sync>;

/// Topic and payload that set a writable metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub topic: String,
    pub payload: Vec<u8>,
}

struct MetricState {
    value: MetricValue,
    last_updated: DateTime<Utc>,
}

/// A materialized metric.
pub struct Metric {
    unique_id: String,
    short_id: String,
    name: String,
    topic: String,
    installation_id: String,
    device_id: String,
    device_type: DeviceType,
    phase: Option<Phase>,
    key_values: HashMap<String, String>,
    descriptor: Arc<TopicDescriptor>,
    state: RwLock<MetricState>,
    on_update: Mutex<Option<UpdateCallback>>,
}

impl Metric {
    pub(crate) fn new(
        descriptor: Arc<TopicDescriptor>,
        parsed: &ParsedTopic,
        topic: &str,
        value: MetricValue,
    ) -> Result<Self> {
        let unique_id = parsed.unique_id(&descriptor)?;
        debug!(
            "Creating new metric: unique_id={}, type={:?}, nature={:?}",
            unique_id,
            descriptor.metric_type(),
            descriptor.metric_nature()
        );

        Ok(Self {
            short_id: parsed.short_id(&descriptor)?,
            name: parsed.name(&descriptor)?,
            key_values: parsed.key_values(&descriptor)?,
            unique_id,
            topic: topic.to_string(),
            installation_id: parsed.installation_id.clone(),
            device_id: parsed.device_id.clone(),
            device_type: parsed.device_type,
            phase: parsed.phase,
            descriptor,
            state: RwLock::new(MetricState {
                value,
                last_updated: Utc::now(),
            }),
            on_update: Mutex::new(None),
        })
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Short id with placeholders resolved.
    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    /// Short id template shared by all phases of this metric.
    pub fn generic_short_id(&self) -> &str {
        self.descriptor.short_id()
    }

    /// Display name with placeholders resolved.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topic the metric was first seen on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// AC phase this metric refers to, `None` if not phase specific.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Resolved placeholder substitutions, e.g. `{"phase": "L2"}`.
    pub fn key_values(&self) -> &HashMap<String, String> {
        &self.key_values
    }

    pub fn descriptor(&self) -> &Arc<TopicDescriptor> {
        &self.descriptor
    }

    pub fn metric_kind(&self) -> MetricKind {
        self.descriptor.kind()
    }

    pub fn metric_type(&self) -> MetricType {
        self.descriptor.metric_type()
    }

    pub fn metric_nature(&self) -> MetricNature {
        self.descriptor.metric_nature()
    }

    /// Device category of the topic, which may be more specific than the descriptor's.
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn unit_of_measurement(&self) -> Option<&str> {
        self.descriptor.unit()
    }

    pub fn precision(&self) -> Option<u32> {
        self.descriptor.precision()
    }

    pub fn min_value(&self) -> Option<f64> {
        self.descriptor.min()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.descriptor.max()
    }

    pub fn is_writable(&self) -> bool {
        self.descriptor.kind().is_writable()
    }

    /// Current raw value.
    pub fn value(&self) -> MetricValue {
        self.state.read().value.clone()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.state.read().last_updated
    }

    /// Value rendered with the descriptor's precision and unit.
    pub fn formatted_value(&self) -> String {
        format_value(
            &self.state.read().value,
            self.descriptor.precision(),
            self.descriptor.unit(),
        )
    }

    /// All labels of the enumerated type, in declaration order.
    pub fn enum_values(&self) -> Option<Vec<&'static str>> {
        self.descriptor.enum_info().map(|info| info.labels())
    }

    /// Label of the current value for enum metrics.
    pub fn enum_label(&self) -> Option<&'static str> {
        let info = self.descriptor.enum_info()?;
        let code = self.state.read().value.as_i64()?;
        info.label_for(code)
    }

    pub fn on_update(&self) -> Option<UpdateCallback> {
        self.on_update.lock().clone()
    }

    /// Install the update callback, replacing any previous one.
    pub fn set_on_update<F>(&self, callback: F)
    where
        F: Fn(&Arc<Metric>) + Send + Sync + 'static,
    {
        *self.on_update.lock() = Some(Arc::new(callback));
    }

    pub fn clear_on_update(&self) {
        *self.on_update.lock() = None;
    }

    /// Store `value` and schedule the callback if it changed.
    ///
    /// Returns whether the value changed. With `notify_unchanged` the callback
    /// is scheduled even for no-op updates.
    pub(crate) fn update(
        self: &Arc<Self>,
        value: MetricValue,
        context: &CallbackContext,
        notify_unchanged: bool,
    ) -> bool {
        let changed = {
            let mut state = self.state.write();
            let changed = state.value != value;
            if changed {
                debug!(
                    "Metric {} value changed: {} -> {} {}",
                    self.unique_id,
                    state.value,
                    value,
                    self.descriptor.unit().unwrap_or_default()
                );
                state.value = value;
            }
            state.last_updated = Utc::now();
            changed
        };

        if changed || notify_unchanged {
            self.notify(context);
        }
        changed
    }

    fn notify(self: &Arc<Self>, context: &CallbackContext) {
        let Some(callback) = self.on_update() else {
            return;
        };
        let metric = Arc::clone(self);
        context.submit(move || callback(&metric));
    }

    /// Build the request that sets this metric to `value`.
    ///
    /// Enum metrics accept a code or a label. Numeric values are checked
    /// against min/max. Publishing the request is up to the caller.
    pub fn write_request(&self, value: impl Into<MetricValue>) -> Result<WriteRequest> {
        let value = value.into();
        let invalid = |reason: String| Error::InvalidValue {
            metric: self.unique_id.clone(),
            reason,
        };

        if !self.is_writable() {
            return Err(invalid("metric is read-only".to_string()));
        }

        let value = match self.descriptor.enum_info() {
            Some(info) => {
                let code = match &value {
                    MetricValue::String(label) => info.code_for(label),
                    other => other.as_i64().filter(|code| info.contains(*code)),
                };
                let code = code.ok_or_else(|| {
                    invalid(format!("{} is not a valid {}", value, info.name))
                })?;
                MetricValue::Integer(code)
            }
            None => {
                if let Some(v) = value.as_f64() {
                    if self.descriptor.min().is_some_and(|min| v < min)
                        || self.descriptor.max().is_some_and(|max| v > max)
                    {
                        return Err(invalid(format!("{} is out of range", v)));
                    }
                }
                value
            }
        };

        Ok(WriteRequest {
            topic: write_topic(&self.topic),
            payload: encode_payload(&value),
        })
    }
}

/// Render a value with fixed precision and optional unit.
///
/// Falls back to the plain string form when the value is not numeric or no
/// precision applies; an absent value renders as an empty string.
pub fn format_value(value: &MetricValue, precision: Option<u32>, unit: Option<&str>) -> String {
    if value.is_null() {
        return String::new();
    }
    match (value.as_f64(), precision) {
        (Some(v), Some(precision)) => {
            let precision = precision as usize;
            match unit {
                Some(unit) => format!("{:.*} {}", precision, v, unit),
                None => format!("{:.*}", precision, v),
            }
        }
        _ => value.to_string(),
    }
}

/// Map a notification topic to its write topic (`N/...` -> `W/...`).
fn write_topic(topic: &str) -> String {
    match topic.split_once(TOPIC_DELIMITER) {
        Some((_, rest)) => format!("W{}{}", TOPIC_DELIMITER, rest),
        None => topic.to_string(),
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted_value())
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("unique_id", &self.unique_id)
            .field("descriptor", &self.descriptor)
            .field("value", &self.state.read().value)
            .field("generic_short_id", &self.generic_short_id())
            .field("phase", &self.phase)
            .field("device_type", &self.device_type)
            .field("short_id", &self.short_id)
            .field("name", &self.name)
            .field("key_values", &self.key_values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::callback_context;
    use crate::enums::GenericOnOff;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn energy_metric() -> Arc<Metric> {
        let desc = TopicDescriptor::builder(
            "N/+/grid/+/Ac/+/Energy/Forward",
            MetricKind::Sensor,
            "grid_energy_forward_{phase}",
        )
        .name("Grid consumption on {phase}")
        .unit("kWh")
        .precision(Some(2))
        .build()
        .unwrap();
        let topic = "N/123456789012/grid/30/Ac/L1/Energy/Forward";
        let parsed = ParsedTopic::parse(topic).unwrap();
        Arc::new(Metric::new(Arc::new(desc), &parsed, topic, MetricValue::Float(12.3456)).unwrap())
    }

    fn switch_metric() -> Arc<Metric> {
        let desc = TopicDescriptor::builder(
            "N/+/settings/0/Settings/CGwacs/PreventFeedback",
            MetricKind::Switch,
            "ess_prevent_feedback",
        )
        .name("Prevent feedback")
        .enumeration::<GenericOnOff>()
        .build()
        .unwrap();
        let topic = "N/abc/settings/0/Settings/CGwacs/PreventFeedback";
        let parsed = ParsedTopic::parse(topic).unwrap();
        Arc::new(Metric::new(Arc::new(desc), &parsed, topic, MetricValue::Integer(0)).unwrap())
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&MetricValue::Float(230.456), Some(1), Some("W")), "230.5 W");
        assert_eq!(format_value(&MetricValue::Float(230.456), Some(0), None), "230");
        assert_eq!(format_value(&MetricValue::from("12.5"), Some(2), Some("V")), "12.50 V");
        assert_eq!(format_value(&MetricValue::from("Bulk"), Some(2), Some("V")), "Bulk");
        assert_eq!(format_value(&MetricValue::Null, Some(2), Some("V")), "");
        assert_eq!(format_value(&MetricValue::Integer(3), None, None), "3");
    }

    #[test]
    fn test_metric_projection() {
        let metric = energy_metric();
        assert_eq!(metric.unique_id(), "123456789012_grid_30_grid_energy_forward_L1");
        assert_eq!(metric.short_id(), "grid_energy_forward_L1");
        assert_eq!(metric.generic_short_id(), "grid_energy_forward_{phase}");
        assert_eq!(metric.name(), "Grid consumption on L1");
        assert_eq!(metric.phase(), Some(Phase::L1));
        assert_eq!(metric.key_values().get("phase").map(String::as_str), Some("L1"));
        assert_eq!(metric.formatted_value(), "12.35 kWh");
        assert_eq!(metric.to_string(), "12.35 kWh");
        assert_eq!(metric.enum_values(), None);
        assert!(!metric.is_writable());
    }

    #[test]
    fn test_callback_fires_only_on_change() {
        let metric = energy_metric();
        let (context, mut runner) = callback_context();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        metric.set_on_update(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!metric.update(MetricValue::Float(12.3456), &context, false));
        assert_eq!(runner.run_pending(), 0);

        assert!(metric.update(MetricValue::Float(13.0), &context, false));
        assert_eq!(runner.run_pending(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metric.value(), MetricValue::Float(13.0));
    }

    #[test]
    fn test_notify_unchanged() {
        let metric = energy_metric();
        let (context, mut runner) = callback_context();
        metric.set_on_update(|_| {});
        metric.update(MetricValue::Float(12.3456), &context, true);
        assert_eq!(runner.run_pending(), 1);
    }

    #[test]
    fn test_callback_replaced_not_added() {
        let metric = energy_metric();
        let (context, mut runner) = callback_context();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = first.clone();
        metric.set_on_update(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        let s = second.clone();
        metric.set_on_update(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        metric.update(MetricValue::Float(1.0), &context, false);
        runner.run_pending();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        metric.clear_on_update();
        metric.update(MetricValue::Float(2.0), &context, false);
        assert_eq!(runner.run_pending(), 0);
    }

    #[test]
    fn test_callback_receives_updated_metric() {
        let metric = energy_metric();
        let (context, mut runner) = callback_context();
        let seen = Arc::new(Mutex::new(String::new()));
        let s = seen.clone();
        metric.set_on_update(move |m| {
            *s.lock() = m.formatted_value();
        });

        metric.update(MetricValue::Float(20.0), &context, false);
        runner.run_pending();
        assert_eq!(*seen.lock(), "20.00 kWh");
    }

    #[test]
    fn test_inactive_context_skips_callback() {
        let metric = energy_metric();
        let context = CallbackContext::detached();
        metric.set_on_update(|_| panic!("must not run"));
        assert!(metric.update(MetricValue::Float(99.0), &context, false));
        assert_eq!(metric.value(), MetricValue::Float(99.0));
    }

    #[test]
    fn test_enum_metric() {
        let metric = switch_metric();
        assert_eq!(metric.enum_values(), Some(vec!["Off", "On"]));
        assert_eq!(metric.enum_label(), Some("Off"));
        assert_eq!(metric.formatted_value(), "0");
        assert!(metric.is_writable());
    }

    #[test]
    fn test_write_request() {
        let metric = switch_metric();
        let request = metric.write_request(1i64).unwrap();
        assert_eq!(request.topic, "W/abc/settings/0/Settings/CGwacs/PreventFeedback");
        assert_eq!(request.payload, br#"{"value":1}"#.to_vec());

        let request = metric.write_request("On").unwrap();
        assert_eq!(request.payload, br#"{"value":1}"#.to_vec());

        assert!(matches!(metric.write_request(7i64), Err(Error::InvalidValue { .. })));
        assert!(energy_metric().write_request(1.0f64).is_err());
    }

    #[test]
    fn test_write_request_range() {
        let desc = TopicDescriptor::builder(
            "N/+/settings/0/Settings/Ess/MinimumSocLimit",
            MetricKind::Number,
            "ess_minimum_soc_limit",
        )
        .name("Minimum SOC")
        .min(0.0)
        .max(100.0)
        .build()
        .unwrap();
        let topic = "N/abc/settings/0/Settings/Ess/MinimumSocLimit";
        let parsed = ParsedTopic::parse(topic).unwrap();
        let metric = Metric::new(Arc::new(desc), &parsed, topic, MetricValue::Integer(10)).unwrap();

        assert!(metric.write_request(50i64).is_ok());
        assert!(metric.write_request(101i64).is_err());
        assert!(metric.write_request(-1i64).is_err());
    }
}
