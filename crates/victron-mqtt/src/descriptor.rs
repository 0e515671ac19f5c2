//! Topic descriptors: how a matching topic is classified, formatted and labelled.
//!
//! Descriptors are immutable once built. Both invariants are enforced by
//! [`TopicDescriptorBuilder::build`]:
//! - a display name is required unless the kind is [`MetricKind::Attribute`];
//! - precision is cleared for string and enum value types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DeviceType, MetricKind, MetricNature, MetricType, ValueType};
use crate::enums::{lookup_enum, EnumInfo, VictronEnum};
use crate::error::{Error, Result};

/// Precision applied when a descriptor does not specify one.
pub const DEFAULT_PRECISION: u32 = 2;

/// Describes a topic pattern, how to map it and how to present its value.
#[derive(Clone, PartialEq)]
pub struct TopicDescriptor {
    topic: String,
    kind: MetricKind,
    short_id: String,
    name: Option<String>,
    unit: Option<String>,
    metric_type: MetricType,
    metric_nature: MetricNature,
    device_type: DeviceType,
    value_type: Option<ValueType>,
    precision: Option<u32>,
    enum_info: Option<&'static EnumInfo>,
    min: Option<f64>,
    max: Option<f64>,
}

impl TopicDescriptor {
    /// Start building a descriptor.
    pub fn builder(
        topic: impl Into<String>,
        kind: MetricKind,
        short_id: impl Into<String>,
    ) -> TopicDescriptorBuilder {
        TopicDescriptorBuilder::new(topic, kind, short_id)
    }

    /// Topic pattern as authored.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Short id template, may contain phase placeholders.
    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    /// Display-name template, may contain phase placeholders.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn metric_nature(&self) -> MetricNature {
        self.metric_nature
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    pub fn enum_info(&self) -> Option<&'static EnumInfo> {
        self.enum_info
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

impl fmt::Debug for TopicDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicDescriptor")
            .field("topic", &self.topic)
            .field("kind", &self.kind)
            .field("short_id", &self.short_id)
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("metric_type", &self.metric_type)
            .field("metric_nature", &self.metric_nature)
            .field("device_type", &self.device_type)
            .field("value_type", &self.value_type)
            .field("precision", &self.precision)
            .field("enum", &self.enum_info)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

/// Builder for [`TopicDescriptor`].
pub struct TopicDescriptorBuilder {
    inner: TopicDescriptor,
}

impl TopicDescriptorBuilder {
    pub fn new(topic: impl Into<String>, kind: MetricKind, short_id: impl Into<String>) -> Self {
        Self {
            inner: TopicDescriptor {
                topic: topic.into(),
                kind,
                short_id: short_id.into(),
                name: None,
                unit: None,
                metric_type: MetricType::None,
                metric_nature: MetricNature::None,
                device_type: DeviceType::Unknown,
                value_type: None,
                precision: Some(DEFAULT_PRECISION),
                enum_info: None,
                min: None,
                max: None,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = Some(name.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.inner.unit = Some(unit.into());
        self
    }

    pub fn metric_type(mut self, metric_type: MetricType) -> Self {
        self.inner.metric_type = metric_type;
        self
    }

    pub fn metric_nature(mut self, metric_nature: MetricNature) -> Self {
        self.inner.metric_nature = metric_nature;
        self
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.inner.device_type = device_type;
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.inner.value_type = Some(value_type);
        self
    }

    /// `None` disables numeric formatting.
    pub fn precision(mut self, precision: Option<u32>) -> Self {
        self.inner.precision = precision;
        self
    }

    /// Attach an enumerated type and mark the value type as enum.
    pub fn enumeration<E: VictronEnum>(self) -> Self {
        self.enum_info(E::INFO)
    }

    pub fn enum_info(mut self, info: &'static EnumInfo) -> Self {
        self.inner.enum_info = Some(info);
        self.inner.value_type = Some(ValueType::Enum);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.inner.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.inner.max = Some(max);
        self
    }

    /// Validate the invariants and produce the descriptor.
    pub fn build(self) -> Result<TopicDescriptor> {
        let mut desc = self.inner;
        let invalid = |reason: &str| Error::InvalidDescriptor {
            topic: desc.topic.clone(),
            reason: reason.to_string(),
        };

        if desc.short_id.is_empty() {
            return Err(invalid("short id must not be empty"));
        }
        if desc.kind != MetricKind::Attribute && desc.name.is_none() {
            return Err(invalid("name must be set unless kind is attribute"));
        }
        if let (Some(min), Some(max)) = (desc.min, desc.max) {
            if min > max {
                return Err(invalid("min is greater than max"));
            }
        }
        if desc.value_type == Some(ValueType::Enum) && desc.enum_info.is_none() {
            return Err(invalid("enum value type requires an enumerated type"));
        }

        if desc.value_type.is_some_and(|vt| vt.is_textual()) {
            desc.precision = None;
        }

        Ok(desc)
    }
}

fn default_precision() -> Option<u32> {
    Some(DEFAULT_PRECISION)
}

/// Serialized form of a descriptor, as found in JSON descriptor tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSpec {
    pub topic: String,
    #[serde(alias = "message_type")]
    pub kind: MetricKind,
    pub short_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "unit_of_measurement")]
    pub unit: Option<String>,
    #[serde(default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub metric_nature: MetricNature,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub value_type: Option<ValueType>,
    #[serde(default = "default_precision")]
    pub precision: Option<u32>,
    /// Name of the enumerated type, see [`crate::enums::lookup_enum`]
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl TryFrom<DescriptorSpec> for TopicDescriptor {
    type Error = Error;

    fn try_from(spec: DescriptorSpec) -> Result<Self> {
        let mut builder = TopicDescriptor::builder(spec.topic, spec.kind, spec.short_id)
            .metric_type(spec.metric_type)
            .metric_nature(spec.metric_nature)
            .device_type(spec.device_type)
            .precision(spec.precision);

        if let Some(name) = spec.name {
            builder = builder.name(name);
        }
        if let Some(unit) = spec.unit {
            builder = builder.unit(unit);
        }
        if let Some(value_type) = spec.value_type {
            builder = builder.value_type(value_type);
        }
        if let Some(enum_name) = spec.enum_name {
            builder = builder.enum_info(lookup_enum(&enum_name)?);
        }
        if let Some(min) = spec.min {
            builder = builder.min(min);
        }
        if let Some(max) = spec.max {
            builder = builder.max(max);
        }

        builder.build()
    }
}
