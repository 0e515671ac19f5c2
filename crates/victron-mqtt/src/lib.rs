//! Victron Venus OS MQTT Metrics Crate
//!
//! Turns the `N/<installation>/<device_type>/<device_id>/...` topic stream
//! published by Venus OS into typed, uniquely identified metrics.
//!
//! ## Architecture
//!
//! - **ParsedTopic**: identifiers and wildcard lookup keys of one topic
//! - **TopicRegistry**: canonical topic patterns mapped to descriptors
//! - **MetricHub**: create-or-update of metrics and devices per message
//! - **Metric**: value holder with formatting and a single update callback
//! - **CallbackContext**: hand-off of callbacks to the consumer's own context
//!
//! The MQTT transport is left to the host, which feeds `(topic, payload)`
//! pairs into [`MetricHub::process_message`].

pub mod builtin_topics;
pub mod config;
pub mod constants;
pub mod descriptor;
pub mod device;
pub mod dispatch;
pub mod enums;
pub mod error;
pub mod hub;
pub mod logging;
pub mod metric;
pub mod registry;
pub mod topic;
pub mod value;

pub use builtin_topics::builtin_registry;
pub use config::HubConfig;
pub use constants::{
    next_phase, DeviceType, MetricKind, MetricNature, MetricType, Phase, ValueType,
};
pub use descriptor::{DescriptorSpec, TopicDescriptor, TopicDescriptorBuilder};
pub use device::Device;
pub use dispatch::{callback_context, CallbackContext, CallbackRunner};
pub use enums::{
    lookup_enum, EnumInfo, EssMode, EvChargerMode, GenericOnOff, Hub4Mode, InverterMode,
    VictronEnum,
};
pub use error::{Error, Result};
pub use hub::{MetricHub, NewMetricCallback};
pub use logging::init_tracing;
pub use metric::{format_value, Metric, UpdateCallback, WriteRequest};
pub use registry::TopicRegistry;
pub use topic::ParsedTopic;
pub use value::{decode_payload, encode_payload, MetricValue};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
