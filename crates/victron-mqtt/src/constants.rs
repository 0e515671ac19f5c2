//! Closed classification sets shared by descriptors, topics and metrics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Placeholder for the phase carried by the topic.
pub const PLACEHOLDER_PHASE: &str = "{phase}";

/// Placeholder for the phase following the topic's phase in rotation.
pub const PLACEHOLDER_NEXT_PHASE: &str = "{next_phase}";

/// Positional wildcard used in registry keys.
pub const TOPIC_WILDCARD: &str = "+";

/// Path delimiter of the topic namespace.
pub const TOPIC_DELIMITER: char = '/';

/// How a metric is presented and whether it can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Device attribute (serial number, product name, ...), not a metric
    Attribute,
    Sensor,
    BinarySensor,
    Switch,
    Number,
    Select,
    Button,
}

impl MetricKind {
    /// Whether metrics of this kind accept values from the host.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Switch | Self::Number | Self::Select | Self::Button)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Attribute => "attribute",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Switch => "switch",
            Self::Number => "number",
            Self::Select => "select",
            Self::Button => "button",
        };
        f.write_str(s)
    }
}

/// Physical quantity measured by a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[default]
    None,
    Power,
    ApparentPower,
    Energy,
    Voltage,
    Current,
    Frequency,
    Percentage,
    Temperature,
    Speed,
    LiquidVolume,
    Duration,
    Time,
}

/// Whether a metric is a point-in-time reading or an accumulating counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricNature {
    #[default]
    None,
    Instantaneous,
    Cumulative,
}

/// Declared value type of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Int,
    Float,
    String,
    Enum,
    Boolean,
    Epoch,
}

impl ValueType {
    /// Numeric precision has no meaning for these value types.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Enum)
    }
}

/// Device category, derived from the second topic segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Unknown,
    System,
    Settings,
    Grid,
    Battery,
    Solarcharger,
    Vebus,
    Inverter,
    Pvinverter,
    Evcharger,
    Temperature,
    Tank,
    Multi,
    Generator,
    Acload,
    Heatpump,
}

impl DeviceType {
    /// Classify a raw category token. Unrecognised tokens map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "system" => Self::System,
            "settings" => Self::Settings,
            "grid" => Self::Grid,
            "battery" => Self::Battery,
            "solarcharger" => Self::Solarcharger,
            "vebus" => Self::Vebus,
            "inverter" => Self::Inverter,
            "pvinverter" => Self::Pvinverter,
            "evcharger" => Self::Evcharger,
            "temperature" => Self::Temperature,
            "tank" => Self::Tank,
            "multi" => Self::Multi,
            "generator" => Self::Generator,
            "acload" => Self::Acload,
            "heatpump" => Self::Heatpump,
            _ => Self::Unknown,
        }
    }

    /// Wire code of this category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::System => "system",
            Self::Settings => "settings",
            Self::Grid => "grid",
            Self::Battery => "battery",
            Self::Solarcharger => "solarcharger",
            Self::Vebus => "vebus",
            Self::Inverter => "inverter",
            Self::Pvinverter => "pvinverter",
            Self::Evcharger => "evcharger",
            Self::Temperature => "temperature",
            Self::Tank => "tank",
            Self::Multi => "multi",
            Self::Generator => "generator",
            Self::Acload => "acload",
            Self::Heatpump => "heatpump",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One line of a three-phase AC system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    /// All phases in rotation order.
    pub const ALL: [Phase; 3] = [Phase::L1, Phase::L2, Phase::L3];

    /// Topic token of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        }
    }

    /// Next phase in rotation (L1 -> L2 -> L3 -> L1).
    pub fn next(&self) -> Phase {
        match self {
            Self::L1 => Self::L2,
            Self::L2 => Self::L3,
            Self::L3 => Self::L1,
        }
    }

    /// Match a topic segment against the phase tokens.
    pub fn from_token(token: &str) -> Option<Phase> {
        match token {
            "L1" => Some(Self::L1),
            "L2" => Some(Self::L2),
            "L3" => Some(Self::L3),
            _ => None,
        }
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_token(s).ok_or_else(|| Error::InvalidPhase(s.to_string()))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotate a phase token, rejecting anything that is not L1, L2 or L3.
pub fn next_phase(phase: &str) -> Result<&'static str> {
    Ok(phase.parse::<Phase>()?.next().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_rotation() {
        assert_eq!(next_phase("L1").unwrap(), "L2");
        assert_eq!(next_phase("L2").unwrap(), "L3");
        assert_eq!(next_phase("L3").unwrap(), "L1");
        for phase in Phase::ALL {
            assert_eq!(phase.next().next().next(), phase);
        }
    }

    #[test]
    fn test_phase_rejects_other_tokens() {
        assert!(matches!(next_phase("L4"), Err(Error::InvalidPhase(p)) if p == "L4"));
        assert!(next_phase("l1").is_err());
        assert!(next_phase("").is_err());
    }

    #[test]
    fn test_device_type_from_code() {
        assert_eq!(DeviceType::from_code("grid"), DeviceType::Grid);
        assert_eq!(DeviceType::from_code("vebus"), DeviceType::Vebus);
        assert_eq!(DeviceType::from_code("toaster"), DeviceType::Unknown);
        assert_eq!(DeviceType::Solarcharger.to_string(), "solarcharger");
    }

    #[test]
    fn test_metric_kind_serde_names() {
        let kind: MetricKind = serde_json::from_str("\"binary_sensor\"").unwrap();
        assert_eq!(kind, MetricKind::BinarySensor);
        assert_eq!(serde_json::to_string(&MetricType::LiquidVolume).unwrap(), "\"liquid_volume\"");
        assert!(MetricKind::Select.is_writable());
        assert!(!MetricKind::Sensor.is_writable());
    }
}
