//! Built-in Topic Descriptors
//!
//! A starter descriptor table covering ESS settings, grid and inverter AC
//! phases, batteries, solar chargers and common device attributes. Hosts with
//! their own table load it through [`crate::config::HubConfig`] instead of, or
//! on top of, this one.

use serde_json::{json, Value};

use crate::descriptor::DescriptorSpec;
use crate::error::Result;
use crate::registry::TopicRegistry;

/// Registry holding every built-in descriptor.
pub fn builtin_registry() -> Result<TopicRegistry> {
    let specs: Vec<DescriptorSpec> = serde_json::from_value(builtin_descriptor_specs())?;
    let descriptors = specs
        .into_iter()
        .map(TryFrom::try_from)
        .collect::<Result<Vec<_>>>()?;
    TopicRegistry::from_descriptors(descriptors)
}

/// Built-in descriptor table in its JSON wire form.
pub fn builtin_descriptor_specs() -> Value {
    let mut specs = Vec::new();
    specs.extend(device_attributes());
    specs.extend(ess_settings());
    specs.extend(grid());
    specs.extend(system());
    specs.extend(battery());
    specs.extend(solarcharger());
    specs.extend(vebus());
    specs.extend(evcharger());
    Value::Array(specs)
}

/// Attributes shared by every device type.
fn device_attributes() -> Vec<Value> {
    vec![
        json!({"topic": "N/+/+/+/ProductName", "kind": "attribute", "short_id": "product_name"}),
        json!({"topic": "N/+/+/+/Serial", "kind": "attribute", "short_id": "serial_number"}),
        json!({"topic": "N/+/+/+/FirmwareVersion", "kind": "attribute", "short_id": "firmware_version"}),
        json!({"topic": "N/+/+/+/CustomName", "kind": "attribute", "short_id": "custom_name"}),
    ]
}

fn ess_settings() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/Hub4Mode",
            "kind": "select", "short_id": "ess_hub4_mode", "name": "ESS mode (Hub4)",
            "device_type": "settings", "enum": "Hub4Mode"
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/MaxFeedInPower",
            "kind": "number", "short_id": "ess_max_feed_in_power", "name": "ESS max feed-in power",
            "unit": "W", "metric_type": "power", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": -1, "max": 100000
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/PreventFeedback",
            "kind": "switch", "short_id": "ess_prevent_feedback", "name": "ESS prevent feedback",
            "device_type": "settings", "enum": "GenericOnOff"
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/AcPowerSetpoint",
            "kind": "number", "short_id": "ess_ac_power_setpoint", "name": "ESS AC power setpoint",
            "unit": "W", "metric_type": "power", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": -100000, "max": 100000
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/AcPowerSetpointPossible",
            "kind": "switch", "short_id": "ess_ac_power_setpoint_possible",
            "name": "ESS AC power setpoint possible", "device_type": "settings", "enum": "GenericOnOff"
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/AcPowerSetpointReturnDelay",
            "kind": "number", "short_id": "ess_ac_power_setpoint_return_delay",
            "name": "ESS AC power setpoint return delay", "unit": "s", "metric_type": "duration",
            "device_type": "settings", "value_type": "int", "precision": 0, "min": 0, "max": 3600
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/MaxChargePower",
            "kind": "number", "short_id": "ess_max_charge_power", "name": "ESS max charge power",
            "unit": "W", "metric_type": "power", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": -1, "max": 100000
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/MaxDischargePower",
            "kind": "number", "short_id": "ess_max_discharge_power", "name": "ESS max discharge power",
            "unit": "W", "metric_type": "power", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": -1, "max": 100000
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/GridSetPoint",
            "kind": "number", "short_id": "ess_grid_setpoint", "name": "ESS grid setpoint",
            "unit": "W", "metric_type": "power", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": -100000, "max": 100000
        }),
        json!({
            "topic": "N/+/settings/0/Settings/CGwacs/Sustain",
            "kind": "number", "short_id": "ess_sustain", "name": "ESS sustain",
            "device_type": "settings", "value_type": "int", "precision": 0, "min": 0, "max": 1
        }),
        json!({
            "topic": "N/+/settings/0/Settings/Ess/Mode",
            "kind": "select", "short_id": "ess_mode", "name": "ESS mode",
            "device_type": "settings", "enum": "EssMode"
        }),
        json!({
            "topic": "N/+/settings/0/Settings/Ess/MinimumSocLimit",
            "kind": "number", "short_id": "ess_minimum_soc_limit", "name": "ESS minimum SOC limit",
            "unit": "%", "metric_type": "percentage", "device_type": "settings",
            "value_type": "int", "precision": 0, "min": 0, "max": 100
        }),
    ]
}

fn grid() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/grid/+/Ac/Power",
            "kind": "sensor", "short_id": "grid_power", "name": "Grid power",
            "unit": "W", "metric_type": "power", "metric_nature": "instantaneous",
            "device_type": "grid", "value_type": "float", "precision": 0
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/Power",
            "kind": "sensor", "short_id": "grid_power_{phase}", "name": "Grid power {phase}",
            "unit": "W", "metric_type": "power", "metric_nature": "instantaneous",
            "device_type": "grid", "value_type": "float", "precision": 0
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/Voltage",
            "kind": "sensor", "short_id": "grid_voltage_{phase}", "name": "Grid voltage {phase}",
            "unit": "V", "metric_type": "voltage", "metric_nature": "instantaneous",
            "device_type": "grid", "value_type": "float", "precision": 1
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/Current",
            "kind": "sensor", "short_id": "grid_current_{phase}", "name": "Grid current {phase}",
            "unit": "A", "metric_type": "current", "metric_nature": "instantaneous",
            "device_type": "grid", "value_type": "float", "precision": 1
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/Energy/Forward",
            "kind": "sensor", "short_id": "grid_energy_forward_{phase}",
            "name": "Grid consumption on {phase}", "unit": "kWh", "metric_type": "energy",
            "metric_nature": "cumulative", "device_type": "grid", "value_type": "float", "precision": 2
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/Energy/Reverse",
            "kind": "sensor", "short_id": "grid_energy_reverse_{phase}",
            "name": "Grid feed-in on {phase}", "unit": "kWh", "metric_type": "energy",
            "metric_nature": "cumulative", "device_type": "grid", "value_type": "float", "precision": 2
        }),
        json!({
            "topic": "N/+/grid/+/Ac/+/VoltageLineToLine",
            "kind": "sensor", "short_id": "grid_voltage_{phase}_{next_phase}",
            "name": "Grid voltage {phase} to {next_phase}", "unit": "V", "metric_type": "voltage",
            "metric_nature": "instantaneous", "device_type": "grid", "value_type": "float", "precision": 1
        }),
    ]
}

fn system() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/system/0/Dc/Battery/Soc",
            "kind": "sensor", "short_id": "system_battery_soc", "name": "Battery state of charge",
            "unit": "%", "metric_type": "percentage", "metric_nature": "instantaneous",
            "device_type": "system", "value_type": "float", "precision": 1
        }),
        json!({
            "topic": "N/+/system/0/Ac/Consumption/+/Power",
            "kind": "sensor", "short_id": "system_consumption_{phase}",
            "name": "Consumption on {phase}", "unit": "W", "metric_type": "power",
            "metric_nature": "instantaneous", "device_type": "system", "value_type": "float", "precision": 0
        }),
    ]
}

fn battery() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/battery/+/Soc",
            "kind": "sensor", "short_id": "battery_soc", "name": "Battery SOC",
            "unit": "%", "metric_type": "percentage", "metric_nature": "instantaneous",
            "device_type": "battery", "value_type": "float", "precision": 1
        }),
        json!({
            "topic": "N/+/battery/+/Dc/0/Voltage",
            "kind": "sensor", "short_id": "battery_voltage", "name": "Battery voltage",
            "unit": "V", "metric_type": "voltage", "metric_nature": "instantaneous",
            "device_type": "battery", "value_type": "float", "precision": 2
        }),
        json!({
            "topic": "N/+/battery/+/Dc/0/Power",
            "kind": "sensor", "short_id": "battery_power", "name": "Battery power",
            "unit": "W", "metric_type": "power", "metric_nature": "instantaneous",
            "device_type": "battery", "value_type": "float", "precision": 0
        }),
    ]
}

fn solarcharger() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/solarcharger/+/Yield/Power",
            "kind": "sensor", "short_id": "solarcharger_yield_power", "name": "PV power",
            "unit": "W", "metric_type": "power", "metric_nature": "instantaneous",
            "device_type": "solarcharger", "value_type": "float", "precision": 0
        }),
        json!({
            "topic": "N/+/solarcharger/+/History/Daily/0/Yield",
            "kind": "sensor", "short_id": "solarcharger_yield_today", "name": "PV yield today",
            "unit": "kWh", "metric_type": "energy", "metric_nature": "cumulative",
            "device_type": "solarcharger", "value_type": "float", "precision": 2
        }),
    ]
}

fn vebus() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/vebus/+/Mode",
            "kind": "select", "short_id": "inverter_mode", "name": "Inverter mode",
            "device_type": "vebus", "enum": "InverterMode"
        }),
        json!({
            "topic": "N/+/vebus/+/Ac/Out/+/P",
            "kind": "sensor", "short_id": "inverter_output_power_{phase}",
            "name": "Inverter output power {phase}", "unit": "W", "metric_type": "power",
            "metric_nature": "instantaneous", "device_type": "vebus", "value_type": "float", "precision": 0
        }),
        json!({
            "topic": "N/+/vebus/+/Ac/ActiveIn/CurrentLimit",
            "kind": "number", "short_id": "inverter_input_current_limit",
            "name": "Inverter input current limit", "unit": "A", "metric_type": "current",
            "device_type": "vebus", "value_type": "float", "precision": 1, "min": 0, "max": 100
        }),
    ]
}

fn evcharger() -> Vec<Value> {
    vec![
        json!({
            "topic": "N/+/evcharger/+/Mode",
            "kind": "select", "short_id": "evcharger_mode", "name": "EV charger mode",
            "device_type": "evcharger", "enum": "EvChargerMode"
        }),
        json!({
            "topic": "N/+/evcharger/+/StartStop",
            "kind": "switch", "short_id": "evcharger_charge", "name": "EV charging",
            "device_type": "evcharger", "enum": "GenericOnOff"
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MetricKind;

    #[test]
    fn test_builtin_registry_builds() {
        let registry = builtin_registry().unwrap();
        assert!(!registry.is_empty());
        assert_eq!(
            registry.len(),
            builtin_descriptor_specs().as_array().map(Vec::len).unwrap_or_default()
        );
    }

    #[test]
    fn test_settings_topics_present() {
        let registry = builtin_registry().unwrap();
        let expected = [
            ("N/+/settings/0/Settings/CGwacs/Hub4Mode", MetricKind::Select),
            ("N/+/settings/0/Settings/CGwacs/MaxFeedInPower", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/PreventFeedback", MetricKind::Switch),
            ("N/+/settings/0/Settings/CGwacs/AcPowerSetpoint", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/AcPowerSetpointPossible", MetricKind::Switch),
            ("N/+/settings/0/Settings/CGwacs/AcPowerSetpointReturnDelay", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/MaxChargePower", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/MaxDischargePower", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/GridSetPoint", MetricKind::Number),
            ("N/+/settings/0/Settings/CGwacs/Sustain", MetricKind::Number),
            ("N/+/settings/0/Settings/Ess/Mode", MetricKind::Select),
            ("N/+/settings/0/Settings/Ess/MinimumSocLimit", MetricKind::Number),
        ];
        for (topic, kind) in expected {
            let desc = registry.get(topic).unwrap_or_else(|| panic!("missing {topic}"));
            assert_eq!(desc.kind(), kind, "{topic}");
        }
    }
}
