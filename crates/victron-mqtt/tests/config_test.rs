//! Hub construction from configuration files and the environment.

use std::io::Write;

use tempfile::NamedTempFile;
use victron_mqtt::config::env_vars;
use victron_mqtt::{CallbackContext, Error, HubConfig, MetricHub};

fn descriptor_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

const TANK_TABLE: &str = r#"[
    {"topic": "N/+/tank/+/Level", "kind": "sensor", "short_id": "tank_level",
     "name": "Tank level", "unit": "%", "metric_type": "percentage",
     "device_type": "tank", "precision": 0}
]"#;

#[test]
fn test_hub_from_descriptor_file_only() {
    let table = descriptor_file(TANK_TABLE);
    let config = HubConfig {
        descriptor_file: Some(table.path().to_path_buf()),
        include_builtin_topics: false,
        ..Default::default()
    };

    let hub = MetricHub::with_config(config, CallbackContext::detached()).unwrap();
    assert_eq!(hub.registry().len(), 1);

    let metric = hub.process_message("N/abc/tank/20/Level", br#"{"value": 42.4}"#).unwrap();
    assert_eq!(metric.formatted_value(), "42 %");
    assert!(hub.process_message("N/abc/grid/30/Ac/Power", br#"{"value": 1}"#).is_none());
}

#[test]
fn test_descriptor_file_extends_builtin_table() {
    let table = descriptor_file(TANK_TABLE);
    let config = HubConfig {
        descriptor_file: Some(table.path().to_path_buf()),
        ..Default::default()
    };

    let hub = MetricHub::with_config(config, CallbackContext::detached()).unwrap();
    assert!(hub.registry().contains("N/+/tank/+/Level"));
    assert!(hub.registry().contains("N/+/grid/+/Ac/Power"));
}

#[test]
fn test_descriptor_file_collision_rejected() {
    let table = descriptor_file(
        r#"[{"topic": "N/+/grid/+/Ac/Power", "kind": "sensor",
             "short_id": "my_grid_power", "name": "My grid power"}]"#,
    );
    let config = HubConfig {
        descriptor_file: Some(table.path().to_path_buf()),
        ..Default::default()
    };

    let result = MetricHub::with_config(config, CallbackContext::detached());
    assert!(matches!(result, Err(Error::DuplicateTopic(_))));
}

#[test]
fn test_invalid_descriptor_file_rejected() {
    let table = descriptor_file(
        r#"[{"topic": "N/+/grid/+/Ac/Frequency", "kind": "sensor", "short_id": "grid_frequency"}]"#,
    );
    let config = HubConfig {
        descriptor_file: Some(table.path().to_path_buf()),
        include_builtin_topics: false,
        ..Default::default()
    };

    assert!(matches!(config.build_registry(), Err(Error::Config(_))));
}

#[test]
fn test_config_file_and_env_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"installation_id": "abc", "notify_unchanged": true}}"#).unwrap();
    let config = HubConfig::from_json_file(file.path()).unwrap();
    assert_eq!(config.installation_id.as_deref(), Some("abc"));
    assert!(config.notify_unchanged);

    std::env::set_var(env_vars::INSTALLATION_ID, "def");
    let config = config.with_env_overrides();
    std::env::remove_var(env_vars::INSTALLATION_ID);

    assert_eq!(config.installation_id.as_deref(), Some("def"));
    assert!(config.notify_unchanged);
    assert!(!config.accepts_installation("abc"));
}
