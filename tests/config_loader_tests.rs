//! Configuration Loader Tests
//!
//! End-to-end loading through `ConfigManager`: file discovery, serde
//! defaults for partial files, environment-specific override merging, and
//! validation failures surfacing at load time.

use relay_core::config::ConfigManager;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
    let config_path = dir.path().join("relay-config.yaml");
    fs::write(&config_path, yaml).unwrap();
    dir.path().to_path_buf()
}

#[test]
fn minimal_file_loads_with_defaults() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
listeners:
  - entity_name: "orders"
    owner: "fulfillment"
    processor_id: "order_processor"
"#,
    );

    let manager = ConfigManager::load_from_directory_with_env(Some(config_dir), "development")
        .unwrap();

    let config = manager.config();
    assert_eq!(config.broker.poll_interval_ms, 250);
    assert_eq!(config.broker.visibility_timeout_seconds, 30);
    assert_eq!(config.broker.batch_size, 10);
    assert_eq!(config.connection_retry.max_attempts, 5);
    assert_eq!(config.connection_retry.base_delay_seconds, 1);
    assert!(!config.failover.enabled);

    assert_eq!(config.listeners.len(), 1);
    let listener = &config.listeners[0];
    assert_eq!(listener.worker_slots, 4);
    assert_eq!(listener.retry_threshold, 5);
    assert_eq!(listener.instance_count, 1);
    assert!(listener.enabled);
    assert!(listener.is_queue());
}

#[test]
fn empty_mapping_loads_as_pure_defaults() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(&dir, "environment: \"ignored\"\n");

    let manager = ConfigManager::load_from_directory_with_env(Some(config_dir), "development")
        .unwrap();

    let config = manager.config();
    assert!(config.listeners.is_empty());
    // The loader stamps the detected environment over whatever the file says
    assert_eq!(config.environment, "development");
    assert_eq!(config.database.pool, 10);
}

#[test]
fn environment_override_merges_nested_mappings() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
broker:
  poll_interval_ms: 500
  batch_size: 20

failover:
  enabled: false

production:
  broker:
    batch_size: 50
  failover:
    enabled: true
"#,
    );

    let manager =
        ConfigManager::load_from_directory_with_env(Some(config_dir), "production").unwrap();

    let config = manager.config();
    // Overridden field
    assert_eq!(config.broker.batch_size, 50);
    // Sibling field in the same mapping survives
    assert_eq!(config.broker.poll_interval_ms, 500);
    assert!(config.failover.enabled);
    assert_eq!(config.environment, "production");
}

#[test]
fn environment_override_replaces_listener_sequences() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
listeners:
  - entity_name: "orders"
    owner: "fulfillment"
    processor_id: "order_processor"
  - entity_name: "payments"
    owner: "billing"
    processor_id: "payment_processor"

test:
  listeners:
    - entity_name: "orders"
      owner: "test-suite"
      processor_id: "counting_processor"
"#,
    );

    let manager = ConfigManager::load_from_directory_with_env(Some(config_dir), "test").unwrap();

    // Sequences are replaced wholesale, not merged element-wise
    let config = manager.config();
    assert_eq!(config.listeners.len(), 1);
    assert_eq!(config.listeners[0].owner, "test-suite");
    assert_eq!(config.listeners[0].processor_id, "counting_processor");
}

#[test]
fn other_environment_sections_do_not_leak() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
broker:
  batch_size: 20

test:
  broker:
    batch_size: 2

production:
  broker:
    batch_size: 50
"#,
    );

    let manager =
        ConfigManager::load_from_directory_with_env(Some(config_dir), "development").unwrap();

    assert_eq!(manager.config().broker.batch_size, 20);
}

#[test]
fn validation_failure_surfaces_at_load_time() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
broker:
  batch_size: 0
"#,
    );

    let err = ConfigManager::load_from_directory_with_env(Some(config_dir), "development")
        .unwrap_err();

    assert!(err.to_string().contains("batch size must be greater than 0"));
}

#[test]
fn listener_missing_processor_id_fails_to_load() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(
        &dir,
        r#"
listeners:
  - entity_name: "orders"
    owner: "fulfillment"
    processor_id: ""
"#,
    );

    let err = ConfigManager::load_from_directory_with_env(Some(config_dir), "development")
        .unwrap_err();

    assert!(err.to_string().contains("listeners[0].processor_id"));
}

#[test]
fn yml_extension_is_discovered() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("relay-config.yml");
    fs::write(&config_path, "listeners: []\n").unwrap();

    let manager = ConfigManager::load_from_directory_with_env(
        Some(dir.path().to_path_buf()),
        "development",
    )
    .unwrap();

    assert!(manager.config().listeners.is_empty());
    assert_eq!(manager.config_directory(), dir.path());
}

#[test]
fn resolve_path_joins_against_project_root() {
    let dir = TempDir::new().unwrap();
    let config_dir = write_config(&dir, "listeners: []\n");

    let manager = ConfigManager::load_from_directory_with_env(Some(config_dir), "development")
        .unwrap();

    let resolved = manager.resolve_path("config/relay-config.yaml");
    assert!(resolved.is_absolute());
    assert!(resolved.ends_with("config/relay-config.yaml"));
}
