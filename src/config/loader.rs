//! Configuration Loader
//!
//! Environment-aware configuration loading: YAML file discovery, environment
//! detection, and environment-specific override merging. The loaded manager
//! is owned by the application's composition root and shared via `Arc`.

use super::error::{ConfigResult, ConfigurationError};
use super::RelayConfig;
use serde_yaml::Value as YamlValue;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Environment-aware configuration manager
#[derive(Debug)]
pub struct ConfigManager {
    config: RelayConfig,
    environment: String,
    config_directory: PathBuf,
    /// Absolute root of the host project
    project_root: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;

        // Validate the loaded configuration
        config.validate()?;

        // Use sanitized configuration for logging to avoid exposing sensitive information
        let sanitized_config = Self::sanitize_config_for_logging(&config);
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&sanitized_config)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        tracing::info!(
            environment = %environment,
            listeners = config.listeners.len(),
            failover_enabled = config.failover.enabled,
            "✅ Configuration loaded successfully"
        );

        let project_root = Self::determine_project_root(&config_directory)?;

        debug!("Project root established: {}", project_root.display());

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            project_root,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get sanitized configuration for debugging/logging that masks sensitive fields
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Get the project root directory
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve a relative path from project root
    pub fn resolve_path<P: AsRef<Path>>(&self, relative_path: P) -> PathBuf {
        self.project_root.join(relative_path)
    }

    /// Safely read a configuration file with resource management and size limits
    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB limit

        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!(
                    "Configuration file too large ({}MB > {}MB limit)",
                    metadata.len() / (1024 * 1024),
                    MAX_CONFIG_FILE_SIZE / (1024 * 1024)
                ),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file".to_string(),
                "Configuration path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    /// Sanitize configuration for safe logging by masking sensitive fields
    fn sanitize_config_for_logging(config: &RelayConfig) -> serde_json::Value {
        use serde_json::json;

        let mut config_json = json!(config);

        let sensitive_patterns = ["password", "secret", "key", "token", "credential", "auth"];

        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);

        config_json
    }

    /// Recursively sanitize sensitive fields in JSON configuration
    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();

                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        match val {
                            serde_json::Value::String(s) => {
                                if s.is_empty() {
                                    *val = serde_json::Value::String("[EMPTY]".to_string());
                                } else {
                                    // Show only first 2 and last 2 characters for debugging
                                    let masked = if s.len() > 4 {
                                        format!("{}***{}", &s[..2], &s[s.len() - 2..])
                                    } else {
                                        "***".to_string()
                                    };
                                    *val = serde_json::Value::String(format!("[MASKED: {masked}]"));
                                }
                            }
                            serde_json::Value::Number(n) => {
                                *val = serde_json::Value::String(format!("[MASKED: {n}]"));
                            }
                            _ => {
                                *val = serde_json::Value::String("[MASKED]".to_string());
                            }
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {} // Primitive values don't need recursive processing
        }
    }

    /// Detect current environment from environment variables
    fn detect_environment() -> String {
        env::var("RELAY_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// Get default configuration directory
    fn default_config_directory() -> PathBuf {
        if let Ok(project_root) = Self::find_project_root() {
            return project_root.join("config");
        }

        // Fallback: probe a few likely relative locations
        let possible_dirs = vec![
            PathBuf::from("config"),
            PathBuf::from("../config"),
            PathBuf::from("../../config"),
        ];

        for dir in possible_dirs {
            let config_path = dir.join("relay-config.yaml");
            if config_path.exists() {
                debug!("Found config directory: {}", dir.display());
                return dir;
            }
        }

        PathBuf::from("config")
    }

    /// Find project root by looking for characteristic files
    fn find_project_root() -> ConfigResult<PathBuf> {
        let mut current_dir = std::env::current_dir()
            .map_err(|e| ConfigurationError::file_read_error("current_dir", e))?;

        // Project markers to look for (in order of preference)
        let markers = ["Cargo.toml", ".git", "relay-config.yaml", "README.md"];

        loop {
            for marker in &markers {
                let marker_path = current_dir.join(marker);
                if marker_path.exists() {
                    // For Cargo.toml, verify it's the right project
                    if marker == &"Cargo.toml" {
                        if let Ok(cargo_content) = std::fs::read_to_string(&marker_path) {
                            if cargo_content.contains("name = \"relay-core-rs\"")
                                || cargo_content.contains("relay")
                            {
                                debug!(
                                    "Project root found via Cargo.toml: {}",
                                    current_dir.display()
                                );
                                return Ok(current_dir);
                            }
                        }
                    } else {
                        debug!(
                            "Project root found via {}: {}",
                            marker,
                            current_dir.display()
                        );
                        return Ok(current_dir);
                    }
                }
            }

            if let Some(parent) = current_dir.parent() {
                current_dir = parent.to_path_buf();
            } else {
                break;
            }
        }

        Err(ConfigurationError::config_file_not_found(vec![
            PathBuf::from("project root not found"),
        ]))
    }

    /// Determine project root from config directory
    fn determine_project_root(config_directory: &Path) -> ConfigResult<PathBuf> {
        // First try environment variable override
        if let Ok(root) = std::env::var("RELAY_PROJECT_ROOT") {
            let root_path = PathBuf::from(root);
            if root_path.exists() {
                debug!("Using RELAY_PROJECT_ROOT: {}", root_path.display());
                return Ok(root_path);
            }
        }

        // Try CARGO_MANIFEST_DIR (set by Cargo during development/testing)
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let root_path = PathBuf::from(manifest_dir);
            debug!("Using CARGO_MANIFEST_DIR: {}", root_path.display());
            return Ok(root_path);
        }

        // Derive from config directory (config directory should be <project_root>/config)
        if config_directory.file_name().and_then(|n| n.to_str()) == Some("config") {
            if let Some(parent) = config_directory.parent() {
                debug!(
                    "Project root derived from config directory: {}",
                    parent.display()
                );
                return Ok(parent.to_path_buf());
            }
        }

        Self::find_project_root()
    }

    /// Find the configuration file
    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let possible_names = vec!["relay-config.yaml", "relay-config.yml"];
        let mut searched_paths = Vec::new();

        for name in possible_names {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Load and merge configuration with environment-specific overrides
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<RelayConfig> {
        let config_file = Self::find_config_file(config_directory)?;

        let yaml_content = Self::read_config_file_safely(&config_file)?;

        // Parse YAML as a generic value for manipulation
        let mut yaml_data: YamlValue = serde_yaml::from_str(&yaml_content)
            .map_err(|e| ConfigurationError::invalid_yaml(config_file.display().to_string(), e))?;

        // Apply environment-specific overrides
        if let Some(env_overrides) = yaml_data
            .get(YamlValue::String(environment.to_string()))
            .cloned()
        {
            debug!(
                "Applying environment-specific overrides for: {}",
                environment
            );
            Self::merge_yaml_values(&mut yaml_data, env_overrides)?;
        }

        // Remove environment sections to avoid confusion
        if let YamlValue::Mapping(ref mut map) = yaml_data {
            map.remove(YamlValue::String("development".to_string()));
            map.remove(YamlValue::String("test".to_string()));
            map.remove(YamlValue::String("production".to_string()));
        }

        // Convert to our config struct
        let mut config: RelayConfig = serde_yaml::from_value(yaml_data).map_err(|e| {
            ConfigurationError::invalid_yaml(
                config_file.display().to_string(),
                format!("Failed to deserialize configuration: {e}"),
            )
        })?;

        // Ensure environment is set correctly
        config.environment = environment.to_string();

        Ok(config)
    }

    /// Recursively merge YAML values (environment overrides into base config)
    fn merge_yaml_values(base: &mut YamlValue, override_value: YamlValue) -> ConfigResult<()> {
        match (&mut *base, override_value) {
            (YamlValue::Mapping(base_map), YamlValue::Mapping(override_map)) => {
                for (key, value) in override_map {
                    if let Some(existing_value) = base_map.get_mut(&key) {
                        // Recursively merge nested objects
                        Self::merge_yaml_values(existing_value, value)?;
                    } else {
                        base_map.insert(key, value);
                    }
                }
            }
            (base_ref, override_val) => {
                // For non-mapping values, override completely
                *base_ref = override_val;
            }
        }
        Ok(())
    }
}
