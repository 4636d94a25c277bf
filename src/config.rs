//! Gateway configuration file handling
//!
//! Provides default configuration generation and loading. Configuration files
//! are TOML format and stored adjacent to the credential store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Messaging connection configuration
    pub messaging: MessagingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Messaging-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Path to the credential store database
    pub store_path: PathBuf,

    /// Country code prefixed to bare local numbers during normalization
    #[serde(default = "default_country_code")]
    pub country_code: String,

    /// Device name shown to the messaging network and used as the default
    /// display name
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Connection timeout handed to the protocol engine, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Fixed delay before an automatic reconnect attempt, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Delay between a hard reset's credential wipe and re-initialization,
    /// in milliseconds
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

fn default_country_code() -> String {
    "92".to_string()
}

fn default_device_name() -> String {
    "Wagate".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    60
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_reset_delay_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl MessagingConfig {
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            store_path,
            country_code: default_country_code(),
            device_name: default_device_name(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reset_delay_ms: default_reset_delay_ms(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

impl GatewayConfig {
    /// Create a new configuration with the given store path
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            messaging: MessagingConfig::new(store_path),
            logging: LoggingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: GatewayConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml(store_path: &Path) -> String {
        format!(
            r#"# Wagate Configuration
#
# Settings for the WhatsApp gateway: where session credentials are stored,
# how outbound phone numbers are normalized, and how logging behaves.

[messaging]
# Path to the credential store database (holds the pairing session)
store_path = "{store_path}"

# Country code prefixed to bare local numbers (e.g. 03001234567 -> 923001234567)
country_code = "92"

# Device name shown to the messaging network
device_name = "Wagate"

# Connection timeout handed to the protocol engine, in seconds
connect_timeout_secs = 60

# Fixed delay before an automatic reconnect attempt, in milliseconds
reconnect_delay_ms = 3000

# Delay between a hard reset's credential wipe and re-initialization, in milliseconds
reset_delay_ms = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (optional, logs to stderr if not specified)
# file = "/var/log/wagate/wagate.log"
"#,
            store_path = store_path.display()
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(
        config_path: &Path,
        store_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let contents = Self::generate_default_toml(store_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, contents).map_err(|e| {
            format!(
                "Failed to write config file '{}': {}",
                config_path.display(),
                e
            )
        })?;

        Ok(())
    }
}

/// Get the default config file path based on the store path
///
/// The config file is stored adjacent to the credential store:
/// - Store: ~/.local/share/wagate/session.db
/// - Config: ~/.local/share/wagate/config.toml
pub fn default_config_path(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .unwrap_or(store_path)
        .join("config.toml")
}

/// Get the default credential store path
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wagate")
        .join("session.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let store_path = PathBuf::from("/data/wagate/session.db");
        let config = GatewayConfig::new(store_path.clone());

        assert_eq!(config.messaging.store_path, store_path);
        assert_eq!(config.messaging.country_code, "92");
        assert_eq!(config.messaging.device_name, "Wagate");
        assert_eq!(config.messaging.reconnect_delay_ms, 3_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let store_path = PathBuf::from("/data/wagate/session.db");

        let config = GatewayConfig::new(store_path.clone());
        config.save(&config_path).unwrap();

        let loaded = GatewayConfig::load(&config_path).unwrap();
        assert_eq!(loaded.messaging.store_path, store_path);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let store_path = temp_dir.path().join("session.db");

        GatewayConfig::create_default(&config_path, &store_path).unwrap();

        assert!(config_path.exists());

        let config = GatewayConfig::load(&config_path).unwrap();
        assert_eq!(config.messaging.store_path, store_path);
        assert_eq!(config.messaging.country_code, "92");
    }

    #[test]
    fn test_load_config_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        // Minimal config: only the required field.
        let minimal_config = r#"
[messaging]
store_path = "/tmp/session.db"
"#;
        fs::write(&config_path, minimal_config).unwrap();

        let config = GatewayConfig::load(&config_path).unwrap();

        assert_eq!(config.messaging.country_code, "92");
        assert_eq!(config.messaging.connect_timeout_secs, 60);
        assert_eq!(config.messaging.reconnect_delay_ms, 3_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_default_config_path() {
        let store_path = PathBuf::from("/data/wagate/session.db");
        assert_eq!(
            default_config_path(&store_path),
            PathBuf::from("/data/wagate/config.toml")
        );
    }

    #[test]
    fn test_duration_accessors() {
        let config = MessagingConfig::new(PathBuf::from("/tmp/session.db"));

        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(3_000));
        assert_eq!(config.reset_delay(), Duration::from_millis(1_000));
    }
}
