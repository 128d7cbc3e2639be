//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument,
//! defaulting to config/dev.toml. A missing or broken file falls back to
//! defaults with a warning so the panel always comes up.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct MqttSection {
    /// Broker address as free text, "host" or "host:port"
    #[serde(default = "default_broker_addr")]
    pub broker: String,
    /// Client identifier, empty means generate one per connect
    #[serde(default)]
    pub client_id: String,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self { broker: default_broker_addr(), client_id: String::new() }
    }
}

fn default_broker_addr() -> String {
    "localhost:1883".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicsSection {
    #[serde(default = "default_command_topic")]
    pub command: String,
    #[serde(default = "default_status_topic")]
    pub status: String,
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self { command: default_command_topic(), status: default_status_topic() }
    }
}

fn default_command_topic() -> String {
    "semaforo/cmd".to_string()
}

fn default_status_topic() -> String {
    "semaforo/status".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSection {
    /// Start an embedded broker for self-contained local use
    #[serde(default)]
    pub embedded: bool,
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            embedded: false,
            bind_address: default_broker_bind_address(),
            port: default_broker_port(),
        }
    }
}

fn default_broker_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub topics: TopicsSection,
    #[serde(default)]
    pub broker: BrokerSection,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    broker_addr: String,
    client_id: String,
    command_topic: String,
    status_topic: String,
    broker_embedded: bool,
    broker_bind_address: String,
    broker_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_addr: default_broker_addr(),
            client_id: String::new(),
            command_topic: default_command_topic(),
            status_topic: default_status_topic(),
            broker_embedded: false,
            broker_bind_address: default_broker_bind_address(),
            broker_port: default_broker_port(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            broker_addr: toml_config.mqtt.broker,
            client_id: toml_config.mqtt.client_id,
            command_topic: toml_config.topics.command,
            status_topic: toml_config.topics.status,
            broker_embedded: toml_config.broker.embedded,
            broker_bind_address: toml_config.broker.bind_address,
            broker_port: toml_config.broker.port,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries the TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn broker_addr(&self) -> &str {
        &self.broker_addr
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn command_topic(&self) -> &str {
        &self.command_topic
    }

    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    pub fn broker_embedded(&self) -> bool {
        self.broker_embedded
    }

    pub fn broker_bind_address(&self) -> &str {
        &self.broker_bind_address
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.broker_addr(), "localhost:1883");
        assert_eq!(config.client_id(), "");
        assert_eq!(config.command_topic(), "semaforo/cmd");
        assert_eq!(config.status_topic(), "semaforo/status");
        assert!(!config.broker_embedded());
        assert_eq!(config.broker_port(), 1883);
    }

    #[test]
    fn test_empty_toml_uses_section_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.mqtt.broker, "localhost:1883");
        assert_eq!(config.topics.status, "semaforo/status");
        assert!(!config.broker.embedded);
    }
}
