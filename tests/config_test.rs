//! Integration tests for configuration loading

use semaforo_panel::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[mqtt]
broker = "broker.lab:1884"
client_id = "painel-lab"

[topics]
command = "semaforo/lab/cmd"
status = "semaforo/lab/status"

[broker]
embedded = true
bind_address = "0.0.0.0"
port = 1884
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker_addr(), "broker.lab:1884");
    assert_eq!(config.client_id(), "painel-lab");
    assert_eq!(config.command_topic(), "semaforo/lab/cmd");
    assert_eq!(config.status_topic(), "semaforo/lab/status");
    assert!(config.broker_embedded());
    assert_eq!(config.broker_bind_address(), "0.0.0.0");
    assert_eq!(config.broker_port(), 1884);
}

#[test]
fn test_partial_config_uses_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[mqtt]\nbroker = \"10.1.1.1:1883\"\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    assert_eq!(config.broker_addr(), "10.1.1.1:1883");
    assert_eq!(config.status_topic(), "semaforo/status");
    assert!(!config.broker_embedded());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.broker_addr(), "localhost:1883");
    assert_eq!(config.command_topic(), "semaforo/cmd");
    assert_eq!(config.status_topic(), "semaforo/status");
}
