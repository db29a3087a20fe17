//! Minimal TOML serialization/deserialization tests
//!
//! Checks that partial documents fill in defaults and that the serialized
//! form reads back unchanged.

use conclave_config::{ClientConfig, ConclaveConfig, ServerConfig, DEFAULT_PORT};

#[test]
fn test_empty_document_is_default() {
    let config = ConclaveConfig::from_toml_str("").expect("Failed to parse empty config");
    assert_eq!(config, ConclaveConfig::default());
    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.server.bind_address(), "127.0.0.1:8000");
}

#[test]
fn test_server_config_serialization() {
    let server = ServerConfig {
        host: "0.0.0.0".to_string(),
        port: 7000,
        max_frame_bytes: 1024,
    };

    let toml_str = toml::to_string_pretty(&server).expect("Failed to serialize ServerConfig");
    let deserialized: ServerConfig =
        toml::from_str(&toml_str).expect("Failed to deserialize ServerConfig");
    assert_eq!(server, deserialized);
}

#[test]
fn test_partial_client_table() {
    let config = ConclaveConfig::from_toml_str("[client]\nport = 8123\n")
        .expect("Failed to parse partial config");
    assert_eq!(
        config.client,
        ClientConfig {
            port: 8123,
            ..ClientConfig::default()
        }
    );
    assert_eq!(config.client.address(), "127.0.0.1:8123");
    assert_eq!(config.server, ServerConfig::default());
}

#[test]
fn test_unknown_port_type_is_rejected() {
    let result = ConclaveConfig::from_toml_str("[server]\nport = \"high\"\n");
    assert!(result.is_err());
}

#[test]
fn test_default_frame_limit_matches_framing() {
    let limit = conclave_protocol::DEFAULT_MAX_FRAME_BYTES;
    assert_eq!(ServerConfig::default().max_frame_bytes, limit);
    assert_eq!(ClientConfig::default().max_frame_bytes, limit);
    assert_eq!(conclave_config::DEFAULT_MAX_FRAME_BYTES, limit);
}
