// Configuration tests - verify config parsing and validation

use mooon::application::config::ConfigLoader;
use mooon::Error;
use std::fs;

#[test]
fn test_valid_config_file() {
    let toml_content = r#"
[reactor]
epoll_capacity = 256
wait_timeout_ms = 50

[parser]
max_leading_spaces = 8
max_field_length = 1024
max_head_length = 4096

[server]
listen = "127.0.0.1:18080"
recv_buffer_size = 1024
nodelay = false

[log]
level = "debug"
"#;

    let temp_file = std::env::temp_dir().join("mooon_test_config.toml");
    fs::write(&temp_file, toml_content).unwrap();

    let config = ConfigLoader::load(&temp_file).unwrap();
    assert_eq!(config.reactor.epoll_capacity, 256);
    assert_eq!(config.parser.limits().max_head_length, 4096);
    assert_eq!(config.server.listen.port(), 18080);
    assert!(!config.server.nodelay);
    assert_eq!(config.log.level, "debug");
    let _ = fs::remove_file(&temp_file);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let config = ConfigLoader::load_from_str("invalid = \"config\"\n").unwrap();
    assert_eq!(config.reactor.epoll_capacity, 1024);
}

#[test]
fn test_invalid_listen_address() {
    let err = ConfigLoader::load_from_str("[server]\nlisten = \"not an address\"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_field_limit_above_head_limit() {
    let toml_content = r#"
[parser]
max_field_length = 10000
max_head_length = 100
"#;
    let err = ConfigLoader::load_from_str(toml_content).unwrap_err();
    assert!(err.to_string().contains("max_field_length"));
}

#[test]
fn test_missing_config_file() {
    let err = ConfigLoader::load("/nonexistent/path/mooon.toml").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
