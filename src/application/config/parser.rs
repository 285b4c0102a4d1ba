use crate::application::config::models::Config;
use crate::common::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Parse configuration from TOML file
pub fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse configuration from TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reactor.epoll_capacity, 1024);
        assert_eq!(config.server.listen.port(), 8080);
    }

    #[test]
    fn test_parse_partial_sections() {
        let toml = r#"
            [reactor]
            wait_timeout_ms = 250

            [parser]
            max_head_length = 1024

            [server]
            listen = "0.0.0.0:9000"
        "#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.reactor.wait_timeout_ms, 250);
        assert_eq!(config.reactor.epoll_capacity, 1024);
        assert_eq!(config.parser.max_head_length, 1024);
        assert_eq!(config.parser.max_leading_spaces, 64);
        assert_eq!(config.server.listen.port(), 9000);
        assert!(config.server.nodelay);
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        let err = parse_config("[reactor]\nepoll_capacity = \"many\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = parse_config_file("/nonexistent/mooon.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
