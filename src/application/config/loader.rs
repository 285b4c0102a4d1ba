use crate::application::config::models::Config;
use crate::application::config::parser::{parse_config, parse_config_file};
use crate::application::config::validator::validate_config;
use crate::common::error::Result;
use std::path::Path;
use tracing::debug;

/// Load and validate configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let config = parse_config_file(path)?;
        validate_config(&config)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load configuration from string (useful for testing)
    pub fn load_from_str(content: &str) -> Result<Config> {
        let config = parse_config(content)?;
        validate_config(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let toml = r#"
            [server]
            listen = "127.0.0.1:0"
            recv_buffer_size = 512

            [log]
            level = "debug"
        "#;

        let config = ConfigLoader::load_from_str(toml).unwrap();
        assert_eq!(config.server.recv_buffer_size, 512);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_parses_then_validates() {
        // Parses fine, fails validation.
        let result = ConfigLoader::load_from_str("[server]\nrecv_buffer_size = 0\n");
        assert!(result.is_err());
    }
}
