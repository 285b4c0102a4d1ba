use crate::application::config::models::{Config, LogConfig, ParserConfig, ReactorConfig, ServerConfig};
use crate::common::error::{Error, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration for correctness and consistency
pub fn validate_config(config: &Config) -> Result<()> {
    validate_reactor(&config.reactor)?;
    validate_parser(&config.parser)?;
    validate_server(&config.server)?;
    validate_log(&config.log)?;
    Ok(())
}

fn validate_reactor(reactor: &ReactorConfig) -> Result<()> {
    if reactor.epoll_capacity == 0 {
        return Err(Error::Config(
            "reactor.epoll_capacity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_parser(parser: &ParserConfig) -> Result<()> {
    let limits = [
        ("max_leading_spaces", parser.max_leading_spaces),
        ("max_field_length", parser.max_field_length),
        ("max_head_length", parser.max_head_length),
    ];
    for (name, value) in limits {
        if value == 0 {
            return Err(Error::Config(format!(
                "parser.{} must be greater than 0",
                name
            )));
        }
    }

    if parser.max_field_length > parser.max_head_length {
        return Err(Error::Config(format!(
            "parser.max_field_length ({}) exceeds parser.max_head_length ({})",
            parser.max_field_length, parser.max_head_length
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<()> {
    if server.recv_buffer_size == 0 {
        return Err(Error::Config(
            "server.recv_buffer_size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_log(log: &LogConfig) -> Result<()> {
    let level = log.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(Error::Config(format!(
            "Invalid log level '{}', expected one of {:?}",
            log.level, LOG_LEVELS
        )));
    }
    Ok(())
}
