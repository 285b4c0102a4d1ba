use crate::common::constants::{
    DEFAULT_EPOLL_CAPACITY, DEFAULT_LISTEN_ADDR, DEFAULT_LOG_LEVEL, DEFAULT_MAX_FIELD_LENGTH,
    DEFAULT_MAX_HEAD_LENGTH, DEFAULT_MAX_LEADING_SPACES, DEFAULT_RECV_BUFFER_SIZE,
    DEFAULT_WAIT_TIMEOUT_MS,
};
use crate::http::command::ParserLimits;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub reactor: ReactorConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Epoll settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReactorConfig {
    /// Events retrieved per wait
    #[serde(default = "default_epoll_capacity")]
    pub epoll_capacity: u32,

    /// Upper bound of one wait, so shutdown requests are noticed
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u32,
}

/// HTTP header parser limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ParserConfig {
    #[serde(default = "default_max_leading_spaces")]
    pub max_leading_spaces: usize,

    #[serde(default = "default_max_field_length")]
    pub max_field_length: usize,

    #[serde(default = "default_max_head_length")]
    pub max_head_length: usize,
}

/// Header server settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Bytes read from a connection per readiness event
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Set TCP_NODELAY on accepted connections
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_epoll_capacity() -> u32 {
    DEFAULT_EPOLL_CAPACITY
}

fn default_wait_timeout_ms() -> u32 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_max_leading_spaces() -> usize {
    DEFAULT_MAX_LEADING_SPACES
}

fn default_max_field_length() -> usize {
    DEFAULT_MAX_FIELD_LENGTH
}

fn default_max_head_length() -> usize {
    DEFAULT_MAX_HEAD_LENGTH
}

fn default_listen() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)))
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

fn default_nodelay() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl ParserConfig {
    pub fn limits(&self) -> ParserLimits {
        ParserLimits {
            max_leading_spaces: self.max_leading_spaces,
            max_field_length: self.max_field_length,
            max_head_length: self.max_head_length,
        }
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            epoll_capacity: default_epoll_capacity(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_leading_spaces: default_max_leading_spaces(),
            max_field_length: default_max_field_length(),
            max_head_length: default_max_head_length(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            recv_buffer_size: default_recv_buffer_size(),
            nodelay: default_nodelay(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
