pub const DEFAULT_EPOLL_CAPACITY: u32 = 1024;
pub const DEFAULT_WAIT_TIMEOUT_MS: u32 = 100;

pub const DEFAULT_MAX_LEADING_SPACES: usize = 64;
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 8192; // 8KB
pub const DEFAULT_MAX_HEAD_LENGTH: usize = 64 * 1024; // 64KB

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Bytes drained from the sensor pipe per read.
pub const SENSOR_DRAIN_SIZE: usize = 1024;

/// Sentinel fd of a detached or closed epollable.
pub const INVALID_FD: i32 = -1;
