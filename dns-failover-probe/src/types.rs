//! Probe engine settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 默认尝试次数
pub const DEFAULT_ATTEMPTS: u32 = 5;
/// 单次连接超时（秒）
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 1;
/// 两次尝试之间的间隔（秒）
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 1;

/// How a TCP check dials its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpCheckOptions {
    /// Connection attempts before giving up. Zero is treated as one.
    pub attempts: u32,
    pub connect_timeout: Duration,
    /// Pause between a failed attempt and the next one.
    pub retry_interval: Duration,
}

impl Default for TcpCheckOptions {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
        }
    }
}
