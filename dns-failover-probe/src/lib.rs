//! Probe engine for the DNS failover check backend
//!
//! 解析目标地址，按固定次数与间隔发起 TCP 连接，并逐次上报进度。
//! 目标不可达是正常结果（`ProbeReport`），只有请求本身无效才返回错误。

mod error;
mod services;
mod types;

pub use error::{ProbeError, ProbeResult};
pub use services::ProbeService;
pub use types::{
    DEFAULT_ATTEMPTS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RETRY_INTERVAL_SECS, TcpCheckOptions,
};
