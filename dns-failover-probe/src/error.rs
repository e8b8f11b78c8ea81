//! 统一错误类型定义

use serde::Serialize;
use thiserror::Error;

/// Probe engine error type.
///
/// These are request problems. An unreachable or unresolvable target is a
/// normal [`ProbeReport`](dns_failover_provider::ProbeReport), not an error.
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ProbeError {
    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 网络错误
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProbeError {
    /// Whether this is caller error (logged at `warn`) rather than a fault.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }
}

/// Probe Result 类型别名
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
