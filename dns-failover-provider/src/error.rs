use serde::{Deserialize, Serialize};

/// Unified error type for every remote call made by the failover controller.
///
/// Each variant carries a `provider` field naming the remote service that
/// produced it (`cloudflare` or `check-backend`), plus variant-specific context.
///
/// # Retryable Errors
///
/// The following variants represent transient failures that may succeed on retry:
/// - [`NetworkError`](Self::NetworkError): connectivity issues, 502/503/504
/// - [`Timeout`](Self::Timeout): request timed out
/// - [`RateLimited`](Self::RateLimited): API rate limit exceeded
///
/// The built-in HTTP helper retries these with exponential backoff. None of them
/// says anything about whether a probed target is reachable: callers treat them
/// as infrastructure failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum ProviderError {
    /// A network-level error occurred (connection refused, DNS failure, bad gateway).
    NetworkError {
        /// Remote service that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The API token or shared backend key was rejected.
    InvalidCredentials {
        /// Remote service that produced the error.
        provider: String,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The DNS record addressed by ID does not exist.
    RecordNotFound {
        /// Remote service that produced the error.
        provider: String,
        /// ID of the record that was not found.
        record_id: String,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// A request parameter is invalid (bad TTL, content not an IPv4 address, ...).
    InvalidParameter {
        /// Remote service that produced the error.
        provider: String,
        /// Name of the invalid parameter.
        param: String,
        /// Description of what's wrong.
        detail: String,
    },

    /// The record kind is not one the failover controller can commit.
    UnsupportedRecordType {
        /// Remote service that produced the error.
        provider: String,
        /// The unsupported record type string.
        record_type: String,
    },

    /// The API rate limit has been exceeded (HTTP 429 or equivalent).
    RateLimited {
        /// Remote service that produced the error.
        provider: String,
        /// Suggested wait time in seconds before retrying, if provided.
        retry_after: Option<u64>,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The HTTP request timed out.
    Timeout {
        /// Remote service that produced the error.
        provider: String,
        /// Error details.
        detail: String,
    },

    /// The zone for a domain was not found.
    DomainNotFound {
        /// Remote service that produced the error.
        provider: String,
        /// Domain name that was not found.
        domain: String,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The token lacks permission for the requested operation.
    PermissionDenied {
        /// Remote service that produced the error.
        provider: String,
        /// Original error message, if available.
        raw_message: Option<String>,
    },

    /// The remote service answered with an unexpected HTTP status.
    BackendStatus {
        /// Remote service that produced the error.
        provider: String,
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        detail: String,
    },

    /// Failed to parse a response, or a streamed response ended early.
    ParseError {
        /// Remote service that produced the error.
        provider: String,
        /// Details about the parse failure.
        detail: String,
    },

    /// Failed to serialize a request body.
    SerializationError {
        /// Remote service that produced the error.
        provider: String,
        /// Details about the serialization failure.
        detail: String,
    },

    /// An unrecognized error from the remote API.
    Unknown {
        /// Remote service that produced the error.
        provider: String,
        /// Raw error code, if available.
        raw_code: Option<String>,
        /// Raw error message.
        raw_message: String,
    },
}

impl ProviderError {
    /// 是否为预期行为（配置错误、资源不存在等），用于日志分级。
    ///
    /// 返回 `true` 时应使用 `warn` 级别，`false` 时使用 `error` 级别。
    /// **新增变体时请同步更新此方法。**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::RecordNotFound { .. }
                | Self::InvalidParameter { .. }
                | Self::UnsupportedRecordType { .. }
                | Self::DomainNotFound { .. }
                | Self::PermissionDenied { .. }
        )
    }

    /// Whether the failure is transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkError { provider, detail } => {
                write!(f, "[{provider}] Network error: {detail}")
            }
            Self::InvalidCredentials {
                provider,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Invalid credentials: {msg}"),
                None => write!(f, "[{provider}] Invalid credentials"),
            },
            Self::RecordNotFound {
                provider,
                record_id,
                ..
            } => write!(f, "[{provider}] Record '{record_id}' not found"),
            Self::InvalidParameter {
                provider,
                param,
                detail,
            } => write!(f, "[{provider}] Invalid parameter '{param}': {detail}"),
            Self::UnsupportedRecordType {
                provider,
                record_type,
            } => write!(f, "[{provider}] Unsupported record type: {record_type}"),
            Self::RateLimited {
                provider,
                retry_after,
                ..
            } => match retry_after {
                Some(secs) => write!(f, "[{provider}] Rate limited (retry after {secs}s)"),
                None => write!(f, "[{provider}] Rate limited"),
            },
            Self::Timeout { provider, detail } => {
                write!(f, "[{provider}] Request timeout: {detail}")
            }
            Self::DomainNotFound {
                provider,
                domain,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Domain '{domain}' not found: {msg}"),
                None => write!(f, "[{provider}] Domain '{domain}' not found"),
            },
            Self::PermissionDenied {
                provider,
                raw_message,
            } => match raw_message {
                Some(msg) => write!(f, "[{provider}] Permission denied: {msg}"),
                None => write!(f, "[{provider}] Permission denied"),
            },
            Self::BackendStatus {
                provider,
                status,
                detail,
            } => write!(f, "[{provider}] HTTP {status}: {detail}"),
            Self::ParseError { provider, detail } => {
                write!(f, "[{provider}] Parse error: {detail}")
            }
            Self::SerializationError { provider, detail } => {
                write!(f, "[{provider}] Serialization error: {detail}")
            }
            Self::Unknown {
                provider,
                raw_message,
                ..
            } => write!(f, "[{provider}] {raw_message}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Convenience type alias for `Result<T, ProviderError>`.
pub type Result<T> = std::result::Result<T, ProviderError>;
