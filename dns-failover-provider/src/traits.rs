use async_trait::async_trait;

use crate::error::{ProviderError, Result};
use crate::types::{DnsRecord, DnsRecordUpdate, ProbeProgressSender, ProbeReport};

/// 原始 API 错误（内部使用）
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// 错误码（Cloudflare 为数字字符串）
    pub code: Option<String>,
    /// 原始错误消息
    pub message: String,
}

impl RawApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// 错误上下文信息（内部使用）
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    /// 记录名称
    pub record_name: Option<String>,
    /// 记录 ID（用于 `RecordNotFound`）
    pub record_id: Option<String>,
    /// 域名（用于 `DomainNotFound`）
    pub domain: Option<String>,
}

impl ErrorContext {
    pub fn for_record(record_id: &str, record_name: &str) -> Self {
        Self {
            record_name: Some(record_name.to_string()),
            record_id: Some(record_id.to_string()),
            domain: None,
        }
    }

    pub fn for_domain(domain: &str) -> Self {
        Self {
            domain: Some(domain.to_string()),
            ..Self::default()
        }
    }
}

/// 错误映射 Trait（内部使用）
pub(crate) trait ProviderErrorMapper {
    /// 返回远端服务标识符
    fn provider_name(&self) -> &'static str;

    /// 将原始 API 错误映射到统一错误类型
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError;

    fn network_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::NetworkError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    fn parse_error(&self, detail: impl ToString) -> ProviderError {
        ProviderError::ParseError {
            provider: self.provider_name().to_string(),
            detail: detail.to_string(),
        }
    }

    fn unknown_error(&self, raw: RawApiError) -> ProviderError {
        ProviderError::Unknown {
            provider: self.provider_name().to_string(),
            raw_code: raw.code,
            raw_message: raw.message,
        }
    }
}

/// DNS commit gateway.
///
/// The failover engine only ever calls [`update_record`](Self::update_record);
/// the lookups fill in zone and record ids when domains are renamed or imported.
#[async_trait]
pub trait DnsCommitGateway: Send + Sync {
    /// Gateway identifier, used in logs.
    fn id(&self) -> &'static str;

    /// Set a record's content by ID. Repeating the same update is harmless.
    async fn update_record(&self, req: &DnsRecordUpdate) -> Result<DnsRecord>;

    /// Resolve a zone ID from its apex name (e.g. `example.com`).
    async fn find_zone_id(&self, zone_name: &str) -> Result<String>;

    /// Find the first record with exactly this fully-qualified name.
    async fn find_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>>;
}

/// Remote reachability probe: "given host:port, report reachable or not
/// after up to five timed attempts".
///
/// `Err` means the probe infrastructure itself failed and carries no
/// information about the target.
#[async_trait]
pub trait ReachabilityProber: Send + Sync {
    /// Probe `target:port`, forwarding per-attempt progress when a sender is given.
    async fn probe(
        &self,
        target: &str,
        port: u16,
        progress: Option<&ProbeProgressSender>,
    ) -> Result<ProbeReport>;

    /// Resolve `target` to an IP without connecting.
    async fn resolve_ip(&self, target: &str) -> Result<ProbeReport>;
}
