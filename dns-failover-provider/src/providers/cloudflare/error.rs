//! Cloudflare error mapping

use crate::error::ProviderError;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::CloudflareProvider;

/// Cloudflare error code mapping
/// Reference: <https://api.cloudflare.com/#getting-started-responses>
impl ProviderErrorMapper for CloudflareProvider {
    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        let provider = self.provider_name().to_string();
        match raw.code.as_deref() {
            // 6003/6103/6111: malformed auth headers
            // 9109: unauthorized / max auth failures
            // 10000: authentication error
            Some("6003" | "6103" | "6111" | "9109" | "10000") => {
                ProviderError::InvalidCredentials {
                    provider,
                    raw_message: Some(raw.message),
                }
            }

            // 9005: A content must be IPv4
            // 9021: invalid TTL
            // 9041: record cannot be proxied
            // 1004: generic DNS validation error
            Some(code @ ("1004" | "9000" | "9005" | "9021" | "9041")) => {
                let param = match code {
                    "9000" => "name",
                    "9005" => "content",
                    "9021" => "ttl",
                    "9041" => "proxied",
                    _ => "general",
                };
                let detail = match context.record_name.filter(|n| !n.is_empty()) {
                    Some(name) => format!("{} ({name})", raw.message),
                    None => raw.message,
                };
                ProviderError::InvalidParameter {
                    provider,
                    param: param.to_string(),
                    detail,
                }
            }

            // 81044: record does not exist
            Some("81044") => ProviderError::RecordNotFound {
                provider,
                record_id: context.record_id.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },

            // 7000/7003: bad zone identifier in the path
            Some("7000" | "7003") => ProviderError::DomainNotFound {
                provider,
                domain: context.domain.unwrap_or_else(|| "<unknown>".to_string()),
                raw_message: Some(raw.message),
            },

            // 9103/10001: token valid but missing Zone.DNS permission
            Some("9103" | "10001") => ProviderError::PermissionDenied {
                provider,
                raw_message: Some(raw.message),
            },

            // 971: rate limited at the API layer
            Some("971") => ProviderError::RateLimited {
                provider,
                retry_after: None,
                raw_message: Some(raw.message),
            },

            _ => self.unknown_error(raw),
        }
    }
}
