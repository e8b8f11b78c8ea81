//! 公共工具函数

use std::time::Duration;

use reqwest::Client;

use crate::error::{ProviderError, Result};

// ============ HTTP Client ============

/// 默认连接超时（秒）
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// 默认请求超时（秒）
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Outbound HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` disables it (used for streamed probes).
    pub request_timeout: Option<Duration>,
    /// `http://`, `https://` or `socks5://` proxy URL.
    pub proxy: Option<String>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            proxy: None,
        }
    }
}

/// 创建带超时配置的 HTTP Client
pub fn create_http_client(options: &HttpClientOptions) -> Result<Client> {
    let mut builder = Client::builder().connect_timeout(options.connect_timeout);
    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(proxy_url) = options.proxy.as_deref().filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| ProviderError::InvalidParameter {
            provider: "http".to_string(),
            param: "proxy".to_string(),
            detail: e.to_string(),
        })?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|e| ProviderError::NetworkError {
        provider: "http".to_string(),
        detail: format!("Failed to build HTTP client: {e}"),
    })
}

// ============ 域名名称处理 ============

/// 去掉域名末尾的点并转为小写
pub fn normalize_domain_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Apex zone name of a hostname: its last two labels.
///
/// `api.eu.example.com` -> `example.com`. Names with fewer than two labels
/// are returned unchanged. Multi-part public suffixes (`example.co.uk`) are
/// not special-cased.
pub fn root_domain(name: &str) -> String {
    let normalized = normalize_domain_name(name);
    let labels: Vec<&str> = normalized.split('.').collect();
    if labels.len() <= 2 {
        return normalized;
    }
    labels[labels.len() - 2..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_domain_takes_last_two_labels() {
        assert_eq!(root_domain("api.eu.example.com"), "example.com");
        assert_eq!(root_domain("www.example.com."), "example.com");
        assert_eq!(root_domain("Example.COM"), "example.com");
        assert_eq!(root_domain("localhost"), "localhost");
    }

    #[test]
    fn client_builds_without_proxy() {
        assert!(create_http_client(&HttpClientOptions::default()).is_ok());
    }

    #[test]
    fn empty_proxy_is_ignored() {
        let options = HttpClientOptions {
            proxy: Some(String::new()),
            ..HttpClientOptions::default()
        };
        assert!(create_http_client(&options).is_ok());
    }
}
