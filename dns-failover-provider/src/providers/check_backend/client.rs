//! Check backend 客户端（`ReachabilityProber` 实现）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{ProviderError, Result};
use crate::http_client::{HttpUtils, transport_error, truncate_for_log};
use crate::providers::common::{HttpClientOptions, create_http_client};
use crate::traits::{ErrorContext, ProviderErrorMapper, ReachabilityProber, RawApiError};
use crate::types::{ProbeProgressSender, ProbeReport};

use super::types::{BackendEnvelope, BackendLine, ProbeRequestBody};

const PROVIDER: &str = "check-backend";
/// Five 1s attempts with 1s spacing, plus resolution and transport slack.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 2;

/// HTTP client for a remote check backend.
///
/// `probe` reads the NDJSON stream line by line so progress reaches the
/// caller while attempts are still running.
pub struct CheckBackendClient {
    client: Client,
    api_base: String,
    key: String,
    probe_timeout: Duration,
    max_retries: u32,
}

impl CheckBackendClient {
    pub fn new(
        api_base: impl Into<String>,
        key: impl Into<String>,
        options: &HttpClientOptions,
    ) -> Result<Self> {
        Ok(Self {
            client: create_http_client(options)?,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            key: key.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Upper bound for one whole streamed probe.
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Retries for `resolve_ip`. Probes are never retried at the HTTP layer.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn request_body(&self, target: &str, port: u16) -> ProbeRequestBody {
        ProbeRequestBody {
            target: target.to_string(),
            port,
            key: self.key.clone(),
        }
    }

    /// Map a non-2xx response to an error, reading the backend envelope when present.
    fn status_error(&self, status: u16, body: &str) -> ProviderError {
        let raw = serde_json::from_str::<BackendEnvelope<serde_json::Value>>(body).map_or_else(
            |_| RawApiError::new(truncate_for_log(body)),
            |env| RawApiError::with_code(env.code.to_string(), env.message),
        );

        match status {
            401 | 400 => self.map_error(
                RawApiError::with_code(status.to_string(), raw.message),
                ErrorContext::default(),
            ),
            _ => ProviderError::BackendStatus {
                provider: PROVIDER.to_string(),
                status,
                detail: raw.message,
            },
        }
    }

    /// Handle one raw line. Returns the report once the terminal line arrives.
    fn handle_line(
        &self,
        raw: &[u8],
        target: &str,
        progress: Option<&ProbeProgressSender>,
    ) -> Result<Option<ProbeReport>> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| self.parse_error(e))?
            .trim();
        if text.is_empty() {
            return Ok(None);
        }

        match BackendLine::parse(text).map_err(|e| {
            log::error!(
                "[{PROVIDER}] bad line for {target}: {e}; raw: {}",
                truncate_for_log(text)
            );
            self.parse_error(e)
        })? {
            BackendLine::Progress(p) => {
                log::debug!(
                    "[{PROVIDER}] {target} attempt {}/{} -> {}",
                    p.current,
                    p.total,
                    p.address
                );
                if let Some(tx) = progress {
                    // Receiver gone only means nobody is watching any more
                    let _ = tx.send(p);
                }
                Ok(None)
            }
            BackendLine::Result(report) => Ok(Some(report)),
            BackendLine::Error { code, message } => Err(self.map_error(
                RawApiError::with_code(code.to_string(), message),
                ErrorContext::for_domain(target),
            )),
        }
    }

    async fn stream_probe(
        &self,
        target: &str,
        port: u16,
        progress: Option<&ProbeProgressSender>,
    ) -> Result<ProbeReport> {
        let url = format!("{}/api/v1/tcp_checks", self.api_base);
        log::debug!("[{PROVIDER}] POST {url} ({target}:{port})");

        let mut response = self
            .client
            .post(&url)
            .json(&self.request_body(target, port))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, &body));
        }

        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?
        {
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(report) = self.handle_line(&line, target, progress)? {
                    return Ok(report);
                }
            }
        }

        // Last line may lack its newline
        if let Some(report) = self.handle_line(&buffer, target, progress)? {
            return Ok(report);
        }

        Err(self.parse_error(format!(
            "stream for {target}:{port} ended without a result line"
        )))
    }
}

impl ProviderErrorMapper for CheckBackendClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> ProviderError {
        match raw.code.as_deref() {
            Some("401") => ProviderError::InvalidCredentials {
                provider: PROVIDER.to_string(),
                raw_message: Some(raw.message),
            },
            Some("400") => ProviderError::InvalidParameter {
                provider: PROVIDER.to_string(),
                param: context.domain.unwrap_or_else(|| "body".to_string()),
                detail: raw.message,
            },
            _ => self.unknown_error(raw),
        }
    }
}

#[async_trait]
impl ReachabilityProber for CheckBackendClient {
    async fn probe(
        &self,
        target: &str,
        port: u16,
        progress: Option<&ProbeProgressSender>,
    ) -> Result<ProbeReport> {
        let report = tokio::time::timeout(
            self.probe_timeout,
            self.stream_probe(target, port, progress),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            provider: PROVIDER.to_string(),
            detail: format!(
                "probe of {target}:{port} exceeded {}s",
                self.probe_timeout.as_secs()
            ),
        })??;

        log::info!(
            "[{PROVIDER}] {target}:{port} reachable={} ip={} {}",
            report.reachable,
            report.target_ip,
            report.message
        );
        Ok(report)
    }

    async fn resolve_ip(&self, target: &str) -> Result<ProbeReport> {
        let url = format!("{}/api/v1/resolve_ip", self.api_base);
        let request = self.client.post(&url).json(&self.request_body(target, 0));

        let (status, text) =
            HttpUtils::execute_request_with_retry(request, PROVIDER, "POST", &url, self.max_retries)
                .await?;
        if status >= 400 {
            return Err(self.status_error(status, &text));
        }

        // The endpoint answers with a single terminal line
        let line = text
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default();
        self.handle_line(line.as_bytes(), target, None)?
            .ok_or_else(|| self.parse_error("resolve_ip answered without a result line"))
    }
}
