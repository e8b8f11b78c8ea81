//! Cloudflare HTTP 请求方法

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, Result};
use crate::http_client::HttpUtils;
use crate::traits::{ErrorContext, ProviderErrorMapper, RawApiError};

use super::{CloudflareProvider, CloudflareResponse};

impl CloudflareProvider {
    /// Send one API call and unwrap the `{success, result, errors}` envelope.
    pub(crate) async fn call<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        context: ErrorContext,
    ) -> Result<CloudflareResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.api_base);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| {
                ProviderError::SerializationError {
                    provider: self.provider_name().to_string(),
                    detail: e.to_string(),
                }
            })?;
            log::debug!("Request Body: {json}");
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(json);
        }

        let (status, text) = HttpUtils::execute_request_with_retry(
            request,
            self.provider_name(),
            method.as_str(),
            path,
            self.max_retries,
        )
        .await?;

        let envelope: CloudflareResponse<T> = HttpUtils::parse_json(&text, self.provider_name())
            .map_err(|e| {
                // Non-JSON error pages (proxies, 5xx HTML)
                if status >= 400 {
                    ProviderError::BackendStatus {
                        provider: self.provider_name().to_string(),
                        status,
                        detail: e.to_string(),
                    }
                } else {
                    e
                }
            })?;

        if !envelope.success {
            let (code, message) = envelope.first_error();
            log::error!("API 错误: [{code}] {message}");
            return Err(self.map_error(RawApiError::with_code(code, message), context));
        }

        Ok(envelope)
    }

    /// [`call`](Self::call) for endpoints whose `result` must be present.
    pub(crate) async fn call_result<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        context: ErrorContext,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call(method, path, body, context)
            .await?
            .result
            .ok_or_else(|| self.parse_error("响应中缺少 result 字段"))
    }
}
