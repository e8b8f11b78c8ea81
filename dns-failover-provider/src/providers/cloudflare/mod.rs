//! Cloudflare DNS commit gateway

mod error;
mod http;
mod provider;
mod types;

use reqwest::Client;

use crate::error::Result;
use crate::providers::common::{HttpClientOptions, create_http_client};

pub(crate) use types::{CloudflareDnsRecord, CloudflareRecordBody, CloudflareResponse, CloudflareZone};

pub(crate) const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
/// 默认重试次数
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Cloudflare API v4 client authenticated with a bearer token.
pub struct CloudflareProvider {
    pub(crate) client: Client,
    pub(crate) api_token: String,
    pub(crate) api_base: String,
    pub(crate) max_retries: u32,
}

impl CloudflareProvider {
    pub fn new(api_token: String, options: &HttpClientOptions) -> Result<Self> {
        Ok(Self {
            client: create_http_client(options)?,
            api_token,
            api_base: CF_API_BASE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Point the client at a different API root (staging, local mock).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
