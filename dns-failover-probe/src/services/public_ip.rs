//! Public IP discovery with a short-lived cache.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{ProbeError, ProbeResult};

pub(crate) const IPINFO_URL: &str = "https://ipinfo.io/json";
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Deserialize)]
struct IpInfoResponse {
    ip: String,
}

/// The backend's own public address, refreshed at most every ten minutes.
pub(crate) struct PublicIpCache {
    client: reqwest::Client,
    url: String,
    cached: RwLock<Option<(Instant, String)>>,
}

impl PublicIpCache {
    pub(crate) fn new(url: impl Into<String>) -> ProbeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| ProbeError::NetworkError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            cached: RwLock::new(None),
        })
    }

    /// Cached address, or a fresh lookup. Empty when the lookup fails.
    pub(crate) async fn get(&self) -> String {
        if let Some((at, ip)) = self.cached.read().await.as_ref()
            && at.elapsed() < CACHE_TTL
        {
            return ip.clone();
        }

        match self.fetch().await {
            Ok(ip) => {
                *self.cached.write().await = Some((Instant::now(), ip.clone()));
                ip
            }
            Err(e) => {
                log::warn!("Public IP lookup failed: {e}");
                String::new()
            }
        }
    }

    async fn fetch(&self) -> ProbeResult<String> {
        let response: IpInfoResponse = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProbeError::NetworkError(format!("Request failed: {e}")))?
            .json()
            .await
            .map_err(|e| ProbeError::NetworkError(format!("Failed to parse response: {e}")))?;
        Ok(response.ip)
    }
}
