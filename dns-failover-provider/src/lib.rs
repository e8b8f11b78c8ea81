//! # dns-failover-provider
//!
//! Remote capabilities consumed by the DNS failover controller.
//!
//! | Capability | Trait | Implementation |
//! |------------|-------|----------------|
//! | Commit a record's content | [`DnsCommitGateway`] | [`CloudflareProvider`] (API v4, bearer token) |
//! | Probe `host:port` reachability | [`ReachabilityProber`] | [`CheckBackendClient`] (NDJSON over HTTP) |
//!
//! ## TLS Backend
//!
//! - **`rustls`** *(default)*
//! - **`native-tls`**: use the platform's native TLS implementation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dns_failover_provider::{
//!     CheckBackendClient, CloudflareProvider, DnsCommitGateway, DnsRecordUpdate,
//!     HttpClientOptions, ReachabilityProber, RecordKind,
//! };
//!
//! # async fn example() -> dns_failover_provider::Result<()> {
//! let options = HttpClientOptions::default();
//! let prober = CheckBackendClient::new("http://127.0.0.1:8080", "shared-key", &options)?;
//! let report = prober.probe("edge-1.example.net", 443, None).await?;
//!
//! if report.reachable {
//!     let gateway = CloudflareProvider::new("cf-token".to_string(), &options)?;
//!     gateway
//!         .update_record(&DnsRecordUpdate {
//!             zone_id: "zone".to_string(),
//!             record_id: "record".to_string(),
//!             kind: RecordKind::A,
//!             name: "api.example.com".to_string(),
//!             content: report.target_ip,
//!             ttl: 60,
//!             proxied: false,
//!         })
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, ProviderError>`](ProviderError).
//! Transient errors (`NetworkError`, `Timeout`, `RateLimited`) are retried with
//! exponential backoff where the call is safe to repeat. Streamed probes are
//! never retried: an `Err` from [`ReachabilityProber::probe`] is an
//! infrastructure failure and says nothing about the target.

mod error;
mod http_client;
mod providers;
mod traits;
mod types;

pub use error::{ProviderError, Result};

pub use traits::{DnsCommitGateway, ReachabilityProber};

pub use types::{
    DnsRecord, DnsRecordUpdate, ProbeProgress, ProbeProgressSender, ProbeReport,
    RecordKind,
};

pub use providers::common::{
    HttpClientOptions, create_http_client, normalize_domain_name, root_domain,
};
pub use providers::{
    BackendEnvelope, BackendLine, CODE_PROGRESS, CODE_RESULT, CheckBackendClient,
    CloudflareProvider, ProbeRequestBody,
};
