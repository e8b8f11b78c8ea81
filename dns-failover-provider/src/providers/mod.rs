//! Remote service clients

/// Shared utilities used by the clients.
pub mod common;

mod check_backend;
mod cloudflare;

pub use check_backend::{
    BackendEnvelope, BackendLine, CODE_PROGRESS, CODE_RESULT, CheckBackendClient,
    ProbeRequestBody,
};
pub use cloudflare::CloudflareProvider;
