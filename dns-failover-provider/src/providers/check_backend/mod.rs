//! Check backend reachability prober client and its NDJSON wire types

mod client;
mod types;

pub use client::CheckBackendClient;
pub use types::{BackendEnvelope, BackendLine, CODE_PROGRESS, CODE_RESULT, ProbeRequestBody};
