//! DNS Failover Core Library
//!
//! Core business logic of the DNS failover controller:
//! - Ban ledger and candidate selection
//! - Failover engine (probe primaries, switch DNS to the best healthy forward)
//! - Scheduler with a single-flight guard and the notification reporter
//! - Admin, domain and import/export services
//!
//! Storage, probing, DNS writes and notification delivery are abstracted
//! behind traits; the platform layer injects implementations through
//! [`ServiceContext`].

pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use services::{
    AdminService, DomainService, FailoverEngine, FailoverSettings, ImportExportService,
    InfraFailureCounter, Reporter, Scheduler, ServiceContext,
};
pub use traits::{
    AdminRepository, DnsCommitGateway, DomainRepository, NotificationSink, ReachabilityProber,
};
