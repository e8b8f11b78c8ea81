//! Storage layer abstraction trait definition

mod admin_repository;
mod domain_repository;
mod notification_sink;

pub use admin_repository::AdminRepository;
pub use domain_repository::DomainRepository;
pub use notification_sink::NotificationSink;

// Remote capabilities live in the provider crate
pub use dns_failover_provider::{DnsCommitGateway, ReachabilityProber};
