//! 域名与转发持久化抽象 Trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::types::{Domain, Forward, NewDomain, NewForward, ResolveStatus};

/// 主域名 / 转发域名仓库 Trait
///
/// 平台实现:
/// - `SeaORM` + `SQLite`: `SqliteStore`
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// All domains ordered by `sort_order`, then `id`.
    async fn list_domains(&self) -> CoreResult<Vec<Domain>>;

    async fn find_domain(&self, id: i64) -> CoreResult<Option<Domain>>;

    /// Lookup by the unique `(domain, port)` pair.
    async fn find_domain_by_name_port(&self, domain: &str, port: u16)
    -> CoreResult<Option<Domain>>;

    /// # Errors
    /// `DuplicateDomain` when `(domain, port)` already exists.
    async fn insert_domain(&self, domain: &NewDomain) -> CoreResult<Domain>;

    /// Full-row update keyed by `domain.id`; refreshes `updated_at`.
    async fn update_domain(&self, domain: &Domain) -> CoreResult<()>;

    /// Delete a domain and its forwards in one transaction.
    async fn delete_domain(&self, id: i64) -> CoreResult<()>;

    /// Forwards of a domain in selector order:
    /// `weight` desc, `sort_order` asc, `id` asc.
    async fn list_forwards(&self, domain_id: i64) -> CoreResult<Vec<Forward>>;

    async fn find_forward(&self, id: i64) -> CoreResult<Option<Forward>>;

    async fn insert_forward(&self, forward: &NewForward) -> CoreResult<Forward>;

    /// Write the admin-editable columns of `forward.id` (name, ip, isp,
    /// weight, sort order, record type); refreshes `updated_at`.
    ///
    /// Ban state and resolve status are never written here. A check cycle
    /// may change them while an admin edit is in flight.
    async fn update_forward(&self, forward: &Forward) -> CoreResult<()>;

    /// Ban `id` until `until` and set `status`, unless the stored ban
    /// already lasts at least as long (or is permanent).
    ///
    /// Returns whether the row changed.
    async fn extend_ban(
        &self,
        id: i64,
        until: DateTime<Utc>,
        status: ResolveStatus,
    ) -> CoreResult<bool>;

    /// Clear the ban of `id`. With `expired_at`, only a timed ban ending at
    /// or before that instant is lifted.
    ///
    /// Returns whether the row changed.
    async fn lift_ban(&self, id: i64, expired_at: Option<DateTime<Utc>>) -> CoreResult<bool>;

    async fn set_resolve_status(&self, id: i64, status: ResolveStatus) -> CoreResult<()>;

    async fn set_forward_ip(&self, id: i64, ip: &str) -> CoreResult<()>;

    async fn delete_forward(&self, id: i64) -> CoreResult<()>;

    /// Mark `forward_id` as the active target (`success`, new IP, resolved
    /// at `at`) and reset every sibling to `never`, atomically.
    async fn activate_forward(
        &self,
        domain_id: i64,
        forward_id: i64,
        ip: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<()>;
}
