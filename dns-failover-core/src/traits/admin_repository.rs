//! 管理员持久化抽象 Trait

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::Admin;

/// 管理员仓库 Trait
#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find(&self, uid: i64) -> CoreResult<Option<Admin>>;

    /// All known users, banned included, ordered by creation.
    async fn list(&self) -> CoreResult<Vec<Admin>>;

    /// Insert or update by `uid`.
    async fn save(&self, admin: &Admin) -> CoreResult<()>;

    async fn delete(&self, uid: i64) -> CoreResult<()>;
}
