//! 管理员服务

use std::sync::Arc;

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::types::{Access, Admin, ChatUser, ROLE_ADMIN, Registration};

/// 管理员服务
pub struct AdminService {
    ctx: Arc<ServiceContext>,
}

impl AdminService {
    /// 创建管理员服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    fn is_super_admin(&self, uid: i64) -> bool {
        let super_admin = self.ctx.settings.super_admin_id;
        super_admin != 0 && uid == super_admin
    }

    /// 查询用户权限
    pub async fn access(&self, uid: i64) -> CoreResult<Access> {
        if self.is_super_admin(uid) {
            return Ok(Access::SuperAdmin);
        }
        Ok(match self.ctx.admin_repository.find(uid).await? {
            Some(admin) if admin.is_ban => Access::Banned,
            Some(_) => Access::Admin,
            None => Access::Unknown,
        })
    }

    /// Any active admin, super admin included.
    pub async fn require_admin(&self, uid: i64) -> CoreResult<Access> {
        let access = self.access(uid).await?;
        if access.is_active() {
            Ok(access)
        } else {
            Err(CoreError::PermissionDenied(format!(
                "user {uid} is not an active admin"
            )))
        }
    }

    pub fn require_super_admin(&self, uid: i64) -> CoreResult<()> {
        if self.is_super_admin(uid) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(
                "only the super admin can manage admins".to_string(),
            ))
        }
    }

    /// Self-registration. New users are stored banned until approved;
    /// existing rows are never overwritten.
    pub async fn register(&self, user: &ChatUser) -> CoreResult<Registration> {
        if self.is_super_admin(user.uid) {
            return Ok(Registration::SuperAdmin);
        }
        if let Some(existing) = self.ctx.admin_repository.find(user.uid).await? {
            return Ok(Registration::Existing(existing));
        }

        let now = Utc::now();
        let admin = Admin {
            uid: user.uid,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: ROLE_ADMIN.to_string(),
            remark: String::new(),
            added_by: 0,
            is_ban: true,
            created_at: now,
            updated_at: now,
        };
        self.ctx.admin_repository.save(&admin).await?;
        log::info!("New user {} registered, pending approval", admin.display_name());
        Ok(Registration::Pending(admin))
    }

    /// 列出所有管理员
    pub async fn list(&self, actor: i64) -> CoreResult<Vec<Admin>> {
        self.require_super_admin(actor)?;
        self.ctx.admin_repository.list().await
    }

    async fn require_target(&self, uid: i64) -> CoreResult<Admin> {
        self.ctx
            .admin_repository
            .find(uid)
            .await?
            .ok_or_else(|| CoreError::AdminNotFound(uid.to_string()))
    }

    fn protect_super_admin(&self, uid: i64, action: &str) -> CoreResult<()> {
        if self.is_super_admin(uid) {
            return Err(CoreError::PermissionDenied(format!(
                "the super admin cannot be {action}"
            )));
        }
        Ok(())
    }

    /// Ban or approve an admin. Approving records the approver.
    pub async fn set_banned(&self, actor: i64, uid: i64, banned: bool) -> CoreResult<Admin> {
        self.require_super_admin(actor)?;
        self.protect_super_admin(uid, "banned")?;
        let mut admin = self.require_target(uid).await?;

        admin.is_ban = banned;
        if !banned && admin.added_by == 0 {
            admin.added_by = actor;
        }
        admin.updated_at = Utc::now();
        self.ctx.admin_repository.save(&admin).await?;

        log::info!(
            "Admin {} {} by {actor}",
            admin.display_name(),
            if banned { "banned" } else { "approved" }
        );
        Ok(admin)
    }

    pub async fn delete(&self, actor: i64, uid: i64) -> CoreResult<Admin> {
        self.require_super_admin(actor)?;
        self.protect_super_admin(uid, "deleted")?;
        let admin = self.require_target(uid).await?;
        self.ctx.admin_repository.delete(uid).await?;
        log::info!("Admin {} deleted by {actor}", admin.display_name());
        Ok(admin)
    }

    pub async fn set_remark(&self, actor: i64, uid: i64, remark: &str) -> CoreResult<Admin> {
        self.require_super_admin(actor)?;
        let mut admin = self.require_target(uid).await?;
        admin.remark = remark.trim().to_string();
        admin.updated_at = Utc::now();
        self.ctx.admin_repository.save(&admin).await?;
        Ok(admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SUPER_ADMIN_ID, create_test_harness, seed_admin};

    fn user(uid: i64) -> ChatUser {
        ChatUser {
            uid,
            username: format!("user{uid}"),
            first_name: "Test".to_string(),
            last_name: String::new(),
        }
    }

    #[tokio::test]
    async fn super_admin_is_always_active() {
        let harness = create_test_harness();
        let service = AdminService::new(harness.ctx.clone());

        assert_eq!(service.access(SUPER_ADMIN_ID).await.unwrap(), Access::SuperAdmin);
        assert!(service.require_admin(SUPER_ADMIN_ID).await.is_ok());
        assert!(matches!(
            service.register(&user(SUPER_ADMIN_ID)).await.unwrap(),
            Registration::SuperAdmin
        ));
    }

    #[tokio::test]
    async fn register_creates_pending_admin() {
        let harness = create_test_harness();
        let service = AdminService::new(harness.ctx.clone());

        let registration = service.register(&user(42)).await.unwrap();

        assert!(matches!(registration, Registration::Pending(ref a) if a.is_ban && a.role == ROLE_ADMIN));
        assert_eq!(service.access(42).await.unwrap(), Access::Banned);
        assert!(matches!(
            service.require_admin(42).await,
            Err(CoreError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn register_never_overwrites() {
        let harness = create_test_harness();
        seed_admin(&harness.admins, 42, false).await;
        let service = AdminService::new(harness.ctx.clone());

        let registration = service.register(&user(42)).await.unwrap();

        assert!(matches!(registration, Registration::Existing(ref a) if !a.is_ban));
        assert_eq!(service.access(42).await.unwrap(), Access::Admin);
    }

    #[tokio::test]
    async fn only_super_admin_manages_admins() {
        let harness = create_test_harness();
        seed_admin(&harness.admins, 42, false).await;
        seed_admin(&harness.admins, 43, true).await;
        let service = AdminService::new(harness.ctx.clone());

        assert!(matches!(service.list(42).await, Err(CoreError::PermissionDenied(_))));
        assert!(matches!(
            service.set_banned(42, 43, false).await,
            Err(CoreError::PermissionDenied(_))
        ));

        let approved = service.set_banned(SUPER_ADMIN_ID, 43, false).await.unwrap();
        assert!(!approved.is_ban);
        assert_eq!(approved.added_by, SUPER_ADMIN_ID);
        assert_eq!(service.list(SUPER_ADMIN_ID).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn super_admin_cannot_be_banned_or_deleted() {
        let harness = create_test_harness();
        let service = AdminService::new(harness.ctx.clone());

        assert!(matches!(
            service.set_banned(SUPER_ADMIN_ID, SUPER_ADMIN_ID, true).await,
            Err(CoreError::PermissionDenied(_))
        ));
        assert!(matches!(
            service.delete(SUPER_ADMIN_ID, SUPER_ADMIN_ID).await,
            Err(CoreError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn delete_and_remark() {
        let harness = create_test_harness();
        seed_admin(&harness.admins, 42, false).await;
        let service = AdminService::new(harness.ctx.clone());

        let admin = service.set_remark(SUPER_ADMIN_ID, 42, "  ops on-call ").await.unwrap();
        assert_eq!(admin.remark, "ops on-call");

        service.delete(SUPER_ADMIN_ID, 42).await.unwrap();
        assert_eq!(service.access(42).await.unwrap(), Access::Unknown);
        assert!(matches!(
            service.delete(SUPER_ADMIN_ID, 42).await,
            Err(CoreError::AdminNotFound(_))
        ));
    }
}
