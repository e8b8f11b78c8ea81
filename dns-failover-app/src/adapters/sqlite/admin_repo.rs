//! `AdminRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use sea_orm::{
    ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};

use dns_failover_core::error::CoreResult;
use dns_failover_core::traits::AdminRepository;
use dns_failover_core::types::Admin;

use super::entity::telegram_admin;
use super::{SqliteStore, db_error, timestamp};

impl telegram_admin::Model {
    fn into_admin(self) -> CoreResult<Admin> {
        Ok(Admin {
            uid: self.uid,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            remark: self.remark,
            added_by: self.added_by,
            is_ban: self.is_ban,
            created_at: timestamp(self.created_at, "created_at")?,
            updated_at: timestamp(self.updated_at, "updated_at")?,
        })
    }
}

fn admin_to_active_model(admin: &Admin) -> telegram_admin::ActiveModel {
    telegram_admin::ActiveModel {
        id: NotSet,
        uid: Set(admin.uid),
        username: Set(admin.username.clone()),
        first_name: Set(admin.first_name.clone()),
        last_name: Set(admin.last_name.clone()),
        role: Set(admin.role.clone()),
        remark: Set(admin.remark.clone()),
        added_by: Set(admin.added_by),
        is_ban: Set(admin.is_ban),
        created_at: Set(admin.created_at.timestamp()),
        updated_at: Set(admin.updated_at.timestamp()),
    }
}

#[async_trait]
impl AdminRepository for SqliteStore {
    async fn find(&self, uid: i64) -> CoreResult<Option<Admin>> {
        telegram_admin::Entity::find()
            .filter(telegram_admin::Column::Uid.eq(uid))
            .one(&self.db)
            .await
            .map_err(db_error("query admin"))?
            .map(telegram_admin::Model::into_admin)
            .transpose()
    }

    async fn list(&self) -> CoreResult<Vec<Admin>> {
        let rows = telegram_admin::Entity::find()
            .order_by_asc(telegram_admin::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error("query admins"))?;

        rows.into_iter()
            .map(telegram_admin::Model::into_admin)
            .collect()
    }

    async fn save(&self, admin: &Admin) -> CoreResult<()> {
        telegram_admin::Entity::insert(admin_to_active_model(admin))
            .on_conflict(
                OnConflict::column(telegram_admin::Column::Uid)
                    .update_columns([
                        telegram_admin::Column::Username,
                        telegram_admin::Column::FirstName,
                        telegram_admin::Column::LastName,
                        telegram_admin::Column::Role,
                        telegram_admin::Column::Remark,
                        telegram_admin::Column::AddedBy,
                        telegram_admin::Column::IsBan,
                        telegram_admin::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .map_err(db_error("save admin"))?;
        Ok(())
    }

    async fn delete(&self, uid: i64) -> CoreResult<()> {
        telegram_admin::Entity::delete_many()
            .filter(telegram_admin::Column::Uid.eq(uid))
            .exec(&self.db)
            .await
            .map_err(db_error("delete admin"))?;
        Ok(())
    }
}
