//! `SeaORM` entity for the `forward_records` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "forward_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub domain_record_id: i64,
    pub forward_domain: String,
    pub ip: String,
    pub isp: String,
    pub is_ban: bool,
    /// Unix seconds; `0` with `is_ban` set is a permanent ban.
    pub ban_time: i64,
    pub weight: i32,
    pub sort_order: i32,
    pub record_type: String,
    pub last_resolved_at: i64,
    pub resolve_status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
