//! `SeaORM` entity for the `domain_records` table.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "domain_records")]
/// Database row model for a managed `domain:port`.
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub domain: String,
    pub port: i32,
    pub record_id: String,
    pub zone_id: String,
    pub is_disable_check: bool,
    pub sort_order: i32,
    /// Unix seconds.
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
