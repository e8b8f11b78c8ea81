//! `DomainRepository` implementation for `SqliteStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, Condition, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};

use dns_failover_core::error::{CoreError, CoreResult};
use dns_failover_core::traits::DomainRepository;
use dns_failover_core::types::{Domain, Forward, NewDomain, NewForward, ResolveStatus};
use dns_failover_core::utils::datetime::{from_unix_opt, to_unix};

use super::entity::{domain_record, forward_record};
use super::{SqliteStore, db_error, timestamp};

impl domain_record::Model {
    fn into_domain(self) -> CoreResult<Domain> {
        let port = u16::try_from(self.port)
            .map_err(|_| CoreError::SerializationError(format!("Invalid port: {}", self.port)))?;
        Ok(Domain {
            id: self.id,
            domain: self.domain,
            port,
            record_id: self.record_id,
            zone_id: self.zone_id,
            is_disable_check: self.is_disable_check,
            sort_order: self.sort_order,
            created_at: timestamp(self.created_at, "created_at")?,
            updated_at: timestamp(self.updated_at, "updated_at")?,
        })
    }
}

impl forward_record::Model {
    fn into_forward(self) -> CoreResult<Forward> {
        let record_type = self.record_type.parse().map_err(|_| {
            CoreError::SerializationError(format!("Invalid record_type: {}", self.record_type))
        })?;
        let resolve_status = self.resolve_status.parse::<ResolveStatus>()?;
        Ok(Forward {
            id: self.id,
            domain_id: self.domain_record_id,
            forward_domain: self.forward_domain,
            ip: self.ip,
            isp: self.isp,
            is_ban: self.is_ban,
            ban_until: from_unix_opt(self.ban_time),
            weight: self.weight,
            sort_order: self.sort_order,
            record_type,
            last_resolved_at: from_unix_opt(self.last_resolved_at),
            resolve_status,
            created_at: timestamp(self.created_at, "created_at")?,
            updated_at: timestamp(self.updated_at, "updated_at")?,
        })
    }
}

fn domain_to_active_model(domain: &Domain, now: DateTime<Utc>) -> domain_record::ActiveModel {
    domain_record::ActiveModel {
        id: Set(domain.id),
        domain: Set(domain.domain.clone()),
        port: Set(i32::from(domain.port)),
        record_id: Set(domain.record_id.clone()),
        zone_id: Set(domain.zone_id.clone()),
        is_disable_check: Set(domain.is_disable_check),
        sort_order: Set(domain.sort_order),
        created_at: Set(domain.created_at.timestamp()),
        updated_at: Set(now.timestamp()),
    }
}

/// Admin-editable columns only; ban and status columns stay `NotSet`.
fn forward_to_active_model(forward: &Forward, now: DateTime<Utc>) -> forward_record::ActiveModel {
    forward_record::ActiveModel {
        id: Set(forward.id),
        forward_domain: Set(forward.forward_domain.clone()),
        ip: Set(forward.ip.clone()),
        isp: Set(forward.isp.clone()),
        weight: Set(forward.weight),
        sort_order: Set(forward.sort_order),
        record_type: Set(forward.record_type.as_str().to_string()),
        updated_at: Set(now.timestamp()),
        ..Default::default()
    }
}

#[async_trait]
impl DomainRepository for SqliteStore {
    async fn list_domains(&self) -> CoreResult<Vec<Domain>> {
        let rows = domain_record::Entity::find()
            .order_by_asc(domain_record::Column::SortOrder)
            .order_by_asc(domain_record::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error("query domains"))?;

        rows.into_iter()
            .map(domain_record::Model::into_domain)
            .collect()
    }

    async fn find_domain(&self, id: i64) -> CoreResult<Option<Domain>> {
        domain_record::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error("query domain"))?
            .map(domain_record::Model::into_domain)
            .transpose()
    }

    async fn find_domain_by_name_port(
        &self,
        domain: &str,
        port: u16,
    ) -> CoreResult<Option<Domain>> {
        domain_record::Entity::find()
            .filter(domain_record::Column::Domain.eq(domain))
            .filter(domain_record::Column::Port.eq(i32::from(port)))
            .one(&self.db)
            .await
            .map_err(db_error("query domain"))?
            .map(domain_record::Model::into_domain)
            .transpose()
    }

    async fn insert_domain(&self, domain: &NewDomain) -> CoreResult<Domain> {
        if self
            .find_domain_by_name_port(&domain.domain, domain.port)
            .await?
            .is_some()
        {
            return Err(CoreError::DuplicateDomain(format!(
                "{}:{}",
                domain.domain, domain.port
            )));
        }

        let now = Utc::now().timestamp();
        let model = domain_record::ActiveModel {
            id: NotSet,
            domain: Set(domain.domain.clone()),
            port: Set(i32::from(domain.port)),
            record_id: Set(domain.record_id.clone()),
            zone_id: Set(domain.zone_id.clone()),
            is_disable_check: Set(domain.is_disable_check),
            sort_order: Set(domain.sort_order),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(db_error("insert domain"))?;

        model.into_domain()
    }

    async fn update_domain(&self, domain: &Domain) -> CoreResult<()> {
        domain_to_active_model(domain, Utc::now())
            .update(&self.db)
            .await
            .map_err(db_error("update domain"))?;
        Ok(())
    }

    async fn delete_domain(&self, id: i64) -> CoreResult<()> {
        let txn = self.db.begin().await.map_err(db_error("begin transaction"))?;

        let forwards = forward_record::Entity::delete_many()
            .filter(forward_record::Column::DomainRecordId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_error("delete forwards"))?;
        domain_record::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(db_error("delete domain"))?;

        txn.commit().await.map_err(db_error("commit transaction"))?;
        log::debug!(
            "Deleted domain {id} with {} forwards",
            forwards.rows_affected
        );
        Ok(())
    }

    async fn list_forwards(&self, domain_id: i64) -> CoreResult<Vec<Forward>> {
        let rows = forward_record::Entity::find()
            .filter(forward_record::Column::DomainRecordId.eq(domain_id))
            .order_by_desc(forward_record::Column::Weight)
            .order_by_asc(forward_record::Column::SortOrder)
            .order_by_asc(forward_record::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_error("query forwards"))?;

        rows.into_iter()
            .map(forward_record::Model::into_forward)
            .collect()
    }

    async fn find_forward(&self, id: i64) -> CoreResult<Option<Forward>> {
        forward_record::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_error("query forward"))?
            .map(forward_record::Model::into_forward)
            .transpose()
    }

    async fn insert_forward(&self, forward: &NewForward) -> CoreResult<Forward> {
        let now = Utc::now().timestamp();
        let model = forward_record::ActiveModel {
            id: NotSet,
            domain_record_id: Set(forward.domain_id),
            forward_domain: Set(forward.forward_domain.clone()),
            ip: Set(forward.ip.clone()),
            isp: Set(forward.isp.clone()),
            is_ban: Set(forward.is_ban),
            ban_time: Set(to_unix(forward.ban_until)),
            weight: Set(forward.weight),
            sort_order: Set(forward.sort_order),
            record_type: Set(forward.record_type.as_str().to_string()),
            last_resolved_at: Set(0),
            resolve_status: Set(ResolveStatus::Never.as_str().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(db_error("insert forward"))?;

        model.into_forward()
    }

    async fn update_forward(&self, forward: &Forward) -> CoreResult<()> {
        forward_to_active_model(forward, Utc::now())
            .update(&self.db)
            .await
            .map_err(db_error("update forward"))?;
        Ok(())
    }

    async fn extend_ban(
        &self,
        id: i64,
        until: DateTime<Utc>,
        status: ResolveStatus,
    ) -> CoreResult<bool> {
        let until = until.timestamp();
        // ban_time = 0 on a banned row means permanent
        let shorter_or_none = Condition::any()
            .add(forward_record::Column::IsBan.eq(false))
            .add(
                Condition::all()
                    .add(forward_record::Column::BanTime.ne(0))
                    .add(forward_record::Column::BanTime.lt(until)),
            );

        let result = forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                is_ban: Set(true),
                ban_time: Set(until),
                resolve_status: Set(status.as_str().to_string()),
                updated_at: Set(Utc::now().timestamp()),
                ..Default::default()
            })
            .filter(forward_record::Column::Id.eq(id))
            .filter(shorter_or_none)
            .exec(&self.db)
            .await
            .map_err(db_error("ban forward"))?;
        Ok(result.rows_affected > 0)
    }

    async fn lift_ban(&self, id: i64, expired_at: Option<DateTime<Utc>>) -> CoreResult<bool> {
        let mut query = forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                is_ban: Set(false),
                ban_time: Set(0),
                updated_at: Set(Utc::now().timestamp()),
                ..Default::default()
            })
            .filter(forward_record::Column::Id.eq(id));
        if let Some(at) = expired_at {
            query = query
                .filter(forward_record::Column::IsBan.eq(true))
                .filter(forward_record::Column::BanTime.ne(0))
                .filter(forward_record::Column::BanTime.lte(at.timestamp()));
        }

        let result = query
            .exec(&self.db)
            .await
            .map_err(db_error("unban forward"))?;
        Ok(result.rows_affected > 0)
    }

    async fn set_resolve_status(&self, id: i64, status: ResolveStatus) -> CoreResult<()> {
        forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                resolve_status: Set(status.as_str().to_string()),
                updated_at: Set(Utc::now().timestamp()),
                ..Default::default()
            })
            .filter(forward_record::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_error("update forward status"))?;
        Ok(())
    }

    async fn set_forward_ip(&self, id: i64, ip: &str) -> CoreResult<()> {
        forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                ip: Set(ip.to_string()),
                updated_at: Set(Utc::now().timestamp()),
                ..Default::default()
            })
            .filter(forward_record::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(db_error("update forward ip"))?;
        Ok(())
    }

    async fn delete_forward(&self, id: i64) -> CoreResult<()> {
        forward_record::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_error("delete forward"))?;
        Ok(())
    }

    async fn activate_forward(
        &self,
        domain_id: i64,
        forward_id: i64,
        ip: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let ts = at.timestamp();
        let txn = self.db.begin().await.map_err(db_error("begin transaction"))?;

        forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                resolve_status: Set(ResolveStatus::Never.as_str().to_string()),
                updated_at: Set(ts),
                ..Default::default()
            })
            .filter(forward_record::Column::DomainRecordId.eq(domain_id))
            .filter(forward_record::Column::Id.ne(forward_id))
            .exec(&txn)
            .await
            .map_err(db_error("reset sibling forwards"))?;

        forward_record::Entity::update_many()
            .set(forward_record::ActiveModel {
                ip: Set(ip.to_string()),
                resolve_status: Set(ResolveStatus::Success.as_str().to_string()),
                last_resolved_at: Set(ts),
                updated_at: Set(ts),
                ..Default::default()
            })
            .filter(forward_record::Column::Id.eq(forward_id))
            .exec(&txn)
            .await
            .map_err(db_error("activate forward"))?;

        txn.commit().await.map_err(db_error("commit transaction"))?;
        Ok(())
    }
}
