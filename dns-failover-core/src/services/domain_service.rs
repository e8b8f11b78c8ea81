//! 主域名与转发域名管理服务

use std::sync::Arc;

use chrono::Utc;
use dns_failover_provider::{normalize_domain_name, root_domain};

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::services::ban_ledger::BanLedger;
use crate::types::{
    Domain, DomainEdit, DomainField, DomainWithForwards, Forward, ForwardField, NewForward,
    RecordKind,
};

/// IP written when the backend cannot resolve a forward.
const UNRESOLVED_IP: &str = "0.0.0.0";

/// Minimum fields in an `add_forward` line: `forward|ip|isp|weight|sort|type`.
const FORWARD_LINE_FIELDS: usize = 6;

/// 主域名与转发域名管理服务
pub struct DomainService {
    ctx: Arc<ServiceContext>,
    ledger: BanLedger,
}

impl DomainService {
    /// 创建服务实例
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let ledger = BanLedger::new(ctx.domain_repository.clone());
        Self { ctx, ledger }
    }

    // ===== 主域名 =====

    /// 列出所有主域名（`sort_order`, `id`）
    pub async fn list_domains(&self) -> CoreResult<Vec<Domain>> {
        self.ctx.domain_repository.list_domains().await
    }

    /// 获取主域名及其转发域名，顺带解除已过期的封禁
    pub async fn get_domain(&self, id: i64) -> CoreResult<DomainWithForwards> {
        let domain = self.ctx.require_domain(id).await?;
        let mut forwards = self.ctx.domain_repository.list_forwards(id).await?;
        self.ledger.release_expired(&mut forwards, Utc::now()).await?;
        Ok(DomainWithForwards { domain, forwards })
    }

    /// 切换是否检测
    pub async fn toggle_check(&self, id: i64) -> CoreResult<Domain> {
        let mut domain = self.ctx.require_domain(id).await?;
        domain.is_disable_check = !domain.is_disable_check;
        self.ctx.domain_repository.update_domain(&domain).await?;
        log::info!(
            "Checking {} for {}",
            if domain.is_disable_check { "disabled" } else { "enabled" },
            domain.address()
        );
        Ok(domain)
    }

    /// 删除主域名及其所有转发域名
    pub async fn delete_domain(&self, id: i64) -> CoreResult<Domain> {
        let domain = self.ctx.require_domain(id).await?;
        self.ctx.domain_repository.delete_domain(id).await?;
        log::info!("Domain {} deleted", domain.address());
        Ok(domain)
    }

    /// 编辑主域名字段
    ///
    /// 修改名称时会重新查询 zone / record id；查询失败则清空 id 并返回警告。
    pub async fn edit_domain(
        &self,
        id: i64,
        field: DomainField,
        value: &str,
    ) -> CoreResult<DomainEdit> {
        let mut domain = self.ctx.require_domain(id).await?;
        let mut warning = None;

        match field {
            DomainField::Name => {
                let name = normalize_domain_name(value);
                validate_hostname(&name)?;
                self.ensure_unique(&name, domain.port, id).await?;
                domain.domain = name;
                match self.lookup_dns_target(&domain.domain).await {
                    Ok((zone_id, record_id)) => {
                        domain.zone_id = zone_id;
                        domain.record_id = record_id;
                    }
                    Err(reason) => {
                        log::warn!("{reason}");
                        domain.zone_id.clear();
                        domain.record_id.clear();
                        warning = Some(reason);
                    }
                }
            }
            DomainField::Port => {
                let port = parse_port(value)?;
                self.ensure_unique(&domain.domain, port, id).await?;
                domain.port = port;
            }
            DomainField::SortOrder => {
                domain.sort_order = parse_int(value, "sort")?;
            }
        }

        self.ctx.domain_repository.update_domain(&domain).await?;
        log::info!("Domain {id} {field} set to {value}");
        Ok(DomainEdit { domain, warning })
    }

    async fn ensure_unique(&self, name: &str, port: u16, id: i64) -> CoreResult<()> {
        match self
            .ctx
            .domain_repository
            .find_domain_by_name_port(name, port)
            .await?
        {
            Some(other) if other.id != id => {
                Err(CoreError::DuplicateDomain(format!("{name}:{port}")))
            }
            _ => Ok(()),
        }
    }

    /// Zone id via the root domain, then record id by exact name.
    /// `Err` carries a human-readable reason.
    pub(crate) async fn lookup_dns_target(&self, name: &str) -> Result<(String, String), String> {
        let zone_name = root_domain(name);
        let zone_id = self
            .ctx
            .gateway
            .find_zone_id(&zone_name)
            .await
            .map_err(|e| format!("zone {zone_name} not found for {name}: {e}"))?;
        match self.ctx.gateway.find_record(&zone_id, name).await {
            Ok(Some(record)) => Ok((zone_id, record.id)),
            Ok(None) => Err(format!("no DNS record named {name} in zone {zone_name}")),
            Err(e) => Err(format!("record lookup for {name} failed: {e}")),
        }
    }

    // ===== 转发域名 =====

    /// Add a forward from a `forward|ip|isp|weight|sort|type` line.
    pub async fn add_forward(&self, domain_id: i64, line: &str) -> CoreResult<Forward> {
        let domain = self.ctx.require_domain(domain_id).await?;
        let mut new_forward = parse_forward_line(line)?;
        new_forward.domain_id = domain.id;

        self.ensure_forward_unique(domain.id, &new_forward.forward_domain, None)
            .await?;
        let forward = self.ctx.domain_repository.insert_forward(&new_forward).await?;
        log::info!(
            "Forward {} added to {}",
            forward.forward_domain,
            domain.address()
        );
        Ok(forward)
    }

    async fn ensure_forward_unique(
        &self,
        domain_id: i64,
        forward_domain: &str,
        except: Option<i64>,
    ) -> CoreResult<()> {
        let exists = self
            .ctx
            .domain_repository
            .list_forwards(domain_id)
            .await?
            .iter()
            .any(|f| f.forward_domain == forward_domain && Some(f.id) != except);
        if exists {
            return Err(CoreError::DuplicateForward(forward_domain.to_string()));
        }
        Ok(())
    }

    /// 获取转发域名，顺带解除已过期的封禁
    pub async fn get_forward(&self, id: i64) -> CoreResult<Forward> {
        let mut forward = self.ctx.require_forward(id).await?;
        self.ledger
            .release_expired(std::slice::from_mut(&mut forward), Utc::now())
            .await?;
        Ok(forward)
    }

    pub async fn edit_forward(
        &self,
        id: i64,
        field: ForwardField,
        value: &str,
    ) -> CoreResult<Forward> {
        let mut forward = self.ctx.require_forward(id).await?;
        let value = value.trim();

        match field {
            ForwardField::ForwardDomain => {
                let name = normalize_domain_name(value);
                validate_hostname(&name)?;
                self.ensure_forward_unique(forward.domain_id, &name, Some(id))
                    .await?;
                forward.forward_domain = name;
            }
            ForwardField::Ip => value.clone_into(&mut forward.ip),
            ForwardField::Isp => value.clone_into(&mut forward.isp),
            ForwardField::Weight => forward.weight = parse_int(value, "weight")?,
            ForwardField::SortOrder => forward.sort_order = parse_int(value, "sort")?,
            ForwardField::RecordType => forward.record_type = parse_record_type(value)?,
        }

        self.ctx.domain_repository.update_forward(&forward).await?;
        log::info!("Forward {id} {field} set to {value}");
        Ok(forward)
    }

    /// Ban for a year, or lift an existing ban.
    pub async fn toggle_forward_ban(&self, id: i64) -> CoreResult<Forward> {
        let mut forward = self.ctx.require_forward(id).await?;
        if forward.is_ban {
            self.ledger.unban(&mut forward).await?;
        } else {
            self.ledger.ban_manually(&mut forward, Utc::now()).await?;
        }
        Ok(forward)
    }

    pub async fn delete_forward(&self, id: i64) -> CoreResult<Forward> {
        let forward = self.ctx.require_forward(id).await?;
        self.ctx.domain_repository.delete_forward(id).await?;
        log::info!("Forward {} deleted", forward.forward_domain);
        Ok(forward)
    }

    /// Ask the backend for the forward's IP and store it.
    ///
    /// A backend that answers without an IP stores `0.0.0.0`; a backend that
    /// cannot be reached leaves the forward unchanged.
    pub async fn refresh_forward_ip(&self, id: i64) -> CoreResult<Forward> {
        let mut forward = self.ctx.require_forward(id).await?;
        let report = self.ctx.prober.resolve_ip(&forward.forward_domain).await?;

        if report.target_ip.is_empty() {
            log::warn!(
                "Cannot resolve {}: {}",
                forward.forward_domain,
                report.message
            );
            UNRESOLVED_IP.clone_into(&mut forward.ip);
        } else {
            forward.ip = report.target_ip;
        }
        self.ctx
            .domain_repository
            .set_forward_ip(forward.id, &forward.ip)
            .await?;
        Ok(forward)
    }
}

pub(crate) fn validate_hostname(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::ValidationError("domain name is empty".to_string()));
    }
    if name.len() > 253 || name.contains(|c: char| c.is_whitespace() || c == '/' || c == '|') {
        return Err(CoreError::ValidationError(format!(
            "invalid domain name '{name}'"
        )));
    }
    Ok(())
}

pub(crate) fn parse_port(value: &str) -> CoreResult<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(CoreError::ValidationError(format!(
            "port must be 1-65535, got '{}'",
            value.trim()
        ))),
    }
}

pub(crate) fn parse_int(value: &str, field: &str) -> CoreResult<i32> {
    value.trim().parse::<i32>().map_err(|_| {
        CoreError::ValidationError(format!(
            "{field} must be an integer, got '{}'",
            value.trim()
        ))
    })
}

/// Empty means `A`; only `A` and `CNAME` are accepted.
pub(crate) fn parse_record_type(value: &str) -> CoreResult<RecordKind> {
    if value.trim().is_empty() {
        return Ok(RecordKind::A);
    }
    value.parse::<RecordKind>().map_err(|_| {
        CoreError::ValidationError(format!(
            "record type must be A or CNAME, got '{}'",
            value.trim()
        ))
    })
}

/// `forward|ip|isp|weight|sort|type`; `domain_id` is left for the caller.
fn parse_forward_line(line: &str) -> CoreResult<NewForward> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < FORWARD_LINE_FIELDS {
        return Err(CoreError::ValidationError(format!(
            "expected forward|ip|isp|weight|sort|type, got {} fields",
            fields.len()
        )));
    }

    let forward_domain = normalize_domain_name(fields[0]);
    validate_hostname(&forward_domain)?;
    Ok(NewForward {
        domain_id: 0,
        forward_domain,
        ip: fields[1].to_string(),
        isp: fields[2].to_string(),
        is_ban: false,
        ban_until: None,
        weight: parse_int(fields[3], "weight")?,
        sort_order: parse_int(fields[4], "sort")?,
        record_type: parse_record_type(fields[5])?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::test_utils::{TestHarness, create_test_harness, seed_domain, seed_forward};
    use crate::types::ResolveStatus;

    fn service(harness: &TestHarness) -> DomainService {
        DomainService::new(harness.ctx.clone())
    }

    #[test]
    fn forward_line_parsing() {
        let f = parse_forward_line("Edge-1.Example.net | 1.2.3.4 | CT | 10 | 2 |").unwrap();
        assert_eq!(f.forward_domain, "edge-1.example.net");
        assert_eq!(f.weight, 10);
        assert_eq!(f.sort_order, 2);
        assert_eq!(f.record_type, RecordKind::A);

        let f = parse_forward_line("cdn.example.net|||0|0|cname").unwrap();
        assert_eq!(f.record_type, RecordKind::Cname);

        assert!(parse_forward_line("a|b|c|1|2").is_err());
        assert!(parse_forward_line("a|b|c|x|2|A").is_err());
        assert!(parse_forward_line("a|b|c|1|2|MX").is_err());
        assert!(parse_forward_line("|b|c|1|2|A").is_err());
    }

    #[test]
    fn port_validation() {
        assert_eq!(parse_port("443").unwrap(), 443);
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("http").is_err());
    }

    #[tokio::test]
    async fn add_forward_rejects_duplicates() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let service = service(&harness);

        let forward = service
            .add_forward(domain.id, "edge-1.example.net|1.2.3.4|CT|10|0|A")
            .await
            .unwrap();
        assert_eq!(forward.domain_id, domain.id);
        assert_eq!(forward.resolve_status, ResolveStatus::Never);

        let again = service
            .add_forward(domain.id, "EDGE-1.example.net|5.6.7.8|CU|1|0|")
            .await;
        assert!(matches!(again, Err(CoreError::DuplicateForward(_))));
    }

    #[tokio::test]
    async fn add_forward_to_unknown_domain() {
        let harness = create_test_harness();
        let result = service(&harness)
            .add_forward(7, "edge-1.example.net|1.2.3.4|CT|10|0|A")
            .await;
        assert!(matches!(result, Err(CoreError::DomainNotFound(_))));
    }

    #[tokio::test]
    async fn rename_resolves_new_ids() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        harness.gateway.add_zone("example.org", "zone-org").await;
        harness
            .gateway
            .add_record("zone-org", "www.example.org", "rec-www")
            .await;

        let edit = service(&harness)
            .edit_domain(domain.id, DomainField::Name, "WWW.example.org.")
            .await
            .unwrap();

        assert!(edit.warning.is_none());
        assert_eq!(edit.domain.domain, "www.example.org");
        assert_eq!(edit.domain.zone_id, "zone-org");
        assert_eq!(edit.domain.record_id, "rec-www");
    }

    #[tokio::test]
    async fn rename_without_record_clears_ids_and_warns() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;

        let edit = service(&harness)
            .edit_domain(domain.id, DomainField::Name, "new.example.io")
            .await
            .unwrap();

        assert!(edit.warning.is_some());
        assert!(edit.domain.zone_id.is_empty());
        assert!(edit.domain.record_id.is_empty());
        let stored = harness.domains.domain(domain.id).await.unwrap();
        assert!(!stored.has_dns_target());
    }

    #[tokio::test]
    async fn port_and_sort_edits_validate() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        seed_domain(&harness.domains, "api.example.com", 8443).await;
        let service = service(&harness);

        assert!(matches!(
            service.edit_domain(domain.id, DomainField::Port, "8443").await,
            Err(CoreError::DuplicateDomain(_))
        ));
        assert!(matches!(
            service.edit_domain(domain.id, DomainField::Port, "70000").await,
            Err(CoreError::ValidationError(_))
        ));
        assert!(matches!(
            service.edit_domain(domain.id, DomainField::SortOrder, "first").await,
            Err(CoreError::ValidationError(_))
        ));

        let edit = service
            .edit_domain(domain.id, DomainField::SortOrder, "-3")
            .await
            .unwrap();
        assert_eq!(edit.domain.sort_order, -3);
    }

    #[tokio::test]
    async fn toggle_check_flips_flag() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let service = service(&harness);

        assert!(service.toggle_check(domain.id).await.unwrap().is_disable_check);
        assert!(!service.toggle_check(domain.id).await.unwrap().is_disable_check);
    }

    #[tokio::test]
    async fn delete_domain_cascades() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let forward = seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;

        service(&harness).delete_domain(domain.id).await.unwrap();

        assert!(harness.domains.domain(domain.id).await.is_none());
        assert!(harness.domains.forward(forward.id).await.is_none());
    }

    #[tokio::test]
    async fn get_domain_lifts_expired_bans() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let mut forward = seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;
        forward.is_ban = true;
        forward.ban_until = Some(Utc::now() - TimeDelta::minutes(1));
        harness.domains.put_forward(forward.clone()).await;

        let shown = service(&harness).get_domain(domain.id).await.unwrap();

        assert!(!shown.forwards[0].is_ban);
        assert!(!harness.domains.forward(forward.id).await.unwrap().is_ban);
    }

    #[tokio::test]
    async fn toggle_forward_ban_round_trip() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let forward = seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;
        let service = service(&harness);

        let banned = service.toggle_forward_ban(forward.id).await.unwrap();
        assert!(banned.is_ban);
        assert!(banned.ban_until.unwrap() > Utc::now() + TimeDelta::days(364));

        let lifted = service.toggle_forward_ban(forward.id).await.unwrap();
        assert!(!lifted.is_ban);
        assert!(lifted.ban_until.is_none());
    }

    #[tokio::test]
    async fn edit_forward_fields() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let forward = seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;
        seed_forward(&harness.domains, domain.id, "edge-2.example.net", 5, 0).await;
        let service = service(&harness);

        let f = service
            .edit_forward(forward.id, ForwardField::RecordType, "cname")
            .await
            .unwrap();
        assert_eq!(f.record_type, RecordKind::Cname);
        let f = service
            .edit_forward(forward.id, ForwardField::Isp, " CMCC ")
            .await
            .unwrap();
        assert_eq!(f.isp, "CMCC");

        assert!(matches!(
            service
                .edit_forward(forward.id, ForwardField::ForwardDomain, "edge-2.example.net")
                .await,
            Err(CoreError::DuplicateForward(_))
        ));
        assert!(matches!(
            service.edit_forward(forward.id, ForwardField::RecordType, "AAAA").await,
            Err(CoreError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn refresh_ip_stores_result_or_placeholder() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        let known = seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;
        let unknown = seed_forward(&harness.domains, domain.id, "gone.example.net", 5, 0).await;
        harness.prober.set_ip("edge-1.example.net", "192.0.2.10").await;
        let service = service(&harness);

        assert_eq!(service.refresh_forward_ip(known.id).await.unwrap().ip, "192.0.2.10");
        assert_eq!(service.refresh_forward_ip(unknown.id).await.unwrap().ip, "0.0.0.0");
    }
}
