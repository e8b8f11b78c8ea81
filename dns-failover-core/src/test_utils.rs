//! 测试辅助模块
//!
//! 提供 mock 实现和便捷的测试工厂方法。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dns_failover_provider::{DnsRecordUpdate, ProbeProgressSender, ProviderError};
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::services::{FailoverSettings, ServiceContext, sort_candidates};
use crate::traits::{
    AdminRepository, DnsCommitGateway, DomainRepository, NotificationSink, ReachabilityProber,
};
use crate::types::{
    Admin, DnsRecord, Domain, Forward, NewDomain, NewForward, ProbeProgress, ProbeReport,
    ROLE_ADMIN, ResolveStatus,
};

pub const SUPER_ADMIN_ID: i64 = 1;

// ===== MockDomainRepository =====

pub struct MockDomainRepository {
    domains: RwLock<HashMap<i64, Domain>>,
    forwards: RwLock<HashMap<i64, Forward>>,
    next_id: AtomicI64,
    /// 如果 Some，写操作返回此错误
    save_error: RwLock<Option<String>>,
    /// 如果 Some，list_domains 返回此错误
    list_error: RwLock<Option<String>>,
}

impl MockDomainRepository {
    pub fn new() -> Self {
        Self {
            domains: RwLock::new(HashMap::new()),
            forwards: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            save_error: RwLock::new(None),
            list_error: RwLock::new(None),
        }
    }

    pub async fn set_save_error(&self, err: Option<String>) {
        *self.save_error.write().await = err;
    }

    pub async fn set_list_error(&self, err: Option<String>) {
        *self.list_error.write().await = err;
    }

    async fn check_save(&self) -> CoreResult<()> {
        match &*self.save_error.read().await {
            Some(msg) => Err(CoreError::StorageError(msg.clone())),
            None => Ok(()),
        }
    }

    pub async fn domain(&self, id: i64) -> Option<Domain> {
        self.domains.read().await.get(&id).cloned()
    }

    pub async fn forward(&self, id: i64) -> Option<Forward> {
        self.forwards.read().await.get(&id).cloned()
    }

    /// Overwrite a row directly, bypassing `save_error`.
    pub async fn put_domain(&self, domain: Domain) {
        self.domains.write().await.insert(domain.id, domain);
    }

    pub async fn put_forward(&self, forward: Forward) {
        self.forwards.write().await.insert(forward.id, forward);
    }

    pub async fn all_domains(&self) -> Vec<Domain> {
        let mut domains: Vec<Domain> = self.domains.read().await.values().cloned().collect();
        domains.sort_by_key(|d| (d.sort_order, d.id));
        domains
    }

    pub async fn list_forwards_of(&self, domain_id: i64) -> Vec<Forward> {
        let mut forwards: Vec<Forward> = self
            .forwards
            .read()
            .await
            .values()
            .filter(|f| f.domain_id == domain_id)
            .cloned()
            .collect();
        sort_candidates(&mut forwards);
        forwards
    }
}

#[async_trait]
impl DomainRepository for MockDomainRepository {
    async fn list_domains(&self) -> CoreResult<Vec<Domain>> {
        if let Some(ref msg) = *self.list_error.read().await {
            return Err(CoreError::StorageError(msg.clone()));
        }
        Ok(self.all_domains().await)
    }

    async fn find_domain(&self, id: i64) -> CoreResult<Option<Domain>> {
        Ok(self.domain(id).await)
    }

    async fn find_domain_by_name_port(
        &self,
        domain: &str,
        port: u16,
    ) -> CoreResult<Option<Domain>> {
        Ok(self
            .domains
            .read()
            .await
            .values()
            .find(|d| d.domain == domain && d.port == port)
            .cloned())
    }

    async fn insert_domain(&self, domain: &NewDomain) -> CoreResult<Domain> {
        self.check_save().await?;
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
        let now = Utc::now();
        let row = Domain {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            domain: domain.domain.clone(),
            port: domain.port,
            record_id: domain.record_id.clone(),
            zone_id: domain.zone_id.clone(),
            is_disable_check: domain.is_disable_check,
            sort_order: domain.sort_order,
            created_at: now,
            updated_at: now,
        };
        self.put_domain(row.clone()).await;
        Ok(row)
    }

    async fn update_domain(&self, domain: &Domain) -> CoreResult<()> {
        self.check_save().await?;
        let mut row = domain.clone();
        row.updated_at = Utc::now();
        self.put_domain(row).await;
        Ok(())
    }

    async fn delete_domain(&self, id: i64) -> CoreResult<()> {
        self.check_save().await?;
        self.domains.write().await.remove(&id);
        self.forwards.write().await.retain(|_, f| f.domain_id != id);
        Ok(())
    }

    async fn list_forwards(&self, domain_id: i64) -> CoreResult<Vec<Forward>> {
        Ok(self.list_forwards_of(domain_id).await)
    }

    async fn find_forward(&self, id: i64) -> CoreResult<Option<Forward>> {
        Ok(self.forward(id).await)
    }

    async fn insert_forward(&self, forward: &NewForward) -> CoreResult<Forward> {
        self.check_save().await?;
        let now = Utc::now();
        let row = Forward {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            domain_id: forward.domain_id,
            forward_domain: forward.forward_domain.clone(),
            ip: forward.ip.clone(),
            isp: forward.isp.clone(),
            is_ban: forward.is_ban,
            ban_until: forward.ban_until,
            weight: forward.weight,
            sort_order: forward.sort_order,
            record_type: forward.record_type,
            last_resolved_at: None,
            resolve_status: ResolveStatus::Never,
            created_at: now,
            updated_at: now,
        };
        self.put_forward(row.clone()).await;
        Ok(row)
    }

    async fn update_forward(&self, forward: &Forward) -> CoreResult<()> {
        self.check_save().await?;
        if let Some(row) = self.forwards.write().await.get_mut(&forward.id) {
            row.forward_domain.clone_from(&forward.forward_domain);
            row.ip.clone_from(&forward.ip);
            row.isp.clone_from(&forward.isp);
            row.weight = forward.weight;
            row.sort_order = forward.sort_order;
            row.record_type = forward.record_type;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn extend_ban(
        &self,
        id: i64,
        until: DateTime<Utc>,
        status: ResolveStatus,
    ) -> CoreResult<bool> {
        self.check_save().await?;
        let mut forwards = self.forwards.write().await;
        let Some(row) = forwards.get_mut(&id) else {
            return Ok(false);
        };
        let longer_ban_stored =
            row.is_ban && row.ban_until.is_none_or(|current| current >= until);
        if longer_ban_stored {
            return Ok(false);
        }
        row.is_ban = true;
        row.ban_until = Some(until);
        row.resolve_status = status;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn lift_ban(&self, id: i64, expired_at: Option<DateTime<Utc>>) -> CoreResult<bool> {
        self.check_save().await?;
        let mut forwards = self.forwards.write().await;
        let Some(row) = forwards.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(at) = expired_at {
            let expired = row.is_ban && row.ban_until.is_some_and(|until| until <= at);
            if !expired {
                return Ok(false);
            }
        }
        row.is_ban = false;
        row.ban_until = None;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_resolve_status(&self, id: i64, status: ResolveStatus) -> CoreResult<()> {
        self.check_save().await?;
        if let Some(row) = self.forwards.write().await.get_mut(&id) {
            row.resolve_status = status;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_forward_ip(&self, id: i64, ip: &str) -> CoreResult<()> {
        self.check_save().await?;
        if let Some(row) = self.forwards.write().await.get_mut(&id) {
            row.ip = ip.to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_forward(&self, id: i64) -> CoreResult<()> {
        self.check_save().await?;
        self.forwards.write().await.remove(&id);
        Ok(())
    }

    async fn activate_forward(
        &self,
        domain_id: i64,
        forward_id: i64,
        ip: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.check_save().await?;
        let mut forwards = self.forwards.write().await;
        for forward in forwards.values_mut().filter(|f| f.domain_id == domain_id) {
            if forward.id == forward_id {
                forward.ip = ip.to_string();
                forward.resolve_status = ResolveStatus::Success;
                forward.last_resolved_at = Some(at);
            } else {
                forward.resolve_status = ResolveStatus::Never;
            }
            forward.updated_at = at;
        }
        Ok(())
    }
}

// ===== MockAdminRepository =====

pub struct MockAdminRepository {
    admins: RwLock<HashMap<i64, Admin>>,
}

impl MockAdminRepository {
    pub fn new() -> Self {
        Self {
            admins: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AdminRepository for MockAdminRepository {
    async fn find(&self, uid: i64) -> CoreResult<Option<Admin>> {
        Ok(self.admins.read().await.get(&uid).cloned())
    }

    async fn list(&self) -> CoreResult<Vec<Admin>> {
        let mut admins: Vec<Admin> = self.admins.read().await.values().cloned().collect();
        admins.sort_by_key(|a| a.uid);
        Ok(admins)
    }

    async fn save(&self, admin: &Admin) -> CoreResult<()> {
        self.admins.write().await.insert(admin.uid, admin.clone());
        Ok(())
    }

    async fn delete(&self, uid: i64) -> CoreResult<()> {
        self.admins.write().await.remove(&uid);
        Ok(())
    }
}

// ===== MockProber =====

/// Scripted answer for one target.
#[derive(Debug, Clone, Copy)]
pub enum MockProbe {
    /// Connected; carries the resolved IP.
    Reachable(&'static str),
    /// Every attempt failed.
    Exhausted,
    /// Negative but not exhausted (e.g. resolution failure).
    Unreachable(&'static str),
    /// The backend itself failed.
    InfraError,
}

pub struct MockProber {
    scripts: RwLock<HashMap<String, MockProbe>>,
    ips: RwLock<HashMap<String, String>>,
    probed: RwLock<Vec<String>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            ips: RwLock::new(HashMap::new()),
            probed: RwLock::new(Vec::new()),
        }
    }

    pub async fn script(&self, target: &str, probe: MockProbe) {
        self.scripts.write().await.insert(target.to_string(), probe);
    }

    pub async fn set_ip(&self, target: &str, ip: &str) {
        self.ips.write().await.insert(target.to_string(), ip.to_string());
    }

    /// `target:port` in probe order.
    pub async fn probed(&self) -> Vec<String> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl ReachabilityProber for MockProber {
    async fn probe(
        &self,
        target: &str,
        port: u16,
        progress: Option<&ProbeProgressSender>,
    ) -> dns_failover_provider::Result<ProbeReport> {
        self.probed.write().await.push(format!("{target}:{port}"));
        let script = self
            .scripts
            .read()
            .await
            .get(target)
            .copied()
            .unwrap_or(MockProbe::Unreachable("no script"));

        let report = |reachable: bool, ip: &str, message: String, exhausted: bool| ProbeReport {
            reachable,
            target: target.to_string(),
            target_ip: ip.to_string(),
            message,
            backend_public_ip: "198.51.100.200".to_string(),
            exhausted: Some(exhausted),
        };

        match script {
            MockProbe::Reachable(ip) => {
                if let Some(tx) = progress {
                    let _ = tx.send(ProbeProgress {
                        current: 1,
                        total: 5,
                        target: target.to_string(),
                        address: format!("{ip}:{port}"),
                    });
                }
                Ok(report(true, ip, format!("目标 {ip}:{port} 连接成功"), false))
            }
            MockProbe::Exhausted => Ok(report(
                false,
                "192.0.2.1",
                format!("检测结束,目标 192.0.2.1:{port}无法连接: i/o timeout"),
                true,
            )),
            MockProbe::Unreachable(message) => Ok(report(false, "", message.to_string(), false)),
            MockProbe::InfraError => Err(ProviderError::NetworkError {
                provider: "check-backend".to_string(),
                detail: "connection refused".to_string(),
            }),
        }
    }

    async fn resolve_ip(&self, target: &str) -> dns_failover_provider::Result<ProbeReport> {
        let ip = self.ips.read().await.get(target).cloned().unwrap_or_default();
        Ok(ProbeReport {
            reachable: false,
            target: target.to_string(),
            message: if ip.is_empty() {
                format!("cannot resolve target {target}")
            } else {
                String::new()
            },
            target_ip: ip,
            ..ProbeReport::default()
        })
    }
}

// ===== MockDnsGateway =====

pub struct MockDnsGateway {
    zones: RwLock<HashMap<String, String>>,
    /// (zone_id, name) -> record id
    records: RwLock<HashMap<(String, String), String>>,
    updates: RwLock<Vec<DnsRecordUpdate>>,
    update_error: RwLock<bool>,
}

impl MockDnsGateway {
    pub fn new() -> Self {
        Self {
            zones: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            updates: RwLock::new(Vec::new()),
            update_error: RwLock::new(false),
        }
    }

    pub async fn add_zone(&self, name: &str, zone_id: &str) {
        self.zones
            .write()
            .await
            .insert(name.to_string(), zone_id.to_string());
    }

    pub async fn add_record(&self, zone_id: &str, name: &str, record_id: &str) {
        self.records
            .write()
            .await
            .insert((zone_id.to_string(), name.to_string()), record_id.to_string());
    }

    pub async fn set_update_error(&self, fail: bool) {
        *self.update_error.write().await = fail;
    }

    /// Successful updates, in order.
    pub async fn updates(&self) -> Vec<DnsRecordUpdate> {
        self.updates.read().await.clone()
    }
}

fn mock_record(zone_id: &str, id: &str, name: &str, kind: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        zone_id: zone_id.to_string(),
        record_type: kind.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        ttl: 60,
        proxied: Some(false),
    }
}

#[async_trait]
impl DnsCommitGateway for MockDnsGateway {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn update_record(
        &self,
        req: &DnsRecordUpdate,
    ) -> dns_failover_provider::Result<DnsRecord> {
        if *self.update_error.read().await {
            return Err(ProviderError::BackendStatus {
                provider: "mock".to_string(),
                status: 500,
                detail: "update rejected".to_string(),
            });
        }
        self.updates.write().await.push(req.clone());
        Ok(mock_record(
            &req.zone_id,
            &req.record_id,
            &req.name,
            req.kind.as_str(),
            &req.content,
        ))
    }

    async fn find_zone_id(&self, zone_name: &str) -> dns_failover_provider::Result<String> {
        self.zones
            .read()
            .await
            .get(zone_name)
            .cloned()
            .ok_or_else(|| ProviderError::DomainNotFound {
                provider: "mock".to_string(),
                domain: zone_name.to_string(),
                raw_message: None,
            })
    }

    async fn find_record(
        &self,
        zone_id: &str,
        name: &str,
    ) -> dns_failover_provider::Result<Option<DnsRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(zone_id.to_string(), name.to_string()))
            .map(|id| mock_record(zone_id, id, name, "A", "192.0.2.1")))
    }
}

// ===== MockNotifier =====

pub struct MockNotifier {
    sent: RwLock<Vec<(i64, String)>>,
    failing: RwLock<HashSet<i64>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    pub async fn fail_for(&self, chat_id: i64) {
        self.failing.write().await.insert(chat_id);
    }

    /// Delivered `(chat_id, text)` pairs.
    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MockNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> CoreResult<()> {
        if self.failing.read().await.contains(&chat_id) {
            return Err(CoreError::NotificationError(format!(
                "chat {chat_id} unreachable"
            )));
        }
        self.sent.write().await.push((chat_id, text.to_string()));
        Ok(())
    }
}

// ===== 工厂方法 =====

/// Context plus handles on every mock behind it.
pub struct TestHarness {
    pub ctx: Arc<ServiceContext>,
    pub domains: Arc<MockDomainRepository>,
    pub admins: Arc<MockAdminRepository>,
    pub prober: Arc<MockProber>,
    pub gateway: Arc<MockDnsGateway>,
    pub notifier: Arc<MockNotifier>,
}

/// 创建测试用 ServiceContext，超级管理员为 [`SUPER_ADMIN_ID`]
pub fn create_test_harness() -> TestHarness {
    let domains = Arc::new(MockDomainRepository::new());
    let admins = Arc::new(MockAdminRepository::new());
    let prober = Arc::new(MockProber::new());
    let gateway = Arc::new(MockDnsGateway::new());
    let notifier = Arc::new(MockNotifier::new());

    let ctx = Arc::new(ServiceContext::new(
        domains.clone(),
        admins.clone(),
        prober.clone(),
        gateway.clone(),
        notifier.clone(),
        FailoverSettings {
            super_admin_id: SUPER_ADMIN_ID,
            ..FailoverSettings::default()
        },
    ));

    TestHarness {
        ctx,
        domains,
        admins,
        prober,
        gateway,
        notifier,
    }
}

/// Domain with provider ids already resolved.
pub async fn seed_domain(repo: &MockDomainRepository, name: &str, port: u16) -> Domain {
    repo.insert_domain(&NewDomain {
        domain: name.to_string(),
        port,
        record_id: format!("rec-{name}"),
        zone_id: "zone-1".to_string(),
        ..NewDomain::default()
    })
    .await
    .unwrap()
}

pub async fn seed_forward(
    repo: &MockDomainRepository,
    domain_id: i64,
    name: &str,
    weight: i32,
    sort_order: i32,
) -> Forward {
    repo.insert_forward(&NewForward {
        domain_id,
        forward_domain: name.to_string(),
        weight,
        sort_order,
        ..NewForward::default()
    })
    .await
    .unwrap()
}

pub async fn seed_admin(repo: &MockAdminRepository, uid: i64, is_ban: bool) -> Admin {
    let now = Utc::now();
    let admin = Admin {
        uid,
        username: format!("user{uid}"),
        first_name: String::new(),
        last_name: String::new(),
        role: ROLE_ADMIN.to_string(),
        remark: String::new(),
        added_by: SUPER_ADMIN_ID,
        is_ban,
        created_at: now,
        updated_at: now,
    };
    repo.save(&admin).await.unwrap();
    admin
}
