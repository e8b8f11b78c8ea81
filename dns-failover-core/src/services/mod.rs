//! 业务逻辑服务层

mod admin_service;
mod ban_ledger;
mod candidate_selector;
mod domain_service;
mod failover_engine;
mod failure_counter;
mod import_export_service;
mod reporter;
mod scheduler;

pub use admin_service::AdminService;
pub use ban_ledger::{AUTO_BAN_HOURS, BanLedger, BanState, MANUAL_BAN_DAYS, ban_state, is_eligible};
pub use candidate_selector::{CandidateSelector, Chosen, Selection, sort_candidates};
pub use domain_service::DomainService;
pub use failover_engine::{FailoverEngine, ForwardCheck};
pub use failure_counter::InfraFailureCounter;
pub use import_export_service::{
    ImportExportService, format_export_line, group_records, parse_import,
};
pub use reporter::{NOTIFY_GAP, Reporter, render_manual, render_scheduled, should_notify};
pub use scheduler::Scheduler;

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::traits::{
    AdminRepository, DnsCommitGateway, DomainRepository, NotificationSink, ReachabilityProber,
};
use crate::types::{Domain, Forward};

/// 默认 DNS TTL（秒）
pub const DEFAULT_TTL: u32 = 60;
/// 默认接口失败通知阈值
pub const DEFAULT_API_FAIL_THRESHOLD: u32 = 3;

/// Knobs shared by the engine and the admin services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverSettings {
    /// TTL written with every record commit.
    pub ttl: u32,
    pub proxied: bool,
    /// Consecutive infra failures before they are notified.
    pub api_fail_threshold: u32,
    /// Configured owner; `0` disables the role.
    pub super_admin_id: i64,
}

impl Default for FailoverSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            proxied: false,
            api_fail_threshold: DEFAULT_API_FAIL_THRESHOLD,
            super_admin_id: 0,
        }
    }
}

/// 服务上下文 - 持有所有依赖
///
/// 平台层需要创建此上下文，并注入存储、远端能力与通知实现。
pub struct ServiceContext {
    /// 主域名 / 转发仓库
    pub domain_repository: Arc<dyn DomainRepository>,
    /// 管理员仓库
    pub admin_repository: Arc<dyn AdminRepository>,
    /// 连通性检测
    pub prober: Arc<dyn ReachabilityProber>,
    /// DNS 记录提交
    pub gateway: Arc<dyn DnsCommitGateway>,
    /// 通知发送
    pub notifier: Arc<dyn NotificationSink>,
    pub settings: FailoverSettings,
}

impl ServiceContext {
    /// 创建服务上下文
    #[must_use]
    pub fn new(
        domain_repository: Arc<dyn DomainRepository>,
        admin_repository: Arc<dyn AdminRepository>,
        prober: Arc<dyn ReachabilityProber>,
        gateway: Arc<dyn DnsCommitGateway>,
        notifier: Arc<dyn NotificationSink>,
        settings: FailoverSettings,
    ) -> Self {
        Self {
            domain_repository,
            admin_repository,
            prober,
            gateway,
            notifier,
            settings,
        }
    }

    /// 获取主域名，不存在则返回 `DomainNotFound`
    pub async fn require_domain(&self, id: i64) -> CoreResult<Domain> {
        self.domain_repository
            .find_domain(id)
            .await?
            .ok_or_else(|| CoreError::DomainNotFound(id.to_string()))
    }

    /// 获取转发域名，不存在则返回 `ForwardNotFound`
    pub async fn require_forward(&self, id: i64) -> CoreResult<Forward> {
        self.domain_repository
            .find_forward(id)
            .await?
            .ok_or_else(|| CoreError::ForwardNotFound(id.to_string()))
    }
}
