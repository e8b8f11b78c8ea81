//! Platform-agnostic application bootstrap for the DNS failover controller.
//!
//! Provides `AppState` (service container) and `AppStateBuilder` (adapter
//! injection). The bot binary builds one `AppState` at startup and shares it
//! between the scheduler task and the chat dispatcher.

pub mod adapters;

use std::sync::Arc;
use std::time::Duration;

use dns_failover_core::error::{CoreError, CoreResult};
use dns_failover_core::services::{
    AdminService, DomainService, FailoverEngine, FailoverSettings, ImportExportService,
    InfraFailureCounter, Reporter, Scheduler, ServiceContext,
};
use dns_failover_core::traits::{
    AdminRepository, DnsCommitGateway, DomainRepository, NotificationSink, ReachabilityProber,
};

/// 默认检测间隔
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Platform-agnostic application state.
///
/// Holds every service and the `ServiceContext`. Frontends construct this
/// once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Service context (holds all adapters)
    pub ctx: Arc<ServiceContext>,
    /// Consecutive probe-backend failures, shared by engine and reports
    pub counter: Arc<InfraFailureCounter>,
    pub engine: Arc<FailoverEngine>,
    pub reporter: Arc<Reporter>,
    /// Single-flight scheduler; manual checks go through it too
    pub scheduler: Arc<Scheduler>,
    pub admin_service: AdminService,
    pub domain_service: DomainService,
    pub import_export_service: ImportExportService,
}

/// Builder for constructing `AppState` with platform-specific adapters.
///
/// # Required adapters
/// - `domain_repository` / `admin_repository` - persistence
/// - `prober` - reachability check backend
/// - `gateway` - DNS record writes
/// - `notifier` - chat delivery
///
/// # Optional
/// - `settings` - defaults to `FailoverSettings::default()`
/// - `check_interval` - defaults to [`DEFAULT_CHECK_INTERVAL`]
#[derive(Default)]
pub struct AppStateBuilder {
    domain_repository: Option<Arc<dyn DomainRepository>>,
    admin_repository: Option<Arc<dyn AdminRepository>>,
    prober: Option<Arc<dyn ReachabilityProber>>,
    gateway: Option<Arc<dyn DnsCommitGateway>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    settings: Option<FailoverSettings>,
    check_interval: Option<Duration>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn domain_repository(mut self, repo: Arc<dyn DomainRepository>) -> Self {
        self.domain_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn admin_repository(mut self, repo: Arc<dyn AdminRepository>) -> Self {
        self.admin_repository = Some(repo);
        self
    }

    #[must_use]
    pub fn prober(mut self, prober: Arc<dyn ReachabilityProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    #[must_use]
    pub fn gateway(mut self, gateway: Arc<dyn DnsCommitGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: FailoverSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if required adapters are missing
    /// or the check interval is zero.
    pub fn build(self) -> CoreResult<AppState> {
        let domain_repository = self.domain_repository.ok_or_else(|| {
            CoreError::ValidationError("domain_repository is required".to_string())
        })?;
        let admin_repository = self.admin_repository.ok_or_else(|| {
            CoreError::ValidationError("admin_repository is required".to_string())
        })?;
        let prober = self
            .prober
            .ok_or_else(|| CoreError::ValidationError("prober is required".to_string()))?;
        let gateway = self
            .gateway
            .ok_or_else(|| CoreError::ValidationError("gateway is required".to_string()))?;
        let notifier = self
            .notifier
            .ok_or_else(|| CoreError::ValidationError("notifier is required".to_string()))?;
        let settings = self.settings.unwrap_or_default();
        let interval = self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL);
        if interval.is_zero() {
            return Err(CoreError::ValidationError(
                "check_interval must be positive".to_string(),
            ));
        }

        let counter = Arc::new(InfraFailureCounter::new(settings.api_fail_threshold));
        let ctx = Arc::new(ServiceContext::new(
            domain_repository,
            admin_repository,
            prober,
            gateway,
            notifier,
            settings,
        ));

        let engine = Arc::new(FailoverEngine::new(Arc::clone(&ctx), Arc::clone(&counter)));
        let reporter = Arc::new(Reporter::new(Arc::clone(&ctx)));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&engine),
            Arc::clone(&reporter),
            interval,
        ));

        log::debug!(
            "AppState built: interval={}s, fail threshold={}",
            interval.as_secs(),
            counter.threshold()
        );

        Ok(AppState {
            admin_service: AdminService::new(Arc::clone(&ctx)),
            domain_service: DomainService::new(Arc::clone(&ctx)),
            import_export_service: ImportExportService::new(Arc::clone(&ctx)),
            ctx,
            counter,
            engine,
            reporter,
            scheduler,
        })
    }
}
