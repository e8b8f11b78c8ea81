//! 故障转移引擎
//!
//! 每个检测周期按顺序处理所有启用检测的主域名：
//! 主域名可达则跳过；不可达则从转发域名中择优并改写 DNS 记录。

use std::sync::Arc;

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::services::ban_ledger::BanLedger;
use crate::services::candidate_selector::{CandidateSelector, probe_relayed};
use crate::services::failure_counter::InfraFailureCounter;
use crate::types::{
    CheckEvent, CheckEventSender, CheckReport, CommitFailure, DisconnectReason, Domain,
    DomainFailure, DomainSwitch, Forward, NoForwardEntry, NoForwardReason, RecordKind,
    ResolveStatus, emit,
};
use dns_failover_provider::DnsRecordUpdate;

/// Outcome of checking a single forward on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardCheck {
    /// Reachable; the domain now points at it.
    Switched(DomainSwitch),
    Unreachable { message: String },
}

/// 故障转移引擎
pub struct FailoverEngine {
    ctx: Arc<ServiceContext>,
    ledger: BanLedger,
    counter: Arc<InfraFailureCounter>,
}

impl FailoverEngine {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, counter: Arc<InfraFailureCounter>) -> Self {
        let ledger = BanLedger::new(ctx.domain_repository.clone());
        Self {
            ctx,
            ledger,
            counter,
        }
    }

    #[must_use]
    pub fn counter(&self) -> &InfraFailureCounter {
        &self.counter
    }

    /// Run one pass over every enabled domain.
    ///
    /// Per-domain storage problems are logged and the domain skipped; only a
    /// failure to list domains aborts the cycle.
    pub async fn run_cycle(&self, events: Option<&CheckEventSender>) -> CoreResult<CheckReport> {
        let domains = self.ctx.domain_repository.list_domains().await?;
        let enabled: Vec<&Domain> = domains.iter().filter(|d| !d.is_disable_check).collect();
        log::info!(
            "Check cycle started: {} domains, {} enabled",
            domains.len(),
            enabled.len()
        );
        emit(
            events,
            CheckEvent::CycleStarted {
                domains: enabled.len(),
            },
        );

        let mut report = CheckReport::default();
        let total = enabled.len();
        for (index, domain) in enabled.into_iter().enumerate() {
            emit(
                events,
                CheckEvent::DomainStarted {
                    index: index + 1,
                    total,
                    domain: domain.domain.clone(),
                    port: domain.port,
                },
            );
            self.check_domain(domain, &mut report, events).await;
        }

        emit(events, CheckEvent::CycleFinished);
        log::info!(
            "Check cycle finished: {} healthy, {} disconnected, {} switched, {} infra failures",
            report.healthy_count,
            report.disconnected.len(),
            report.switched.len(),
            report.failed_domains.len()
        );
        Ok(report)
    }

    async fn check_domain(
        &self,
        domain: &Domain,
        report: &mut CheckReport,
        events: Option<&CheckEventSender>,
    ) {
        let address = domain.address();
        let primary =
            match probe_relayed(self.ctx.prober.as_ref(), &domain.domain, domain.port, events).await
            {
                Ok(primary) => primary,
                Err(e) => {
                    self.counter.increment();
                    log::warn!("Probe of {address} failed: {e}");
                    report.failed_domains.push(address);
                    return;
                }
            };
        self.counter.reset();

        if primary.reachable {
            log::debug!("{address} is reachable");
            report.healthy_count += 1;
            return;
        }

        log::warn!("{address} is unreachable: {}", primary.message);
        report.disconnected.push(DomainFailure {
            domain: domain.domain.clone(),
            port: domain.port,
            reason: DisconnectReason::classify(&primary.message),
        });
        self.fail_over(domain, report, events).await;
    }

    async fn fail_over(
        &self,
        domain: &Domain,
        report: &mut CheckReport,
        events: Option<&CheckEventSender>,
    ) {
        let mut forwards = match self.ctx.domain_repository.list_forwards(domain.id).await {
            Ok(forwards) => forwards,
            Err(e) => {
                log::error!("Failed to load forwards of {}: {e}", domain.address());
                return;
            }
        };

        if forwards.is_empty() {
            log::warn!("{} has no forwards configured", domain.address());
            report.no_forward.push(NoForwardEntry {
                domain: domain.domain.clone(),
                port: domain.port,
                reason: NoForwardReason::NoneConfigured,
            });
            return;
        }

        let selector = CandidateSelector::new(self.ctx.prober.as_ref(), &self.ledger, &self.counter);
        let selection = selector
            .select(&mut forwards, domain.port, Utc::now(), events)
            .await;
        report.banned_forwards.extend(selection.banned);

        let Some(chosen) = selection.chosen else {
            log::error!("{} has no available forward", domain.address());
            report.no_forward.push(NoForwardEntry {
                domain: domain.domain.clone(),
                port: domain.port,
                reason: NoForwardReason::NoneAvailable,
            });
            return;
        };

        let forward = &mut forwards[chosen.index];
        match self.commit(domain, forward, &chosen.resolved_ip).await {
            Ok(switch) => report.switched.push(switch),
            Err(e) => report.commit_failures.push(CommitFailure {
                domain: domain.domain.clone(),
                port: domain.port,
                forward_domain: forward.forward_domain.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Point `domain` at `forward` and mark it as the active target.
    ///
    /// A domain without provider ids is left untouched. A failed write marks
    /// only the forward as failed; siblings keep their state.
    async fn commit(
        &self,
        domain: &Domain,
        forward: &mut Forward,
        resolved_ip: &str,
    ) -> CoreResult<DomainSwitch> {
        if !domain.has_dns_target() {
            log::warn!(
                "{} has no DNS record/zone id, skipping switch to {}",
                domain.address(),
                forward.forward_domain
            );
            return Err(CoreError::ConfigurationGap(format!(
                "{} has no DNS record id or zone id",
                domain.domain
            )));
        }

        let content = match forward.record_type {
            RecordKind::A => resolved_ip.to_string(),
            RecordKind::Cname => forward.forward_domain.clone(),
        };
        let written = if content.is_empty() {
            Err(CoreError::ValidationError(format!(
                "probe of {} returned no IP for an A record",
                forward.forward_domain
            )))
        } else {
            let update = DnsRecordUpdate {
                zone_id: domain.zone_id.clone(),
                record_id: domain.record_id.clone(),
                kind: forward.record_type,
                name: domain.domain.clone(),
                content: content.clone(),
                ttl: self.ctx.settings.ttl,
                proxied: self.ctx.settings.proxied,
            };
            self.ctx
                .gateway
                .update_record(&update)
                .await
                .map(|_| ())
                .map_err(CoreError::from)
        };

        if let Err(e) = written {
            log::error!(
                "DNS commit {} -> {} failed: {e}",
                domain.address(),
                forward.forward_domain
            );
            forward.resolve_status = ResolveStatus::Failed;
            if let Err(store_err) = self
                .ctx
                .domain_repository
                .set_resolve_status(forward.id, ResolveStatus::Failed)
                .await
            {
                log::error!(
                    "Failed to mark {} as failed: {store_err}",
                    forward.forward_domain
                );
            }
            return Err(e);
        }

        let now = Utc::now();
        if let Err(e) = self
            .ctx
            .domain_repository
            .activate_forward(domain.id, forward.id, resolved_ip, now)
            .await
        {
            log::error!(
                "{} switched to {} but the state was not saved: {e}",
                domain.address(),
                forward.forward_domain
            );
        }
        forward.ip = resolved_ip.to_string();
        forward.resolve_status = ResolveStatus::Success;
        forward.last_resolved_at = Some(now);

        log::info!(
            "{} switched to {} ({} {content})",
            domain.address(),
            forward.forward_domain,
            forward.record_type
        );
        Ok(DomainSwitch {
            domain: domain.domain.clone(),
            port: domain.port,
            record_type: forward.record_type,
            new_record: content,
            forward_domain: forward.forward_domain.clone(),
            isp: forward.isp.clone(),
            weight: forward.weight,
        })
    }

    /// Probe one forward and, if it answers, switch its domain to it.
    ///
    /// A probe error is returned as is; an unreachable answer changes nothing.
    pub async fn check_forward(
        &self,
        forward_id: i64,
        events: Option<&CheckEventSender>,
    ) -> CoreResult<ForwardCheck> {
        let mut forward = self.ctx.require_forward(forward_id).await?;
        let domain = self.ctx.require_domain(forward.domain_id).await?;

        let report = match probe_relayed(
            self.ctx.prober.as_ref(),
            &forward.forward_domain,
            domain.port,
            events,
        )
        .await
        {
            Ok(report) => report,
            Err(e) => {
                self.counter.increment();
                return Err(e.into());
            }
        };
        self.counter.reset();

        if !report.reachable {
            log::info!(
                "Forward {}:{} unreachable on demand: {}",
                forward.forward_domain,
                domain.port,
                report.message
            );
            return Ok(ForwardCheck::Unreachable {
                message: report.message,
            });
        }

        let switch = self.commit(&domain, &mut forward, &report.target_ip).await?;
        Ok(ForwardCheck::Switched(switch))
    }
}
