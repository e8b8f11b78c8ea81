//! 检测结果通知

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreResult;
use crate::services::ServiceContext;
use crate::services::failure_counter::InfraFailureCounter;
use crate::types::{CheckReport, NoForwardReason};

/// Pause between two recipients.
pub const NOTIFY_GAP: Duration = Duration::from_millis(50);

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RULE: &str = "──────────────";

/// Whether a scheduled cycle deserves a message.
///
/// Anything besides infra failures always notifies; infra failures alone
/// notify only once the counter reaches its threshold.
#[must_use]
pub fn should_notify(report: &CheckReport, counter: &InfraFailureCounter) -> bool {
    report.has_incidents() || (!report.failed_domains.is_empty() && counter.is_over_threshold())
}

/// Digest of a scheduled cycle. Infra failures are listed only past the threshold.
#[must_use]
pub fn render_scheduled(report: &CheckReport, counter: &InfraFailureCounter) -> String {
    let infra = if counter.is_over_threshold() {
        InfraLine::WithCount(counter.count())
    } else {
        InfraLine::Hidden
    };
    render_digest("📊 Auto check report", report, infra)
}

/// Digest of a manually triggered cycle; always has something to say.
#[must_use]
pub fn render_manual(report: &CheckReport) -> String {
    if report.is_empty() {
        return format!(
            "✅ Check complete\n🕐 {}\n\nAll {} domains are reachable, no action needed.",
            chrono::Local::now().format(TIME_FORMAT),
            report.healthy_count
        );
    }
    render_digest("📊 Manual check report", report, InfraLine::Plain)
}

enum InfraLine {
    Hidden,
    WithCount(u32),
    Plain,
}

fn render_digest(title: &str, report: &CheckReport, infra: InfraLine) -> String {
    let mut out = format!("{title}\n🕐 {}\n", chrono::Local::now().format(TIME_FORMAT));

    if !report.switched.is_empty() {
        out.push_str("\n🔄 DNS switched\n");
        for s in &report.switched {
            let _ = writeln!(out, "  • {}:{}", s.domain, s.port);
            let _ = writeln!(out, "    {} → {}", s.record_type, s.new_record);
            let isp = if s.isp.is_empty() { "-" } else { s.isp.as_str() };
            let _ = writeln!(
                out,
                "    forward: {} | isp: {isp} | weight: {}",
                s.forward_domain, s.weight
            );
        }
    }

    if !report.failed_domains.is_empty() {
        match infra {
            InfraLine::Hidden => {}
            InfraLine::WithCount(count) => {
                let _ = writeln!(out, "\n⚠️ Probe backend failures ({count} in a row)");
                for address in &report.failed_domains {
                    let _ = writeln!(out, "  • {address}");
                }
            }
            InfraLine::Plain => {
                out.push_str("\n⚠️ Probe backend failures\n");
                for address in &report.failed_domains {
                    let _ = writeln!(out, "  • {address}");
                }
            }
        }
    }

    if !report.disconnected.is_empty() {
        out.push_str("\n❌ Primary unreachable\n");
        for d in &report.disconnected {
            let _ = writeln!(out, "  • {}:{} ({})", d.domain, d.port, d.reason);
        }
    }

    if !report.banned_forwards.is_empty() {
        out.push_str("\n🚫 Forwards banned for 24h\n");
        for forward in &report.banned_forwards {
            let _ = writeln!(out, "  • {forward}");
        }
    }

    if !report.commit_failures.is_empty() {
        out.push_str("\n❗ DNS update failed\n");
        for c in &report.commit_failures {
            let _ = writeln!(out, "  • {}:{} → {}", c.domain, c.port, c.forward_domain);
            let _ = writeln!(out, "    {}", c.reason);
        }
    }

    if !report.no_forward.is_empty() {
        out.push_str("\n🆘 No available forward\n");
        for n in &report.no_forward {
            let note = match n.reason {
                NoForwardReason::NoneConfigured => "no forwards configured",
                NoForwardReason::NoneAvailable => "all forwards banned or down, act now",
            };
            let _ = writeln!(out, "  • {}:{} ({note})", n.domain, n.port);
        }
    }

    let _ = write!(out, "\n{RULE}\nHealthy: {}", report.healthy_count);
    out
}

/// Delivers rendered reports to every active admin.
pub struct Reporter {
    ctx: Arc<ServiceContext>,
    gap: Duration,
}

impl Reporter {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            ctx,
            gap: NOTIFY_GAP,
        }
    }

    #[must_use]
    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Super admin first, then every non-banned admin, without duplicates.
    pub async fn recipients(&self) -> CoreResult<Vec<i64>> {
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();

        let super_admin = self.ctx.settings.super_admin_id;
        if super_admin != 0 && seen.insert(super_admin) {
            recipients.push(super_admin);
        }
        for admin in self.ctx.admin_repository.list().await? {
            if !admin.is_ban && seen.insert(admin.uid) {
                recipients.push(admin.uid);
            }
        }
        Ok(recipients)
    }

    /// Send `text` to every recipient. A failed delivery is logged and the
    /// rest still get it. Returns how many deliveries succeeded.
    pub async fn publish(&self, text: &str) -> CoreResult<usize> {
        let recipients = self.recipients().await?;
        if recipients.is_empty() {
            log::warn!("No recipients for check report");
            return Ok(0);
        }

        let mut delivered = 0;
        for (i, chat_id) in recipients.iter().enumerate() {
            if i > 0 && !self.gap.is_zero() {
                tokio::time::sleep(self.gap).await;
            }
            match self.ctx.notifier.send(*chat_id, text).await {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("Failed to notify {chat_id}: {e}"),
            }
        }
        log::info!("Check report delivered to {delivered}/{} recipients", recipients.len());
        Ok(delivered)
    }
}
