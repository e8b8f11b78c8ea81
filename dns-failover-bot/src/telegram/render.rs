//! Plain-text replies.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use dns_failover_core::services::{BanState, ban_state};
use dns_failover_core::types::{
    Access, Admin, CheckEvent, Domain, DomainSwitch, DomainWithForwards, Forward, ImportSummary,
    ResolveStatus,
};

use super::client::User;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

pub fn welcome() -> String {
    "🤖 DNS failover bot\n\n\
     Send /id to request access, then ask the super admin to approve you.\n\
     Admins: /help lists every command."
        .to_string()
}

pub fn user_info(user: &User, status: &str) -> String {
    format!(
        "👤 Telegram user\n\nID: {}\nUsername: {}\nName: {} {}\nStatus: {status}",
        user.id,
        user.username.as_deref().map_or_else(|| "-".to_string(), |u| format!("@{u}")),
        user.first_name,
        user.last_name.as_deref().unwrap_or_default(),
    )
}

pub fn access_label(access: Access) -> &'static str {
    match access {
        Access::SuperAdmin => "super admin",
        Access::Admin => "admin",
        Access::Banned => "banned or awaiting approval",
        Access::Unknown => "not registered",
    }
}

pub fn domain_list(domains: &[Domain]) -> String {
    if domains.is_empty() {
        return "ℹ️ No domains configured. Import some with /upload_domains.".to_string();
    }
    let mut out = format!("📋 Domains ({})\n\n", domains.len());
    for d in domains {
        let check = if d.is_disable_check { "⏸" } else { "✅" };
        let _ = write!(out, "{check} #{} {}", d.id, d.address());
        if !d.has_dns_target() {
            out.push_str(" ⚠️ DNS ids missing");
        }
        out.push('\n');
    }
    out.push_str("\n/domain <id> for details");
    out
}

fn ban_label(forward: &Forward, now: DateTime<Utc>) -> String {
    match ban_state(forward, now) {
        BanState::Clear | BanState::Expired => "not banned".to_string(),
        BanState::Permanent => "banned permanently".to_string(),
        BanState::Active => forward
            .ban_until
            .map_or_else(String::new, |until| format!("banned until {}", local(until))),
    }
}

fn status_icon(forward: &Forward, now: DateTime<Utc>) -> &'static str {
    match (ban_state(forward, now), forward.resolve_status) {
        (BanState::Active | BanState::Permanent, _) => "🚫",
        (_, ResolveStatus::Success) => "🟢",
        (_, ResolveStatus::Failed) => "🔴",
        (_, ResolveStatus::Never) => "⚪",
    }
}

pub fn domain_detail(item: &DomainWithForwards) -> String {
    let now = Utc::now();
    let d = &item.domain;
    let mut out = format!("🌐 #{} {}\n\n", d.id, d.address());
    let _ = writeln!(
        out,
        "Checking: {}",
        if d.is_disable_check { "disabled" } else { "enabled" }
    );
    let _ = writeln!(out, "Zone ID: {}", or_dash(&d.zone_id));
    let _ = writeln!(out, "Record ID: {}", or_dash(&d.record_id));
    let _ = writeln!(out, "Sort: {}", d.sort_order);

    if item.forwards.is_empty() {
        out.push_str("\nNo forwards. Add one with /add_forward.");
        return out;
    }
    let _ = writeln!(out, "\nForwards ({})", item.forwards.len());
    for f in &item.forwards {
        let _ = writeln!(
            out,
            "{} #{} {} [{}] w={} ip={} isp={}",
            status_icon(f, now),
            f.id,
            f.forward_domain,
            f.record_type,
            f.weight,
            or_dash(&f.ip),
            or_dash(&f.isp),
        );
    }
    out.push_str("\n🟢 active 🔴 failed ⚪ standby 🚫 banned");
    out
}

pub fn forward_detail(forward: &Forward) -> String {
    let now = Utc::now();
    let mut out = format!("↪️ Forward #{} {}\n\n", forward.id, forward.forward_domain);
    let _ = writeln!(out, "Domain ID: {}", forward.domain_id);
    let _ = writeln!(out, "Type: {}", forward.record_type);
    let _ = writeln!(out, "IP: {}", or_dash(&forward.ip));
    let _ = writeln!(out, "ISP: {}", or_dash(&forward.isp));
    let _ = writeln!(out, "Weight: {} | Sort: {}", forward.weight, forward.sort_order);
    let _ = writeln!(out, "Ban: {}", ban_label(forward, now));
    let _ = write!(out, "Status: {}", forward.resolve_status);
    if let Some(at) = forward.last_resolved_at {
        let _ = write!(out, " ({})", local(at));
    }
    out
}

pub fn switched(switch: &DomainSwitch) -> String {
    format!(
        "✅ {}:{} now points to {} via {} ({} {})",
        switch.domain,
        switch.port,
        switch.forward_domain,
        switch.new_record,
        switch.record_type,
        or_dash(&switch.isp),
    )
}

pub fn admin_list(admins: &[Admin]) -> String {
    if admins.is_empty() {
        return "ℹ️ No admins registered yet.".to_string();
    }
    let mut out = format!("👥 Admins ({})\n\n", admins.len());
    for a in admins {
        let state = if a.is_ban { "🚫" } else { "✅" };
        let _ = write!(out, "{state} {} uid={}", a.display_name(), a.uid);
        if !a.remark.is_empty() {
            let _ = write!(out, " ({})", a.remark);
        }
        out.push('\n');
    }
    out.push_str("\n/unban_admin <uid> approves, /ban_admin <uid> revokes");
    out
}

pub fn admin_profile(admin: Option<&Admin>, access: Access, uid: i64) -> String {
    let mut out = format!("👤 {uid}\nRole: {}\n", access_label(access));
    if let Some(a) = admin {
        let _ = writeln!(out, "Name: {}", a.display_name());
        let _ = writeln!(out, "Remark: {}", or_dash(&a.remark));
        let _ = writeln!(out, "Since: {}", local(a.created_at));
    }
    out
}

pub fn import_summary(summary: &ImportSummary) -> String {
    format!(
        "🎉 Import complete\n\nDomains created: {}\nDomains updated: {}\nForwards added: {}\nForwards skipped: {}",
        summary.domains_created,
        summary.domains_updated,
        summary.forwards_added,
        summary.forwards_skipped,
    )
}

/// Accumulates check events into a status message.
#[derive(Debug, Default)]
pub struct ProgressView {
    header: String,
    domain: Option<String>,
    forward: Option<String>,
    attempt: Option<String>,
}

impl ProgressView {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }

    pub fn apply(&mut self, event: &CheckEvent) {
        match event {
            CheckEvent::CycleStarted { domains } => {
                self.header = format!("🔍 Checking {domains} domains");
            }
            CheckEvent::DomainStarted {
                index,
                total,
                domain,
                port,
            } => {
                self.domain = Some(format!("[{index}/{total}] {domain}:{port}"));
                self.forward = None;
                self.attempt = None;
            }
            CheckEvent::ProbingForward {
                index,
                total,
                forward_domain,
            } => {
                self.forward = Some(format!("↪️ forward {index}/{total}: {forward_domain}"));
                self.attempt = None;
            }
            CheckEvent::ProbeAttempt {
                target,
                current,
                total,
            } => {
                self.attempt = Some(format!("⏱ {target} attempt {current}/{total}"));
            }
            CheckEvent::CycleFinished => {
                self.header = "📝 Check finished, building report".to_string();
                self.domain = None;
                self.forward = None;
                self.attempt = None;
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        for line in [&self.domain, &self.forward, &self.attempt].into_iter().flatten() {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}
