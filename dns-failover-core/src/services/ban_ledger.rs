//! 转发域名封禁台账

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::CoreResult;
use crate::traits::DomainRepository;
use crate::types::{Forward, ResolveStatus};

/// 自动封禁时长（小时）：5 次连接全部失败
pub const AUTO_BAN_HOURS: i64 = 24;
/// 手动封禁时长（天）：等同于永久，直到手动解封
pub const MANUAL_BAN_DAYS: i64 = 365;

/// Derived ban state of a forward at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanState {
    Clear,
    /// Banned until a future instant.
    Active,
    /// Banned with no expiry; only an explicit unban clears it.
    Permanent,
    /// Ban time has passed; lifted on the next read.
    Expired,
}

#[must_use]
pub fn ban_state(forward: &Forward, now: DateTime<Utc>) -> BanState {
    if !forward.is_ban {
        return BanState::Clear;
    }
    match forward.ban_until {
        None => BanState::Permanent,
        Some(until) if until > now => BanState::Active,
        Some(_) => BanState::Expired,
    }
}

/// Whether the selector may probe this forward.
#[must_use]
pub fn is_eligible(forward: &Forward, now: DateTime<Utc>) -> bool {
    matches!(ban_state(forward, now), BanState::Clear | BanState::Expired)
}

/// Applies and lifts bans. Every change is written through immediately.
pub struct BanLedger {
    repository: Arc<dyn DomainRepository>,
}

impl BanLedger {
    #[must_use]
    pub fn new(repository: Arc<dyn DomainRepository>) -> Self {
        Self { repository }
    }

    /// Ban for `duration` from `now` and mark the forward failed.
    ///
    /// Only the ban columns are written. A longer ban already stored (for
    /// instance a manual ban made while this forward was being probed) is
    /// kept, and `forward` is refreshed from storage instead.
    pub async fn ban(
        &self,
        forward: &mut Forward,
        duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let until = now + duration;
        let applied = self
            .repository
            .extend_ban(forward.id, until, ResolveStatus::Failed)
            .await?;

        if applied {
            forward.is_ban = true;
            forward.ban_until = Some(until);
            forward.resolve_status = ResolveStatus::Failed;
            log::info!(
                "Forward {} banned until {}",
                forward.forward_domain,
                until.format("%Y-%m-%d %H:%M:%S")
            );
        } else {
            log::info!(
                "Forward {} already banned for longer, keeping it",
                forward.forward_domain
            );
            self.reload(forward).await?;
        }
        Ok(())
    }

    /// 24h ban after every connection attempt failed.
    pub async fn ban_exhausted(&self, forward: &mut Forward, now: DateTime<Utc>) -> CoreResult<()> {
        self.ban(forward, TimeDelta::hours(AUTO_BAN_HOURS), now).await
    }

    /// Admin-triggered ban.
    pub async fn ban_manually(&self, forward: &mut Forward, now: DateTime<Utc>) -> CoreResult<()> {
        self.ban(forward, TimeDelta::days(MANUAL_BAN_DAYS), now).await
    }

    pub async fn unban(&self, forward: &mut Forward) -> CoreResult<()> {
        self.repository.lift_ban(forward.id, None).await?;
        forward.is_ban = false;
        forward.ban_until = None;
        log::info!("Forward {} unbanned", forward.forward_domain);
        Ok(())
    }

    /// Lift the ban of `forward` if it has expired at `now`.
    ///
    /// Returns whether the forward is clear afterwards. When storage holds a
    /// newer ban, `forward` is refreshed and `false` is returned.
    pub async fn release_if_expired(
        &self,
        forward: &mut Forward,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        match ban_state(forward, now) {
            BanState::Clear => return Ok(true),
            BanState::Active | BanState::Permanent => return Ok(false),
            BanState::Expired => {}
        }

        if self.repository.lift_ban(forward.id, Some(now)).await? {
            forward.is_ban = false;
            forward.ban_until = None;
            log::info!("Expired ban on {} lifted", forward.forward_domain);
            return Ok(true);
        }
        self.reload(forward).await?;
        Ok(is_eligible(forward, now))
    }

    /// Lift every expired ban in place. Returns how many were lifted.
    pub async fn release_expired(
        &self,
        forwards: &mut [Forward],
        now: DateTime<Utc>,
    ) -> CoreResult<usize> {
        let mut released = 0;
        for forward in forwards
            .iter_mut()
            .filter(|f| ban_state(f, now) == BanState::Expired)
        {
            if self.release_if_expired(forward, now).await? {
                released += 1;
            }
        }
        Ok(released)
    }

    async fn reload(&self, forward: &mut Forward) -> CoreResult<()> {
        if let Some(stored) = self.repository.find_forward(forward.id).await? {
            *forward = stored;
        }
        Ok(())
    }
}
