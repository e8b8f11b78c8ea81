//! 转发域名择优

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::services::ban_ledger::{BanLedger, BanState, ban_state};
use crate::services::failure_counter::InfraFailureCounter;
use crate::traits::ReachabilityProber;
use crate::types::{CheckEvent, CheckEventSender, Forward, ProbeProgress, ProbeReport, emit};

/// Selector order: `weight` desc, `sort_order` asc, `id` asc.
pub fn sort_candidates(forwards: &mut [Forward]) {
    forwards.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then(a.sort_order.cmp(&b.sort_order))
            .then(a.id.cmp(&b.id))
    });
}

/// The first reachable candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chosen {
    /// Index into the (sorted) slice passed to [`CandidateSelector::select`].
    pub index: usize,
    /// IP the backend connected to.
    pub resolved_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub chosen: Option<Chosen>,
    /// Forward domains banned while selecting.
    pub banned: Vec<String>,
}

/// Walks a domain's forwards in order and returns the first reachable one.
pub struct CandidateSelector<'a> {
    prober: &'a dyn ReachabilityProber,
    ledger: &'a BanLedger,
    counter: &'a InfraFailureCounter,
}

impl<'a> CandidateSelector<'a> {
    #[must_use]
    pub fn new(
        prober: &'a dyn ReachabilityProber,
        ledger: &'a BanLedger,
        counter: &'a InfraFailureCounter,
    ) -> Self {
        Self {
            prober,
            ledger,
            counter,
        }
    }

    /// Sort `forwards` in place and probe them until one answers reachable.
    ///
    /// - Banned candidates are skipped without a probe; expired bans are lifted first.
    /// - A probe error counts as an infra failure and never bans.
    /// - Only an exhausted unreachable answer (every attempt failed) bans for 24h.
    pub async fn select(
        &self,
        forwards: &mut [Forward],
        port: u16,
        now: DateTime<Utc>,
        events: Option<&CheckEventSender>,
    ) -> Selection {
        sort_candidates(forwards);
        let total = forwards.len();
        let mut selection = Selection::default();

        for (index, forward) in forwards.iter_mut().enumerate() {
            emit(
                events,
                CheckEvent::ProbingForward {
                    index: index + 1,
                    total,
                    forward_domain: forward.forward_domain.clone(),
                },
            );

            match ban_state(forward, now) {
                BanState::Active | BanState::Permanent => {
                    log::info!("Skipping banned forward {}", forward.forward_domain);
                    continue;
                }
                BanState::Expired => match self.ledger.release_if_expired(forward, now).await {
                    Ok(true) => {}
                    Ok(false) => {
                        log::info!("Skipping re-banned forward {}", forward.forward_domain);
                        continue;
                    }
                    Err(e) => {
                        log::error!(
                            "Failed to lift expired ban on {}: {e}",
                            forward.forward_domain
                        );
                    }
                },
                BanState::Clear => {}
            }

            let report =
                match probe_relayed(self.prober, &forward.forward_domain, port, events).await {
                    Ok(report) => report,
                    Err(e) => {
                        self.counter.increment();
                        log::warn!(
                            "Probe of forward {}:{port} failed: {e}",
                            forward.forward_domain
                        );
                        continue;
                    }
                };
            self.counter.reset();

            if report.reachable {
                log::info!(
                    "Forward {}:{port} reachable via {}",
                    forward.forward_domain,
                    report.target_ip
                );
                selection.chosen = Some(Chosen {
                    index,
                    resolved_ip: report.target_ip,
                });
                break;
            }

            if report.is_exhausted() {
                if let Err(e) = self.ledger.ban_exhausted(forward, now).await {
                    log::error!("Failed to persist ban of {}: {e}", forward.forward_domain);
                }
                selection.banned.push(forward.forward_domain.clone());
            } else {
                log::warn!(
                    "Forward {}:{port} unreachable, not banned: {}",
                    forward.forward_domain,
                    report.message
                );
            }
        }

        selection
    }
}

/// Probe `target:port`, relaying backend attempts as [`CheckEvent::ProbeAttempt`].
pub(crate) async fn probe_relayed(
    prober: &dyn ReachabilityProber,
    target: &str,
    port: u16,
    events: Option<&CheckEventSender>,
) -> dns_failover_provider::Result<ProbeReport> {
    let Some(events) = events else {
        return prober.probe(target, port, None).await;
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<ProbeProgress>();
    let probe = async move {
        let result = prober.probe(target, port, Some(&tx)).await;
        drop(tx);
        result
    };
    let relay = async {
        while let Some(progress) = rx.recv().await {
            let _ = events.send(CheckEvent::ProbeAttempt {
                target: progress.target,
                current: progress.current,
                total: progress.total,
            });
        }
    };

    let (result, ()) = tokio::join!(probe, relay);
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;

    use super::*;
    use crate::test_utils::{MockDomainRepository, MockProbe, MockProber, seed_domain, seed_forward};
    use crate::traits::DomainRepository;

    fn forward(id: i64, weight: i32, sort_order: i32) -> Forward {
        let now = Utc::now();
        Forward {
            id,
            domain_id: 1,
            forward_domain: format!("f{id}.example.net"),
            ip: String::new(),
            isp: String::new(),
            is_ban: false,
            ban_until: None,
            weight,
            sort_order,
            record_type: crate::types::RecordKind::A,
            last_resolved_at: None,
            resolve_status: crate::types::ResolveStatus::Never,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sorts_by_weight_then_sort_then_id() {
        let mut forwards = vec![forward(3, 5, 1), forward(1, 10, 2), forward(2, 10, 1), forward(4, 5, 1)];
        sort_candidates(&mut forwards);
        let ids: Vec<i64> = forwards.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
    }

    fn setup() -> (Arc<MockDomainRepository>, Arc<MockProber>, BanLedger, InfraFailureCounter) {
        let repo = Arc::new(MockDomainRepository::new());
        let prober = Arc::new(MockProber::new());
        let ledger = BanLedger::new(repo.clone());
        (repo, prober, ledger, InfraFailureCounter::new(3))
    }

    #[tokio::test]
    async fn picks_first_reachable_in_order() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        seed_forward(&repo, domain.id, "low.example.net", 1, 0).await;
        seed_forward(&repo, domain.id, "high.example.net", 10, 0).await;
        prober.script("high.example.net", MockProbe::Reachable("9.9.9.9")).await;
        prober.script("low.example.net", MockProbe::Reachable("8.8.8.8")).await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let selection = selector.select(&mut forwards, 443, Utc::now(), None).await;

        let chosen = selection.chosen.unwrap();
        assert_eq!(forwards[chosen.index].forward_domain, "high.example.net");
        assert_eq!(chosen.resolved_ip, "9.9.9.9");
        assert_eq!(prober.probed().await, vec!["high.example.net:443"]);
    }

    #[tokio::test]
    async fn exhausted_candidate_is_banned_and_next_one_wins() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        let dead = seed_forward(&repo, domain.id, "dead.example.net", 10, 0).await;
        seed_forward(&repo, domain.id, "alive.example.net", 5, 0).await;
        prober.script("dead.example.net", MockProbe::Exhausted).await;
        prober.script("alive.example.net", MockProbe::Reachable("1.1.1.1")).await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let now = Utc::now();
        let selection = selector.select(&mut forwards, 443, now, None).await;

        assert_eq!(selection.banned, vec!["dead.example.net"]);
        assert_eq!(
            forwards[selection.chosen.unwrap().index].forward_domain,
            "alive.example.net"
        );
        let stored = repo.forward(dead.id).await.unwrap();
        assert!(stored.is_ban);
        assert_eq!(stored.ban_until, Some(now + TimeDelta::hours(24)));
    }

    #[tokio::test]
    async fn infra_error_counts_but_never_bans() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        let forward = seed_forward(&repo, domain.id, "flaky.example.net", 10, 0).await;
        prober.script("flaky.example.net", MockProbe::InfraError).await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let selection = selector.select(&mut forwards, 443, Utc::now(), None).await;

        assert!(selection.chosen.is_none());
        assert!(selection.banned.is_empty());
        assert_eq!(counter.count(), 1);
        assert!(!repo.forward(forward.id).await.unwrap().is_ban);
    }

    #[tokio::test]
    async fn partial_failure_is_not_banned() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        let forward = seed_forward(&repo, domain.id, "slow.example.net", 10, 0).await;
        prober
            .script("slow.example.net", MockProbe::Unreachable("cannot resolve target"))
            .await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let selection = selector.select(&mut forwards, 443, Utc::now(), None).await;

        assert!(selection.chosen.is_none());
        assert!(selection.banned.is_empty());
        assert!(!repo.forward(forward.id).await.unwrap().is_ban);
    }

    #[tokio::test]
    async fn banned_candidates_are_skipped_without_probe() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        let mut banned = seed_forward(&repo, domain.id, "banned.example.net", 10, 0).await;
        ledger.ban_manually(&mut banned, Utc::now()).await.unwrap();
        seed_forward(&repo, domain.id, "ok.example.net", 1, 0).await;
        prober.script("ok.example.net", MockProbe::Reachable("2.2.2.2")).await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let selection = selector.select(&mut forwards, 443, Utc::now(), None).await;

        assert!(selection.chosen.is_some());
        assert_eq!(prober.probed().await, vec!["ok.example.net:443"]);
    }

    #[tokio::test]
    async fn expired_ban_is_lifted_and_probed() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        let mut forward = seed_forward(&repo, domain.id, "back.example.net", 10, 0).await;
        ledger
            .ban_exhausted(&mut forward, Utc::now() - TimeDelta::hours(30))
            .await
            .unwrap();
        prober.script("back.example.net", MockProbe::Reachable("3.3.3.3")).await;

        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        let selection = selector.select(&mut forwards, 443, Utc::now(), None).await;

        assert!(selection.chosen.is_some());
        assert!(!repo.forward(forward.id).await.unwrap().is_ban);
    }

    #[tokio::test]
    async fn relays_probe_attempts_as_events() {
        let (repo, prober, ledger, counter) = setup();
        let domain = seed_domain(&repo, "api.example.com", 443).await;
        seed_forward(&repo, domain.id, "edge.example.net", 10, 0).await;
        prober.script("edge.example.net", MockProbe::Reachable("4.4.4.4")).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwards = repo.list_forwards(domain.id).await.unwrap();
        let selector = CandidateSelector::new(prober.as_ref(), &ledger, &counter);
        selector.select(&mut forwards, 443, Utc::now(), Some(&tx)).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events[0], CheckEvent::ProbingForward { index: 1, total: 1, .. }));
        assert!(matches!(events[1], CheckEvent::ProbeAttempt { current: 1, .. }));
    }
}
