//! Probe service façade used by the check-backend HTTP handlers.

mod public_ip;
mod resolver;
mod tcp;

use std::net::SocketAddr;

use dns_failover_provider::{ProbeProgressSender, ProbeReport};

use crate::error::{ProbeError, ProbeResult};
use crate::types::TcpCheckOptions;

use public_ip::{IPINFO_URL, PublicIpCache};

/// Validate and normalise a probe target (hostname or IP literal).
fn validate_target(target: &str) -> ProbeResult<String> {
    let target = target.trim().trim_end_matches('.');
    if target.is_empty() {
        return Err(ProbeError::ValidationError("target is required".to_string()));
    }
    if target.len() > 253 {
        return Err(ProbeError::ValidationError(format!(
            "target exceeds maximum length of 253 characters (got {})",
            target.len()
        )));
    }
    if target.contains(char::is_whitespace) || target.contains('/') {
        return Err(ProbeError::ValidationError(format!(
            "invalid target: {target}"
        )));
    }
    Ok(target.to_ascii_lowercase())
}

/// Entry point for every check the backend runs.
///
/// ```rust,no_run
/// use dns_failover_probe::ProbeService;
/// # async fn demo() -> dns_failover_probe::ProbeResult<()> {
/// let service = ProbeService::new()?;
/// let report = service.tcp_check("edge-1.example.net", 443, None).await?;
/// println!("{} -> {}", report.target_ip, report.message);
/// # Ok(())
/// # }
/// ```
pub struct ProbeService {
    options: TcpCheckOptions,
    public_ip: PublicIpCache,
}

impl ProbeService {
    pub fn new() -> ProbeResult<Self> {
        Self::with_options(TcpCheckOptions::default())
    }

    pub fn with_options(options: TcpCheckOptions) -> ProbeResult<Self> {
        Ok(Self {
            options,
            public_ip: PublicIpCache::new(IPINFO_URL)?,
        })
    }

    /// Resolve `target` and dial `target:port` with the configured attempts.
    ///
    /// A target that does not resolve yields a single negative report with
    /// no TCP attempt and `exhausted = false`.
    pub async fn tcp_check(
        &self,
        target: &str,
        port: u16,
        progress: Option<&ProbeProgressSender>,
    ) -> ProbeResult<ProbeReport> {
        let target = validate_target(target)?;
        if port == 0 {
            return Err(ProbeError::ValidationError("port must be 1-65535".to_string()));
        }

        let mut report = match resolver::resolve_first(&target).await {
            Ok(ip) => {
                tcp::connect_attempts(&target, SocketAddr::new(ip, port), &self.options, progress)
                    .await
            }
            Err(e) => {
                log::info!("cannot resolve {target}: {e}");
                unresolved_report(&target, &e)
            }
        };
        report.backend_public_ip = self.public_ip.get().await;
        Ok(report)
    }

    /// Resolve `target` without connecting. `result` is always `false`.
    pub async fn resolve_ip(&self, target: &str) -> ProbeResult<ProbeReport> {
        let target = validate_target(target)?;
        let mut report = match resolver::resolve_first(&target).await {
            Ok(ip) => ProbeReport {
                reachable: false,
                target: target.clone(),
                target_ip: ip.to_string(),
                message: format!("{target} 解析为 {ip}"),
                backend_public_ip: String::new(),
                exhausted: Some(false),
            },
            Err(e) => unresolved_report(&target, &e),
        };
        report.backend_public_ip = self.public_ip.get().await;
        Ok(report)
    }
}

fn unresolved_report(target: &str, error: &str) -> ProbeReport {
    ProbeReport {
        reachable: false,
        target: target.to_string(),
        target_ip: String::new(),
        message: format!("cannot resolve target {target}: {error}"),
        backend_public_ip: String::new(),
        exhausted: Some(false),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn validate_target_normalises() {
        assert_eq!(validate_target("  Edge-1.Example.NET. ").unwrap(), "edge-1.example.net");
        assert_eq!(validate_target("10.0.0.1").unwrap(), "10.0.0.1");
    }

    #[test]
    fn validate_target_rejects_garbage() {
        for bad in ["", "   ", "a b.com", "http://x.com"] {
            assert!(
                matches!(validate_target(bad), Err(ProbeError::ValidationError(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_target(&"a".repeat(254)).is_err());
    }

    #[test]
    fn unresolved_report_is_not_exhaustion() {
        let report = unresolved_report("x.invalid", "no records");
        assert!(!report.reachable);
        assert!(!report.is_exhausted());
        assert!(report.message.starts_with("cannot resolve target x.invalid"));
    }

    #[tokio::test]
    async fn port_zero_is_rejected() {
        let service = ProbeService::new().unwrap();
        assert!(matches!(
            service.tcp_check("127.0.0.1", 0, None).await,
            Err(ProbeError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn ip_literal_resolves_to_itself() {
        let service = ProbeService::new().unwrap();
        let report = service.resolve_ip("192.0.2.1").await.unwrap();
        assert!(!report.reachable);
        assert_eq!(report.target_ip, "192.0.2.1");
    }
}
