//! Timed TCP connect attempts with per-attempt progress.

use std::net::SocketAddr;

use dns_failover_provider::{ProbeProgress, ProbeProgressSender, ProbeReport};
use tokio::net::TcpStream;

use crate::types::TcpCheckOptions;

/// Dial `addr` up to `options.attempts` times.
///
/// Each attempt is announced on `progress` before dialling. The first
/// successful connection ends the check; when every attempt fails the report
/// carries the terminal "检测结束 ... 无法连接" message and `exhausted = true`.
pub(crate) async fn connect_attempts(
    target: &str,
    addr: SocketAddr,
    options: &TcpCheckOptions,
    progress: Option<&ProbeProgressSender>,
) -> ProbeReport {
    let total = options.attempts.max(1);
    let address = addr.to_string();
    let mut last_error = String::new();

    for current in 1..=total {
        if let Some(tx) = progress {
            let _ = tx.send(ProbeProgress {
                current,
                total,
                target: target.to_string(),
                address: address.clone(),
            });
        }

        match tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => {
                log::debug!("{target} ({address}) connected on attempt {current}/{total}");
                return ProbeReport {
                    reachable: true,
                    target: target.to_string(),
                    target_ip: addr.ip().to_string(),
                    message: format!("目标 {address} 连接成功"),
                    backend_public_ip: String::new(),
                    exhausted: Some(false),
                };
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = "i/o timeout".to_string(),
        }

        log::debug!("{target} ({address}) attempt {current}/{total} failed: {last_error}");
        if current < total {
            tokio::time::sleep(options.retry_interval).await;
        }
    }

    log::info!("{target} ({address}) unreachable after {total} attempts: {last_error}");
    ProbeReport {
        reachable: false,
        target: target.to_string(),
        target_ip: addr.ip().to_string(),
        message: format!("检测结束,目标 {address}无法连接: {last_error}"),
        backend_public_ip: String::new(),
        exhausted: Some(true),
    }
}
