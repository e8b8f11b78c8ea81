//! Check-backend HTTP server (`/api/v1/tcp_checks`, `/api/v1/resolve_ip`).

mod handlers;

use std::future::Future;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::Context;
use dns_failover_probe::ProbeService;

use crate::config::BackendListenConfig;
use handlers::BackendState;

/// Serve until `shutdown` resolves, then stop gracefully.
///
/// Signal handling stays with the caller so bot and backend shut down together.
pub async fn serve<F>(
    config: &BackendListenConfig,
    probe: ProbeService,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let state = web::Data::new(BackendState::new(probe, config.key.clone()));

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .client_request_timeout(Duration::from_secs(config.read_timeout_secs))
    .client_disconnect_timeout(Duration::from_secs(config.disconnect_timeout_secs))
    .disable_signals();
    if let Some(workers) = config.workers {
        server = server.workers(workers.max(1));
    }

    let server = server
        .bind((config.host.as_str(), config.port))
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?
        .run();
    let handle = server.handle();
    tracing::info!("Check backend listening on {}:{}", config.host, config.port);

    tokio::select! {
        result = server => result.context("Check backend server failed")?,
        () = shutdown => {
            tracing::info!("Stopping check backend");
            handle.stop(true).await;
        }
    }
    Ok(())
}
