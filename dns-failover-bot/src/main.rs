//! DNS failover controller entry point.
//!
//! `start.mode` picks what runs in this process: the Telegram bot with its
//! scheduled checks, the check backend, or both.

mod backend;
mod config;
mod logging;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dns_failover_app::AppStateBuilder;
use dns_failover_app::adapters::SqliteStore;
use dns_failover_probe::ProbeService;
use dns_failover_provider::{CheckBackendClient, CloudflareProvider, HttpClientOptions};
use tokio::sync::watch;

use config::Config;
use telegram::{TelegramClient, TelegramNotifier};

/// Resolves once shutdown has been requested (or the sender is gone).
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

fn listen_for_ctrl_c(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            // Keep the sender alive so nothing treats this as a shutdown
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
        let _ = tx.send(true);
    });
}

async fn run_bot(config: &Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let db_path = config.database_path()?;
    let store = Arc::new(
        SqliteStore::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "Database ready");

    let proxy = config.proxy();
    let http = HttpClientOptions {
        proxy: proxy.clone(),
        ..HttpClientOptions::default()
    };
    let gateway = CloudflareProvider::new(config.cloudflare.api_token.clone(), &http)
        .context("Failed to build Cloudflare client")?;

    // Streamed probes are bounded by the probe timeout, not the HTTP client
    let prober_http = HttpClientOptions {
        request_timeout: None,
        ..HttpClientOptions::default()
    };
    let prober = CheckBackendClient::new(
        config.backend_url.api.as_str(),
        config.backend_url.key.as_str(),
        &prober_http,
    )
    .context("Failed to build check backend client")?
    .with_probe_timeout(Duration::from_secs(config.backend_url.timeout_secs))
    .with_max_retries(config.backend_url.max_retries);

    let poll_timeout = Duration::from_secs(config.telegram.poll_timeout_secs);
    let client = Arc::new(
        TelegramClient::new(
            &config.telegram.api_endpoint,
            &config.telegram.token,
            proxy,
            poll_timeout,
        )
        .context("Failed to build Telegram client")?,
    );

    let state = Arc::new(
        AppStateBuilder::new()
            .domain_repository(store.clone())
            .admin_repository(store)
            .prober(Arc::new(prober))
            .gateway(Arc::new(gateway))
            .notifier(Arc::new(TelegramNotifier::new(client.clone())))
            .settings(config.failover_settings())
            .check_interval(config.check_interval())
            .build()?,
    );

    let scheduler = state.scheduler.clone();
    let scheduled = async {
        scheduler.run(stopped(shutdown.clone())).await;
        anyhow::Ok(())
    };
    let polling = telegram::run(client, state, poll_timeout, stopped(shutdown.clone()));
    tokio::try_join!(polling, scheduled)?;
    Ok(())
}

async fn run_backend(config: &Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let probe = ProbeService::new().context("Failed to start probe engine")?;
    backend::serve(&config.backend_listen, probe, stopped(shutdown)).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config::resolve_path(std::env::args().nth(1))?;
    let config = Config::load(&path)?;
    let _log_guard = logging::init(&config.logger)?;
    let mode = config.start.mode;
    tracing::info!(config = %path.display(), %mode, "Starting dns-failover");

    let (stop_tx, stop_rx) = watch::channel(false);
    listen_for_ctrl_c(stop_tx);

    let bot = async {
        if mode.runs_bot() {
            run_bot(&config, stop_rx.clone()).await
        } else {
            Ok(())
        }
    };
    let backend = async {
        if mode.runs_backend() {
            run_backend(&config, stop_rx.clone()).await
        } else {
            Ok(())
        }
    };
    // Joined on this task: the actix server future is not `Send`
    tokio::try_join!(bot, backend)?;

    tracing::info!("Bye");
    Ok(())
}
