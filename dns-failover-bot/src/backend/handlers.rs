//! Check-backend HTTP handlers.
//!
//! `tcp_checks` answers with NDJSON: one progress line per attempt, then a
//! single terminal line. Errors before the stream starts are plain JSON
//! envelopes with a 4xx status.

use actix_web::http::StatusCode;
use actix_web::web::{self, Bytes};
use actix_web::{HttpResponse, post};
use dns_failover_probe::{ProbeError, ProbeService};
use dns_failover_provider::{BackendEnvelope, ProbeProgress, ProbeRequestBody};
use serde::Serialize;
use tokio::sync::mpsc;

const NDJSON: &str = "application/x-ndjson";

/// Shared handler state.
pub struct BackendState {
    probe: ProbeService,
    key: String,
}

impl BackendState {
    pub fn new(probe: ProbeService, key: impl Into<String>) -> Self {
        Self {
            probe,
            key: key.into(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(tcp_checks).service(resolve_ip);
}

fn reject(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    let code = i32::from(status.as_u16());
    HttpResponse::build(status).json(BackendEnvelope::error(code, message))
}

/// Decode the body and check the shared key.
fn authorize(state: &BackendState, body: &[u8]) -> Result<ProbeRequestBody, HttpResponse> {
    let request: ProbeRequestBody = serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Malformed probe request: {e}");
        reject(StatusCode::BAD_REQUEST, format!("invalid request body: {e}"))
    })?;
    if request.key != state.key {
        tracing::warn!(target = %request.target, "Rejected probe request with a bad key");
        return Err(reject(StatusCode::UNAUTHORIZED, "invalid backend key"));
    }
    if request.target.trim().is_empty() {
        return Err(reject(StatusCode::BAD_REQUEST, "target is required"));
    }
    Ok(request)
}

fn encode<T: Serialize>(envelope: &BackendEnvelope<T>) -> Bytes {
    let mut line = serde_json::to_vec(envelope).unwrap_or_else(|e| {
        tracing::error!("Failed to encode backend line: {e}");
        Vec::new()
    });
    line.push(b'\n');
    Bytes::from(line)
}

fn error_line(error: &ProbeError) -> Bytes {
    let code = if error.is_expected() { 400 } else { 500 };
    encode(&BackendEnvelope::error(code, error.to_string()))
}

#[post("/api/v1/tcp_checks")]
async fn tcp_checks(state: web::Data<BackendState>, body: Bytes) -> HttpResponse {
    let request = match authorize(&state, &body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    if request.port == 0 {
        return reject(StatusCode::BAD_REQUEST, "port must be 1-65535");
    }
    tracing::info!(target = %request.target, port = request.port, "TCP check requested");

    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
    actix_web::rt::spawn(run_check(state, request, tx));

    let lines = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|line| (Ok::<_, actix_web::Error>(line), rx))
    });
    HttpResponse::Ok().content_type(NDJSON).streaming(lines)
}

/// Run one check, writing progress and the terminal line to `lines`.
async fn run_check(
    state: web::Data<BackendState>,
    request: ProbeRequestBody,
    lines: mpsc::UnboundedSender<Bytes>,
) {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProbeProgress>();

    let check = async move {
        let result = state
            .probe
            .tcp_check(&request.target, request.port, Some(&progress_tx))
            .await;
        drop(progress_tx);
        result
    };
    let relay = async {
        while let Some(progress) = progress_rx.recv().await {
            // Client went away; keep draining so the check can finish
            let _ = lines.send(encode(&BackendEnvelope::progress(progress)));
        }
    };
    let (result, ()) = tokio::join!(check, relay);

    let last = match result {
        Ok(report) => {
            tracing::info!(
                target = %report.target,
                reachable = report.reachable,
                ip = %report.target_ip,
                "TCP check finished"
            );
            encode(&BackendEnvelope::result(report))
        }
        Err(e) => {
            tracing::warn!("TCP check failed: {e}");
            error_line(&e)
        }
    };
    let _ = lines.send(last);
}

#[post("/api/v1/resolve_ip")]
async fn resolve_ip(state: web::Data<BackendState>, body: Bytes) -> HttpResponse {
    let request = match authorize(&state, &body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.probe.resolve_ip(&request.target).await {
        Ok(report) => {
            tracing::info!(target = %report.target, ip = %report.target_ip, "Resolved");
            HttpResponse::Ok()
                .content_type(NDJSON)
                .body(encode(&BackendEnvelope::result(report)))
        }
        Err(e) if e.is_expected() => reject(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            tracing::error!("Resolve failed: {e}");
            reject(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use actix_web::{App, test};
    use dns_failover_probe::TcpCheckOptions;
    use dns_failover_provider::BackendLine;

    use super::*;

    const KEY: &str = "shared-secret";

    fn state() -> web::Data<BackendState> {
        let options = TcpCheckOptions {
            attempts: 1,
            connect_timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(10),
        };
        web::Data::new(BackendState::new(
            ProbeService::with_options(options).unwrap(),
            KEY,
        ))
    }

    fn body(target: &str, port: u16, key: &str) -> String {
        serde_json::json!({ "target": target, "port": port, "key": key }).to_string()
    }

    #[actix_web::test]
    async fn wrong_key_is_unauthorized() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/tcp_checks")
            .set_payload(body("127.0.0.1", 80, "nope"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["code"], 401);
        assert_eq!(json["message"], "invalid backend key");
    }

    #[actix_web::test]
    async fn malformed_body_is_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/tcp_checks")
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn port_zero_is_bad_request() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/tcp_checks")
            .set_payload(body("127.0.0.1", 0, KEY))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn reachable_target_streams_progress_then_result() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/tcp_checks")
            .set_payload(body("127.0.0.1", port, KEY))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let raw = test::read_body(resp).await;
        let text = std::str::from_utf8(&raw).unwrap();
        let lines: Vec<BackendLine> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| BackendLine::parse(l).unwrap())
            .collect();

        assert!(matches!(lines.first(), Some(BackendLine::Progress(p)) if p.current == 1));
        let Some(BackendLine::Result(report)) = lines.last() else {
            panic!("missing terminal line: {text}");
        };
        assert!(report.reachable);
        assert_eq!(report.target_ip, "127.0.0.1");
        drop(listener);
    }

    #[actix_web::test]
    async fn resolve_ip_answers_one_line() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/v1/resolve_ip")
            .set_payload(body("192.0.2.10", 0, KEY))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let raw = test::read_body(resp).await;
        let text = std::str::from_utf8(&raw).unwrap().trim();
        let BackendLine::Result(report) = BackendLine::parse(text).unwrap() else {
            panic!("expected a result line: {text}");
        };
        assert!(!report.reachable);
        assert_eq!(report.target_ip, "192.0.2.10");
    }
}
