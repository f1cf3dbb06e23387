//! Local preview of the generated page.
//!
//! Serves the current code section under a sandboxing CSP so the page runs
//! scripts but gets an opaque origin, like an `<iframe sandbox="allow-scripts">`.
//! While a generation is streaming, `/` asks the browser to reload itself.

use std::net::SocketAddr;

use actix_web::{HttpRequest, HttpResponse, HttpServer, dev::Server, get, http::header, web};
use tokio::sync::watch;

use crate::{
    config::PreviewConfig,
    workspace::{GenerationStatus, Snapshot},
};

const SANDBOX_POLICY: &str = "sandbox allow-scripts";

/// Seconds between reloads of `/` while code is still streaming.
const REFRESH_SECS: &str = "2";

const WAITING_PAGE: &str = "<!DOCTYPE html>\n<html>\n  <head>\n    <title>webagent preview</title>\n    <meta http-equiv=\"refresh\" content=\"2\">\n  </head>\n  <body>\n    <p>Waiting for generated code...</p>\n  </body>\n</html>\n";

pub struct PreviewState {
    snapshots: watch::Receiver<Snapshot>,
}

#[get("/health")]
pub async fn health(_req: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().body("Ok")
}

#[get("/")]
pub async fn page(_req: HttpRequest, state: web::Data<PreviewState>) -> HttpResponse {
    let snapshot = state.snapshots.borrow();
    let body = snapshot
        .sections
        .code
        .text()
        .filter(|code| !code.is_empty())
        .unwrap_or(WAITING_PAGE)
        .to_string();

    let mut response = HttpResponse::Ok();
    response
        .content_type("text/html; charset=utf-8")
        .insert_header((header::CONTENT_SECURITY_POLICY, SANDBOX_POLICY))
        .insert_header((header::CACHE_CONTROL, "no-store"));
    if snapshot.status == GenerationStatus::Streaming {
        response.insert_header(("Refresh", REFRESH_SECS));
    }
    response.body(body)
}

#[get("/sections")]
pub async fn sections(_req: HttpRequest, state: web::Data<PreviewState>) -> HttpResponse {
    let snapshot = state.snapshots.borrow().clone();
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(snapshot)
}

/// Bind the preview server. The returned future must be awaited or spawned
/// for the server to run.
pub fn bind(
    config: &PreviewConfig,
    snapshots: watch::Receiver<Snapshot>,
) -> std::io::Result<(Server, SocketAddr)> {
    let app_state = web::Data::new(PreviewState { snapshots });

    let server = HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(app_state.clone())
            .service(health)
            .service(page)
            .service(sections)
    })
    .workers(1)
    .bind((config.host.as_str(), config.port))?;

    let addr = server
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| std::io::Error::other("preview server bound no address"))?;

    tracing::info!(%addr, "Preview server listening");
    Ok((server.run(), addr))
}
