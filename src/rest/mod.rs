//! HTTP admission/query server (spec §6).
//!
//! Grounded on the teacher's `rest/mod.rs` — an axum `Router` built from a
//! `with_state(Arc<_>)` handle and served via `axum::serve` over a plain
//! `TcpListener` — retargeted at the eight endpoints of the spec's table.
//! 405-on-wrong-method is left to axum's `MethodRouter`, which already
//! answers with 405 for any method not registered on a matched path, rather
//! than hand-rolled dispatch.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Engine;

pub fn build_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", get(routes::status).post(routes::submit))
        .route("/waiting", get(routes::list_waiting))
        .route("/success", get(routes::list_success))
        .route("/dead", get(routes::list_dead))
        .route("/cron", get(routes::list_cron).delete(routes::reload_cron))
        .route("/pause", post(routes::pause))
        .route("/resume", post(routes::resume))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Bind and serve the admission/query surface, returning once the listener
/// is dropped (i.e. never, under normal operation — the caller races this
/// future against the shutdown signal).
pub async fn serve(engine: Arc<Engine>, port: u16) -> crate::error::EngineResult<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let router = build_router(engine);

    info!(%addr, "admission/query server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await.map_err(|e| {
        crate::error::EngineError::Persistence(std::io::Error::new(std::io::ErrorKind::Other, e))
    })
}
