use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router() -> Router {
    // /health is preferred; /healthz kept for probes that expect it
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/healthz", get(|| async { "ok" }))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn run_http_server(
    addr: SocketAddr,
    token: CancellationToken,
) -> anyhow::Result<()> {
    info!("health server listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router())
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;
    Ok(())
}
