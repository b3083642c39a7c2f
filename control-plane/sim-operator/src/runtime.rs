use std::net::SocketAddr;

use kube::Client;
use tokio::{task::JoinHandle, try_join};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::OperatorConfig, controller::run_controllers, web::run_http_server,
};

/// Compute the HTTP bind address based on config.
pub fn compute_http_addr(cfg: &OperatorConfig) -> SocketAddr {
    ([0, 0, 0, 0], cfg.http_port).into()
}

pub fn spawn_controllers(
    client: Client,
    cfg: OperatorConfig,
    token: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controllers(client, cfg, token).await })
}

pub fn spawn_http(
    addr: SocketAddr,
    token: CancellationToken,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_http_server(addr, token).await })
}

/// Cancel `token` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = term.recv() => {}
                    }
                }
                Err(_) => {
                    let _ = ctrl_c.await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("signal received; shutting down");
        token.cancel();
    })
}

/// Start the controllers and the health server and wait until both finish.
pub async fn run_all(client: Client, cfg: OperatorConfig) -> anyhow::Result<()> {
    let token = CancellationToken::new();
    let http_addr = compute_http_addr(&cfg);

    spawn_signal_handler(token.clone());
    let controllers = spawn_controllers(client, cfg, token.clone());
    let http = spawn_http(http_addr, token);

    let (c_res, h_res) = try_join!(controllers, http)?;
    c_res?;
    h_res?;
    Ok(())
}
