//! Server lifecycles as explicit handles.
//!
//! `start` binds, spawns the serve task and returns a `ServerHandle`; the
//! session stops servers by calling `stop()`, which resolves only after the
//! task has wound down. Bind failures map to `WatchError::ServerStart` and
//! are fatal at startup.

pub mod status;
pub mod ws;

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::WatchError;

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The actually-bound address (relevant when the configured port is 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal graceful shutdown and wait for the serve task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

/// Bind `addr` and serve `router` until the handle is stopped.
pub async fn start(addr: SocketAddr, router: Router) -> Result<ServerHandle, WatchError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| WatchError::ServerStart { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| WatchError::ServerStart { addr, source })?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(%err, "server task failed");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        shutdown_tx,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_start_and_stop_roundtrip() {
        let router = Router::new().route("/", get(|| async { "ok" }));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handle = start(addr, router).await.expect("start");
        assert_ne!(handle.addr().port(), 0, "ephemeral port must be resolved");
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_server_start_error() {
        let router = Router::new().route("/", get(|| async { "ok" }));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = start(addr, router.clone()).await.expect("start");

        let err = start(first.addr(), router).await.unwrap_err();
        assert!(matches!(err, WatchError::ServerStart { .. }));
        first.stop().await;
    }
}
