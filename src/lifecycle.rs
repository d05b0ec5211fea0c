//! Shutdown coordination and graceful serving.

use crate::error::ServerError;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Coordinator for cooperative shutdown.
///
/// Long-running work (the server, the startup connection retry loop)
/// subscribes and stops once the signal is triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}

/// Serve `app` until `shutdown` triggers, then give in-flight requests up to
/// `grace` to finish. Exceeding the grace period is an error.
pub async fn serve(
    listener: TcpListener,
    app: axum::Router,
    shutdown: Shutdown,
    grace: Duration,
) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "server listening");

    let stop = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.wait().await })
        .into_future();
    let mut task = tokio::spawn(server);

    tokio::select! {
        joined = &mut task => {
            return flatten(joined);
        }
        _ = shutdown.wait() => {}
    }

    match tokio::time::timeout(grace, &mut task).await {
        Ok(joined) => {
            flatten(joined)?;
            tracing::info!(address = %addr, "server stopped");
            Ok(())
        }
        Err(_) => {
            task.abort();
            tracing::error!(address = %addr, grace = ?grace, "in-flight requests did not finish in time");
            Err(ServerError::ShutdownTimeout(grace))
        }
    }
}

fn flatten(joined: Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<(), ServerError> {
    match joined {
        Ok(result) => result.map_err(ServerError::from),
        Err(e) => Err(ServerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::json_response;
    use crate::router::{Router, RouterConfig};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn trigger_is_observed_by_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        assert!(!shutdown.is_triggered());
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        assert!(*rx.wait_for(|t| *t).await.unwrap());
        shutdown.wait().await;
    }

    #[tokio::test]
    async fn serve_stops_cleanly_when_idle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app = Router::new(RouterConfig::default()).unwrap().into_service(1024);
        let shutdown = Shutdown::new();
        let server = tokio::spawn(serve(listener, app, shutdown.clone(), Duration::from_secs(5)));
        tokio::task::yield_now().await;
        shutdown.trigger();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn serve_reports_grace_period_overrun() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut router = Router::new(RouterConfig::default()).unwrap();
        router
            .get("/slow", |_req, _params| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                json_response(StatusCode::OK, &())
            })
            .unwrap();
        let shutdown = Shutdown::new();
        let server = tokio::spawn(serve(
            listener,
            router.into_service(1024),
            shutdown.clone(),
            Duration::from_millis(100),
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut stream,
            b"GET /slow HTTP/1.1\r\nhost: localhost\r\n\r\n",
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.trigger();
        let result = server.await.unwrap();
        assert!(matches!(result, Err(ServerError::ShutdownTimeout(_))));
    }
}
