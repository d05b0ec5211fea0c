//! Todo service binary.
//!
//! Configure with `TODO_*` environment variables (a `.env` file is honoured),
//! then run: `cargo run -p todo-server`

use todo_service::{
    connect, ensure_schema, register_routes, serve, wait_for_signal, AppState, PgConnector,
    PgTodoStore, Router, ServiceConfig, Shutdown,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("todo_service=info,todo_server=info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::info!(addr = %config.server.addr, dev = config.dev, "starting todo server");

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal.trigger();
    });

    let policy = config.backoff_policy().with_cancellation(shutdown.subscribe());
    let pool = connect(&PgConnector, &config.connection_config(), &policy).await?;
    ensure_schema(&pool).await?;

    let state = AppState::new(PgTodoStore::new(pool.clone()));
    let mut router = Router::new(config.router_config())?;
    register_routes(&mut router, &state)?;
    let app = router.into_service(config.server.body_limit);

    let listener = TcpListener::bind(config.server.addr).await?;
    let result = serve(listener, app, shutdown, config.server.shutdown_timeout).await;
    pool.close().await;
    result?;
    Ok(())
}
