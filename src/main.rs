use service_template::{
    observability::{self, LogFormat},
    routes::create_router,
    telemetry, AppState, Config,
};
use std::time::Duration;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration first so the tracer knows where to export
    let config = Config::load();
    let _guard = observability::init_tracing(
        LogFormat::from_env(),
        config.as_ref().ok().map(|c| &c.telemetry),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        service = %config.server.service_name,
        "Loaded configuration - Server: {}:{}",
        config.server.host,
        config.server.port
    );

    let telemetry = telemetry::build(&config.telemetry);

    // Initialize application state
    let state = AppState::new(config.clone(), telemetry).await?;
    tracing::info!("Initialized application state");

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = drain_tx.send(());
    });

    // Bound the drain once the signal has arrived
    tokio::select! {
        result = server => result?,
        _ = async {
            let _ = drain_rx.await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!("graceful shutdown timed out after {:?}", SHUTDOWN_GRACE);
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received, draining connections"),
        Err(e) => {
            tracing::error!("failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
