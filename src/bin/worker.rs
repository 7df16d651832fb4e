use service_template::{
    observability::{self, LogFormat},
    workflow::{TaskNotificationWorkflow, Worker},
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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

    let Some(address) = config.workflow.address.as_deref() else {
        tracing::warn!("WORKFLOW_ADDRESS is not set, worker has nothing to do");
        return Ok(());
    };

    let worker = Worker::connect(
        address,
        &config.workflow,
        TaskNotificationWorkflow::with_mock_activities(),
    )
    .await?;

    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
