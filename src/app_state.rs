use crate::{
    config::Config,
    services::{
        health_service::{DatabasePing, HealthCache, RedisHealthCache},
        HealthService, JWTService, TaskService, TodoService,
    },
    telemetry::Telemetry,
    workflow::WorkflowClient,
};
use anyhow::Context;
use redis::aio::ConnectionManager;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Everything the handlers need, built once before the listener accepts traffic.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub telemetry: Arc<dyn Telemetry>,
    pub jwt: Arc<JWTService>,
    pub health_service: Arc<HealthService>,
    pub task_service: Arc<TaskService>,
    pub todo_service: Arc<TodoService>,
}

impl AppState {
    pub async fn new(config: Config, telemetry: Arc<dyn Telemetry>) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(config.database.url())
            .await
            .with_context(|| format!("failed to connect to {} database", config.database.dialect))?;

        // Connect to Redis
        let client = redis::Client::open(config.redis.url())?;
        let cache = RedisHealthCache(
            ConnectionManager::new(client)
                .await
                .context("failed to connect to cache")?,
        );
        cache.ping().await.context("failed to ping cache")?;

        let workflow = WorkflowClient::connect(&config.workflow)
            .await
            .context("failed to connect workflow client")?;

        Ok(Self::from_parts(
            config,
            db,
            Arc::new(cache),
            telemetry,
            workflow,
        ))
    }

    /// Wire services from already-open connections.
    pub fn from_parts(
        config: Config,
        db: DatabaseConnection,
        cache: Arc<dyn HealthCache>,
        telemetry: Arc<dyn Telemetry>,
        workflow: Option<WorkflowClient>,
    ) -> Self {
        let database: Arc<dyn DatabasePing> = Arc::new(db.clone());
        Self::with_health_check(config, db, cache, database, telemetry, workflow)
    }

    /// Like [`AppState::from_parts`], with an explicit readiness database probe.
    pub fn with_health_check(
        config: Config,
        db: DatabaseConnection,
        cache: Arc<dyn HealthCache>,
        database: Arc<dyn DatabasePing>,
        telemetry: Arc<dyn Telemetry>,
        workflow: Option<WorkflowClient>,
    ) -> Self {
        let config = Arc::new(config);

        let health_service = Arc::new(HealthService::new(
            cache,
            database,
            &config.server.service_name,
            config.server.healthcheck_timeout_seconds,
        ));
        let task_service = Arc::new(TaskService::new(db.clone(), telemetry.clone(), workflow));
        let todo_service = Arc::new(TodoService::new(db.clone(), telemetry.clone()));
        let jwt = Arc::new(JWTService::new(Arc::new(config.auth.clone())));

        Self {
            config,
            db,
            telemetry,
            jwt,
            health_service,
            task_service,
            todo_service,
        }
    }
}
