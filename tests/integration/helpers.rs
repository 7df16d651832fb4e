use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use service_template::{
    routes::create_router,
    services::health_service::{DatabasePing, HealthCache},
    telemetry, AppState, Config,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tower::ServiceExt;

pub fn env_vars() -> HashMap<String, String> {
    [
        ("SERVICE_NAME", "task-service"),
        ("PORT", "8080"),
        ("DB_DIALECT", "postgres"),
        ("DB_HOST", "localhost"),
        ("DB_PORT", "5432"),
        ("DB_DBNAME", "tasks"),
        ("DB_USERNAME", "app"),
        ("DB_PASSWORD", "secret"),
        ("REDIS_ADDRESS", "localhost:6379"),
        ("JWT_SECRET", "integration-secret-key-with-at-least-32-chars"),
        ("JWT_ISSUER", "https://issuer.test"),
        ("JWT_AUDIENCE", "task-service"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Default)]
pub struct MemoryCache {
    pub down: AtomicBool,
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl HealthCache for MemoryCache {
    async fn ping(&self) -> anyhow::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl_seconds: u64) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct HealthyDatabase;

#[async_trait]
impl DatabasePing for HealthyDatabase {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with(env_vars(), db, Arc::new(MemoryCache::default()))
    }

    pub fn with(vars: HashMap<String, String>, db: DatabaseConnection, cache: Arc<MemoryCache>) -> Self {
        let config = Config::from_env_map(vars).unwrap();
        let telemetry = telemetry::build(&config.telemetry);
        let state = AppState::with_health_check(
            config,
            db,
            cache,
            Arc::new(HealthyDatabase),
            telemetry,
            None,
        );
        let router = create_router(state.clone());
        Self { state, router }
    }

    pub fn bearer(&self, subject: &str) -> String {
        let token = self
            .state
            .jwt
            .generate_token(subject, time::Duration::minutes(5))
            .unwrap();
        format!("Bearer {token}")
    }

    pub async fn call(&self, request: Request<Body>) -> (u16, axum::http::HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
