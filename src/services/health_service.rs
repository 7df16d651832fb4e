use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Cache operations the readiness probe needs.
#[async_trait]
pub trait HealthCache: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;
}

#[async_trait]
pub trait DatabasePing: Send + Sync {
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Redis-backed readiness cache.
#[derive(Clone)]
pub struct RedisHealthCache(pub ConnectionManager);

#[async_trait]
impl HealthCache for RedisHealthCache {
    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.0.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.0.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.0.clone();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }
}

#[async_trait]
impl DatabasePing for DatabaseConnection {
    async fn ping(&self) -> anyhow::Result<()> {
        DatabaseConnection::ping(self).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Unhealthy(String);

impl Unhealthy {
    fn caused_by(context: &str, cause: anyhow::Error) -> Self {
        Unhealthy(format!("{context}: {cause:#}"))
    }
}

const READY_MARKER: &str = "OK";

pub struct HealthService {
    cache: Arc<dyn HealthCache>,
    db: Arc<dyn DatabasePing>,
    marker_key: String,
    marker_ttl_seconds: u64,
}

impl HealthService {
    /// `marker_ttl_seconds` bounds database pings to one per window per instance.
    pub fn new(
        cache: Arc<dyn HealthCache>,
        db: Arc<dyn DatabasePing>,
        service_name: &str,
        marker_ttl_seconds: u64,
    ) -> Self {
        Self {
            cache,
            db,
            marker_key: format!("{}:healthcheck:{}", service_name, Uuid::new_v4()),
            marker_ttl_seconds,
        }
    }

    pub fn liveness(&self) -> Result<(), Unhealthy> {
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn readiness(&self) -> Result<(), Unhealthy> {
        self.cache
            .ping()
            .await
            .map_err(|e| Unhealthy::caused_by("failed to ping cache", e))?;

        let marker = self
            .cache
            .get(&self.marker_key)
            .await
            .map_err(|e| Unhealthy::caused_by("failed to read readiness marker", e))?;

        if marker.as_deref() == Some(READY_MARKER) {
            debug!("readiness marker present, skipping database ping");
            return Ok(());
        }

        self.db
            .ping()
            .await
            .map_err(|e| Unhealthy::caused_by("failed to ping database", e))?;

        if let Err(e) = self
            .cache
            .set_ex(&self.marker_key, READY_MARKER, self.marker_ttl_seconds)
            .await
        {
            warn!("failed to refresh readiness marker: {:#}", e);
        }

        Ok(())
    }
}
