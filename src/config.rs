use serde::Deserialize;
use std::{collections::HashMap, fmt, str::FromStr};
use validator::{Validate, ValidationError};

/// Immutable runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Lifetime of the per-instance readiness marker
    pub healthcheck_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbDialect {
    Postgres,
    Mysql,
}

impl FromStr for DbDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            other => Err(format!("unsupported database dialect: {other}")),
        }
    }
}

impl fmt::Display for DbDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
            Self::Mysql => f.write_str("mysql"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub dialect: DbDialect,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    /// Connection URL for the configured dialect
    pub fn url(&self) -> String {
        let user = urlencoding::encode(&self.username);
        let password = urlencoding::encode(&self.password);
        match self.dialect {
            DbDialect::Postgres => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                user, password, self.host, self.port, self.name, self.ssl_mode
            ),
            DbDialect::Mysql => format!(
                "mysql://{}:{}@{}:{}/{}",
                user, password, self.host, self.port, self.name
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub address: String,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        redis_url(&self.address)
    }
}

/// Accepts both `host:port` and full `redis://` URLs
pub fn redis_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{address}")
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
}

impl TelemetryConfig {
    pub fn metrics_active(&self) -> bool {
        self.enabled && self.metrics_enabled
    }

    pub fn tracing_active(&self) -> bool {
        self.enabled && self.tracing_enabled && self.otlp_endpoint.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Credentials are only allowed for exactly one explicit origin
    pub fn allow_credentials(&self) -> bool {
        matches!(self.allowed_origins.as_slice(), [origin] if origin != "*")
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// `None` disables the workflow client and the worker
    pub address: Option<String>,
    pub namespace: String,
    pub task_queue: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub body_logging: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("missing or invalid configuration: {}", .fields.join(", "))]
    Invalid { fields: Vec<String> },
}

/// Flat view of the environment, one field per variable.
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawConfig {
    #[validate(length(min = 1))]
    service_name: String,
    host: String,
    #[validate(required)]
    port: Option<u16>,
    #[validate(range(min = 1))]
    healthcheck_timeout_seconds: u64,

    #[validate(custom(function = "validate_dialect"))]
    db_dialect: String,
    #[validate(length(min = 1))]
    db_host: String,
    #[validate(required)]
    db_port: Option<u16>,
    #[validate(length(min = 1))]
    db_dbname: String,
    #[validate(length(min = 1))]
    db_username: String,
    #[validate(length(min = 1))]
    db_password: String,
    db_sslmode: String,

    #[validate(length(min = 1))]
    redis_address: String,

    otel_enabled: bool,
    otel_metrics_enabled: bool,
    otel_tracing_enabled: bool,
    otel_exporter_otlp_endpoint: String,
    service_version: String,
    environment: String,

    #[validate(length(min = 1))]
    jwt_secret: String,
    #[validate(length(min = 1))]
    jwt_issuer: String,
    #[validate(length(min = 1))]
    jwt_audience: String,

    cors_allowed_origins: String,

    workflow_address: String,
    workflow_namespace: String,
    workflow_task_queue: String,

    enable_body_logging: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            host: "0.0.0.0".to_string(),
            port: None,
            healthcheck_timeout_seconds: 55,
            db_dialect: String::new(),
            db_host: String::new(),
            db_port: None,
            db_dbname: String::new(),
            db_username: String::new(),
            db_password: String::new(),
            db_sslmode: "require".to_string(),
            redis_address: String::new(),
            otel_enabled: false,
            otel_metrics_enabled: false,
            otel_tracing_enabled: false,
            otel_exporter_otlp_endpoint: String::new(),
            service_version: "0.1.0".to_string(),
            environment: "development".to_string(),
            jwt_secret: String::new(),
            jwt_issuer: String::new(),
            jwt_audience: String::new(),
            cors_allowed_origins: "*".to_string(),
            workflow_address: String::new(),
            workflow_namespace: "default".to_string(),
            workflow_task_queue: "task-notifications".to_string(),
            enable_body_logging: false,
        }
    }
}

fn validate_dialect(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<DbDialect>()
        .map(|_| ())
        .map_err(|_| ValidationError::new("unsupported_dialect"))
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim().to_string();
    (!value.is_empty()).then_some(value)
}

impl Config {
    /// Load configuration from `.env`, an optional `config.*` file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default())
            .build()?;

        Self::from_settings(settings)
    }

    /// Build a configuration from an explicit variable map, ignoring the process environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default().source(Some(vars)))
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let raw: RawConfig = settings.try_deserialize()?;

        if let Err(errors) = raw.validate() {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| field.to_string().to_uppercase())
                .collect();
            fields.sort();
            return Err(ConfigError::Invalid { fields });
        }

        Ok(raw.into_config())
    }
}

impl RawConfig {
    // Only called after validation, so required fields are present.
    fn into_config(self) -> Config {
        let allowed_origins = self
            .cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Config {
            server: ServerConfig {
                service_name: self.service_name.clone(),
                host: self.host,
                port: self.port.unwrap_or_default(),
                healthcheck_timeout_seconds: self.healthcheck_timeout_seconds,
            },
            database: DatabaseConfig {
                dialect: self.db_dialect.parse().unwrap_or(DbDialect::Postgres),
                host: self.db_host,
                port: self.db_port.unwrap_or_default(),
                name: self.db_dbname,
                username: self.db_username,
                password: self.db_password,
                ssl_mode: self.db_sslmode,
            },
            redis: RedisConfig {
                address: self.redis_address,
            },
            telemetry: TelemetryConfig {
                enabled: self.otel_enabled,
                metrics_enabled: self.otel_metrics_enabled,
                tracing_enabled: self.otel_tracing_enabled,
                otlp_endpoint: non_empty(self.otel_exporter_otlp_endpoint),
                service_name: self.service_name,
                service_version: self.service_version,
                environment: self.environment,
            },
            auth: AuthConfig {
                jwt_secret: self.jwt_secret,
                jwt_issuer: self.jwt_issuer,
                jwt_audience: self.jwt_audience,
            },
            cors: CorsConfig { allowed_origins },
            workflow: WorkflowConfig {
                address: non_empty(self.workflow_address),
                namespace: self.workflow_namespace,
                task_queue: self.workflow_task_queue,
            },
            logging: LoggingConfig {
                body_logging: self.enable_body_logging,
            },
        }
    }
}
