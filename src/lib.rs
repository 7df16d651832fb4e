// Library exports for the binaries and integration tests
pub mod app_state;
pub mod config;
pub mod error;
pub mod generator;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod workflow;

// Re-export commonly used types
pub use app_state::AppState;
pub use config::Config;
pub use error::{ApiError, Result};
