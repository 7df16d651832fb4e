// Middleware modules
pub mod cors;
pub mod error_render;
pub mod jwt_auth;
pub mod logging;
pub mod metrics;
pub mod validator;

pub use cors::cors_layer;
pub use error_render::{panic_response, render_errors};
pub use jwt_auth::{jwt_auth_middleware, UserIdentity};
pub use logging::{logging_middleware, AccessLogSettings};
pub use metrics::metrics_middleware;
pub use validator::{locale_middleware, RequestLocale, ValidatedJson};
