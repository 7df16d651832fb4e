// Route modules
pub mod health;
pub mod metrics;
pub mod task;
pub mod todo;

use crate::{
    app_state::AppState,
    error::ApiError,
    middleware::{
        cors_layer, jwt_auth_middleware, locale_middleware, logging_middleware,
        metrics_middleware, panic_response, render_errors, AccessLogSettings,
    },
};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Request, Uri},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Create the main router with the full middleware chain
pub fn create_router(state: AppState) -> Router {
    let access_log = AccessLogSettings {
        body_logging: state.config.logging.body_logging,
    };

    let mut router = Router::new()
        .merge(health_routes())
        .merge(task_routes())
        .merge(secured_task_routes(state.clone()))
        .merge(todo_routes());

    if state.telemetry.render_metrics().is_some() {
        router = router.route("/metrics", get(metrics::render));
    }

    // Each layer wraps everything added before it: locale runs closest to the
    // handlers, panic recovery outermost
    router
        .fallback(not_found)
        .layer(middleware::from_fn(locale_middleware))
        .layer(middleware::from_fn(render_errors))
        .layer(middleware::from_fn_with_state(access_log, logging_middleware))
        .layer(middleware::from_fn_with_state(
            state.telemetry.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(&state.config.cors))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health::liveness).post(health::liveness))
        .route("/readyz", get(health::readiness))
        .route("/errorz", get(health::errorz))
}

fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(task::find).post(task::create))
        .route(
            "/tasks/{id}",
            get(task::get_by_id).patch(task::update).delete(task::delete),
        )
}

/// Same handlers as `/tasks`, scoped to the bearer token's subject
fn secured_task_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/secured/tasks", get(task::find_mine).post(task::create))
        .route(
            "/secured/tasks/{id}",
            get(task::get_by_id).patch(task::update).delete(task::delete),
        )
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn todo_routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(todo::find).post(todo::create))
        .route(
            "/todos/{id}",
            get(todo::get_by_id).patch(todo::update).delete(todo::delete),
        )
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

fn make_span(request: &Request<Body>) -> tracing::Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched");
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        route,
        request_id,
    )
}
