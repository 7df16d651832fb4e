use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::{validator::parse_numeric_id, RequestLocale, ValidatedJson},
    models::{
        common::ApiResponse,
        todo::{CreateTodoRequest, UpdateTodoRequest},
    },
};
use entity::todos;

/// POST /todos
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateTodoRequest>,
) -> Result<ApiResponse<todos::Model>> {
    let todo = state
        .todo_service
        .create(request.text.unwrap_or_default())
        .await?;
    Ok(ApiResponse::created(todo))
}

/// GET /todos
#[instrument(skip_all)]
pub async fn find(State(state): State<AppState>) -> Result<ApiResponse<Vec<todos::Model>>> {
    let todos = state.todo_service.find().await?;
    let total = todos.len();
    Ok(ApiResponse::ok(todos).with_meta("total", total))
}

/// GET /todos/{id}
#[instrument(skip(state, locale))]
pub async fn get_by_id(
    State(state): State<AppState>,
    locale: RequestLocale,
    Path(id): Path<String>,
) -> Result<ApiResponse<todos::Model>> {
    let id = parse_numeric_id(locale, &id)?;
    Ok(ApiResponse::ok(state.todo_service.get(id).await?))
}

/// PATCH /todos/{id}
#[instrument(skip(state, locale, request))]
pub async fn update(
    State(state): State<AppState>,
    locale: RequestLocale,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateTodoRequest>,
) -> Result<ApiResponse<todos::Model>> {
    let id = parse_numeric_id(locale, &id)?;
    let todo = state.todo_service.update(id, request.into()).await?;
    Ok(ApiResponse::ok(todo))
}

/// DELETE /todos/{id}
#[instrument(skip(state, locale))]
pub async fn delete(
    State(state): State<AppState>,
    locale: RequestLocale,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    let id = parse_numeric_id(locale, &id)?;
    state.todo_service.delete(id).await?;
    Ok(ApiResponse::message(StatusCode::OK, "deleted"))
}
