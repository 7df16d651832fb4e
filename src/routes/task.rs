use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::{
    app_state::AppState,
    error::Result,
    middleware::{validator::parse_uuid, RequestLocale, UserIdentity, ValidatedJson},
    models::{
        common::ApiResponse,
        task::{CreateTaskRequest, UpdateTaskRequest},
    },
};
use entity::tasks;

/// POST /tasks, POST /secured/tasks
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    caller: Option<UserIdentity>,
    ValidatedJson(request): ValidatedJson<CreateTaskRequest>,
) -> Result<ApiResponse<tasks::Model>> {
    let task = state
        .task_service
        .create(caller.as_ref(), request.into())
        .await?;
    Ok(ApiResponse::created(task))
}

/// GET /tasks
#[instrument(skip_all)]
pub async fn find(State(state): State<AppState>) -> Result<ApiResponse<Vec<tasks::Model>>> {
    let tasks = state.task_service.find().await?;
    let total = tasks.len();
    Ok(ApiResponse::ok(tasks).with_meta("total", total))
}

/// GET /secured/tasks: the caller's own tasks
#[instrument(skip_all, fields(user = %caller.subject))]
pub async fn find_mine(
    State(state): State<AppState>,
    caller: UserIdentity,
) -> Result<ApiResponse<Vec<tasks::Model>>> {
    let tasks = state.task_service.find_by_user(&caller.subject).await?;
    let total = tasks.len();
    Ok(ApiResponse::ok(tasks).with_meta("total", total))
}

/// GET /tasks/{id}
#[instrument(skip(state, locale, caller))]
pub async fn get_by_id(
    State(state): State<AppState>,
    locale: RequestLocale,
    caller: Option<UserIdentity>,
    Path(id): Path<String>,
) -> Result<ApiResponse<tasks::Model>> {
    let id = parse_uuid(locale, &id)?;
    let task = state.task_service.get(caller.as_ref(), id).await?;
    Ok(ApiResponse::ok(task))
}

/// PATCH /tasks/{id}
#[instrument(skip(state, locale, caller, request))]
pub async fn update(
    State(state): State<AppState>,
    locale: RequestLocale,
    caller: Option<UserIdentity>,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateTaskRequest>,
) -> Result<ApiResponse<tasks::Model>> {
    let id = parse_uuid(locale, &id)?;
    let task = state
        .task_service
        .update(caller.as_ref(), id, request.into())
        .await?;
    Ok(ApiResponse::ok(task))
}

/// DELETE /tasks/{id}
#[instrument(skip(state, locale, caller))]
pub async fn delete(
    State(state): State<AppState>,
    locale: RequestLocale,
    caller: Option<UserIdentity>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    let id = parse_uuid(locale, &id)?;
    state.task_service.delete(caller.as_ref(), id).await?;
    Ok(ApiResponse::message(StatusCode::OK, "deleted"))
}
