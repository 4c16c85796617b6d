//! 작업 endpoint.
//!
//! 모든 작업 endpoint는 인증된 사용자 본인의 작업만 다룹니다.
//! 다른 사용자의 작업은 존재하지 않는 작업과 같은 404로 응답합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tasktrace_core::{NewTask, Task, TaskFilter, TaskUpdate, DEFAULT_TASK_STATUS};
use tracing::info;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{api_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 작업 목록 최대 페이지 크기.
pub const MAX_TASK_PAGE: usize = 100;

/// 작업 생성 요청.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub status: Option<String>,
}

/// 작업 목록 조회 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    #[validate(range(max = 100, message = "limit must be at most 100"))]
    pub limit: usize,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

fn default_limit() -> usize {
    10
}

fn not_found() -> (StatusCode, Json<ApiErrorResponse>) {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Task not found")
}

/// 빈 문자열 필터는 미지정으로 처리.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// 작업 생성.
///
/// POST /tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    request
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiErrorResponse::validation(&e))))?;

    let task = state
        .tasks
        .create(NewTask {
            title: request.title,
            description: request.description.unwrap_or_default(),
            due_date: request.due_date,
            status: non_empty(request.status).unwrap_or_else(|| DEFAULT_TASK_STATUS.to_string()),
            owner_id: user.id,
        })
        .await?;

    info!(task_id = task.id, user_id = %user.id, "Task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// 본인 작업 목록.
///
/// GET /tasks?skip=0&limit=10&status=&search=
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    query
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiErrorResponse::validation(&e))))?;

    let filter = TaskFilter {
        status: non_empty(query.status),
        search: non_empty(query.search),
        skip: query.skip,
        limit: query.limit.min(MAX_TASK_PAGE),
    };

    Ok(Json(state.tasks.list_for_owner(user.id, &filter).await?))
}

/// 작업 조회.
///
/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Task>> {
    state
        .tasks
        .find_for_owner(id, user.id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

/// 작업 부분 수정.
///
/// PUT /tasks/{id}
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    let task = state
        .tasks
        .update_for_owner(id, user.id, update)
        .await?
        .ok_or_else(not_found)?;

    info!(task_id = task.id, user_id = %user.id, "Task updated");
    Ok(Json(task))
}

/// 작업 삭제.
///
/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state
        .tasks
        .delete_for_owner(id, user.id)
        .await?
        .ok_or_else(not_found)?;

    info!(task_id = id, user_id = %user.id, "Task deleted");
    Ok(Json(json!({ "detail": "Task deleted" })))
}

/// 작업 라우터 생성.
pub fn tasks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
}
