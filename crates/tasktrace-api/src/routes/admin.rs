//! 관리자 endpoint.
//!
//! 모든 핸들러는 [`AdminUser`] 추출기를 통해 현재 역할이 admin인지 확인합니다.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tasktrace_core::{Role, Task, UserId};
use tracing::info;
use validator::Validate;

use super::auth::UserResponse;
use crate::auth::AdminUser;
use crate::error::{api_error, ApiErrorResponse, ApiResult};
use crate::repository::StoreError;
use crate::state::AppState;

/// 관리자 목록 최대 페이지 크기.
pub const MAX_ADMIN_PAGE: usize = 500;

/// 관리자 목록 쿼리.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminPageQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    #[validate(range(max = 500, message = "limit must be at most 500"))]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// 역할 변경 요청.
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

fn user_not_found() -> (StatusCode, Json<ApiErrorResponse>) {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "User not found")
}

fn validate_page(query: &AdminPageQuery) -> ApiResult<()> {
    query
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiErrorResponse::validation(&e))))
}

/// 전체 작업 목록.
///
/// GET /admin/tasks
pub async fn list_all_tasks(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AdminPageQuery>,
) -> ApiResult<Json<Vec<Task>>> {
    validate_page(&query)?;
    let tasks = state
        .tasks
        .list_all(query.skip, query.limit.min(MAX_ADMIN_PAGE))
        .await?;
    Ok(Json(tasks))
}

/// 전체 사용자 목록.
///
/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AdminPageQuery>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    validate_page(&query)?;
    let users = state
        .users
        .list(query.skip, query.limit.min(MAX_ADMIN_PAGE))
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(Json(users))
}

/// 사용자 삭제.
///
/// DELETE /admin/users/{id}
///
/// 사용자의 작업도 함께 삭제합니다. 삭제된 사용자의 기존 토큰은 다음 요청부터 거부됩니다.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let user_id = UserId::new(id);
    // 작업 먼저, 사용자는 마지막에 삭제
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(user_not_found)?;
    let removed_tasks = state.tasks.delete_by_owner(user_id).await?;
    state.users.delete(user_id).await?.ok_or_else(user_not_found)?;

    info!(
        admin_id = %admin.id,
        user_id = %user.id,
        removed_tasks,
        "User deleted"
    );
    Ok(Json(json!({ "detail": format!("user {} deleted", id) })))
}

/// 사용자 역할 변경.
///
/// PUT /admin/users/{id}/role
pub async fn change_role(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<ChangeRoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    let role = Role::parse(&request.role)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "INVALID_ROLE", "Invalid role"))?;

    let mut user = state
        .users
        .find_by_id(UserId::new(id))
        .await?
        .ok_or_else(user_not_found)?;
    let previous = user.role;
    user.role = role;

    state.users.save(&user).await.map_err(|e| match e {
        StoreError::NotFound => user_not_found(),
        other => other.into(),
    })?;

    info!(
        admin_id = %admin.id,
        user_id = %user.id,
        from = %previous,
        to = %role,
        "User role changed"
    );
    Ok(Json(UserResponse::from(user)))
}

/// 관리자 라우터 생성.
pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/tasks", get(list_all_tasks))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", delete(delete_user))
        .route("/admin/users/{id}/role", put(change_role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::{body::Body, http::Request, response::Response};
    use chrono::NaiveDate;
    use tasktrace_core::{NewTask, NewUser, UserRecord};
    use tower::ServiceExt;

    async fn add_user(state: &AppState, email: &str, role: Role) -> (UserRecord, String) {
        let user = state
            .users
            .create(NewUser {
                email: email.to_string(),
                hashed_password: "$argon2id$stub".to_string(),
                role,
            })
            .await
            .unwrap();
        let token = state
            .codec
            .issue_token(user.id.to_string(), user.role)
            .unwrap()
            .access_token;
        (user, token)
    }

    async fn send(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_admin_routes_forbid_users() {
        let state = Arc::new(create_test_state());
        let app = admin_router().with_state(state.clone());
        let (_, token) = add_user(&state, "a@x.com", Role::User).await;

        for uri in ["/admin/tasks", "/admin/users"] {
            let response = send(&app, "GET", uri, &token, None).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn test_delete_user_cascades_tasks() {
        let state = Arc::new(create_test_state());
        let app = admin_router().with_state(state.clone());
        let (_, admin_token) = add_user(&state, "root@x.com", Role::Admin).await;
        let (victim, _) = add_user(&state, "a@x.com", Role::User).await;
        state
            .tasks
            .create(NewTask {
                title: "orphan".to_string(),
                description: String::new(),
                due_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                status: "pending".to_string(),
                owner_id: victim.id,
            })
            .await
            .unwrap();

        let uri = format!("/admin/users/{}", victim.id);
        let response = send(&app, "DELETE", &uri, &admin_token, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.users.find_by_id(victim.id).await.unwrap().is_none());
        assert!(state.tasks.list_all(0, 10).await.unwrap().is_empty());

        let again = send(&app, "DELETE", &uri, &admin_token, None).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_change_role() {
        let state = Arc::new(create_test_state());
        let app = admin_router().with_state(state.clone());
        let (_, admin_token) = add_user(&state, "root@x.com", Role::Admin).await;
        let (user, _) = add_user(&state, "a@x.com", Role::User).await;
        let uri = format!("/admin/users/{}/role", user.id);

        let bad = send(&app, "PUT", &uri, &admin_token, Some(json!({ "role": "owner" }))).await;
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let missing = send(&app, "PUT", "/admin/users/999/role", &admin_token, Some(json!({ "role": "admin" }))).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let ok = send(&app, "PUT", &uri, &admin_token, Some(json!({ "role": "admin" }))).await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(
            state.users.find_by_id(user.id).await.unwrap().unwrap().role,
            Role::Admin
        );
    }

    #[tokio::test]
    async fn test_admin_limit_bound() {
        let state = Arc::new(create_test_state());
        let app = admin_router().with_state(state.clone());
        let (_, admin_token) = add_user(&state, "root@x.com", Role::Admin).await;

        let ok = send(&app, "GET", "/admin/users?limit=500", &admin_token, None).await;
        assert_eq!(ok.status(), StatusCode::OK);

        let too_many = send(&app, "GET", "/admin/users?limit=501", &admin_token, None).await;
        assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
    }
}
