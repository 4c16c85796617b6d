//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크
//! - `/register`, `/login`, `/me` - 계정
//! - `/tasks`, `/tasks/{id}` - 본인 작업 관리
//! - `/admin/tasks`, `/admin/users`, `/admin/users/{id}`, `/admin/users/{id}/role` - 관리자 전용

pub mod admin;
pub mod auth;
pub mod health;
pub mod tasks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub use admin::{admin_router, AdminPageQuery, ChangeRoleRequest};
pub use auth::{auth_router, LoginRequest, RegisterRequest, TokenResponse, UserResponse};
pub use health::{health_router, HealthResponse};
pub use tasks::{tasks_router, CreateTaskRequest, ListTasksQuery};

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health_router())
        .merge(auth_router())
        .merge(tasks_router())
        .merge(admin_router())
}
