//! 계정 endpoint.
//!
//! 회원가입, 로그인, 현재 사용자 조회를 제공합니다.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tasktrace_core::{NewUser, Role, UserId, UserRecord};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::{AuthError, CurrentUser, PasswordError};
use crate::error::{api_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 회원가입 요청.
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    pub password: String,
    /// "user" | "admin" (기본값 "user")
    #[serde(default)]
    pub role: Option<String>,
}

/// 로그인 요청.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 사용자 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// 토큰 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// 항상 "bearer"
    pub token_type: String,
    /// 만료까지 남은 시간 (초)
    pub expires_in: i64,
}

/// 회원가입.
///
/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    request
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiErrorResponse::validation(&e))))?;

    let email = request.email.trim().to_string();
    if state.users.find_by_email(&email).await?.is_some() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMAIL_TAKEN",
            "Email already registered",
        ));
    }

    let role = match request.role.as_deref() {
        None => Role::User,
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "INVALID_ROLE", "Invalid role"))?,
    };
    if role == Role::Admin && !state.allow_admin_signup {
        warn!(email = %email, "Admin self-signup rejected");
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "ADMIN_SIGNUP_DISABLED",
            "Admin signup is disabled",
        ));
    }

    // Argon2는 CPU 바운드이므로 blocking 풀에서 실행
    let hasher = state.hasher.clone();
    let password = request.password;
    let hashed_password = tokio::task::spawn_blocking(move || hasher.hash_password(&password))
        .await
        .map_err(|_| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Password hashing task failed",
            )
        })?
        .map_err(|e| match e {
            PasswordError::HashingFailed => api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                e.to_string(),
            ),
            _ => api_error(StatusCode::BAD_REQUEST, "INVALID_PASSWORD", e.to_string()),
        })?;

    // 동시 가입 경합은 저장소의 고유 제약이 DuplicateEmail로 보고
    let user = state
        .users
        .create(NewUser {
            email,
            hashed_password,
            role,
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// 로그인.
///
/// POST /login
///
/// 이메일 미존재와 비밀번호 불일치는 같은 응답을 반환하며,
/// 두 경우 모두 Argon2 검증을 한 번 수행합니다.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state.users.find_by_email(request.email.trim()).await?;

    let hasher = state.hasher.clone();
    let digest = user.as_ref().map(|u| u.hashed_password.clone());
    let password = request.password;
    let verified = tokio::task::spawn_blocking(move || {
        hasher.verify_credentials(&password, digest.as_deref())
    })
    .await
    .unwrap_or(false);

    let Some(user) = user.filter(|_| verified) else {
        info!("Login failed");
        return Err(AuthError::InvalidCredentials.into());
    };

    let issued = state
        .codec
        .issue_token(user.id.to_string(), user.role)
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ERROR",
                e.to_string(),
            )
        })?;

    info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(TokenResponse {
        access_token: issued.access_token,
        token_type: "bearer".to_string(),
        expires_in: issued.expires_in,
    }))
}

/// 현재 사용자 조회.
///
/// GET /me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// 계정 라우터 생성.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}
