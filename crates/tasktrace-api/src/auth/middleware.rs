//! Axum용 인증 추출기.
//!
//! `Authorization: Bearer <token>` 헤더에서 토큰을 꺼내 식별자 해석기와
//! 역할 가드를 차례로 적용합니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        request::Parts,
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use tasktrace_core::{Role, UserRecord};
use tracing::debug;

use super::require_role;
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 인증/인가 에러.
///
/// 실패 원인을 구분하지 않는 고정 메시지만 응답에 포함합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// 로그인 실패 (이메일/비밀번호 구분 없음)
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// 토큰 누락/손상/만료 또는 사용자 없음
    #[error("Could not validate credentials")]
    Unauthenticated,
    /// 역할 부족
    #[error("Admin privileges required")]
    Forbidden,
    /// 사용자 저장소 장애 (인증 실패와 구분)
    #[error("Service temporarily unavailable")]
    StoreUnavailable,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
            AuthError::StoreUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorResponse::simple(self.code(), self.to_string()));
        let mut response = (self.status(), body).into_response();

        if self == AuthError::Unauthenticated {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

/// `ApiResult` 핸들러에서 `?`로 사용.
///
/// `WWW-Authenticate` 헤더가 필요한 경로는 추출기를 통해 [`IntoResponse`]를 사용합니다.
impl From<AuthError> for (StatusCode, Json<ApiErrorResponse>) {
    fn from(error: AuthError) -> Self {
        (
            error.status(),
            Json(ApiErrorResponse::simple(error.code(), error.to_string())),
        )
    }
}

/// Authorization 헤더에서 Bearer 토큰 추출.
///
/// 스킴은 대소문자를 구분하지 않습니다.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// 인증된 사용자 추출기.
///
/// 매 요청마다 토큰 검증 후 저장소에서 사용자를 새로 읽습니다.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     Json(UserResponse::from(user))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            debug!(stage = "extract", "Missing or malformed Authorization header");
            AuthError::Unauthenticated
        })?;

        state.resolver.resolve_identity(token).await.map(CurrentUser)
    }
}

/// Admin 권한을 요구하는 추출기.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        require_role(user, Role::Admin).map(AdminUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/me");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_auth_error_responses() {
        let response = AuthError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let response = AuthError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::StoreUnavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
