//! 작업 관리 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - Argon2id 비밀번호 해싱 및 JWT 인증
//! - 요청마다 저장소에서 새로 읽는 역할 기반 접근 제어
//! - 헬스 체크 엔드포인트
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 인증 및 권한 관리
//! - [`repository`]: 사용자/작업 저장소
//! - [`error`]: 통합 API 에러 응답

pub mod auth;
pub mod error;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    require_role, AdminUser, AuthError, Claims, Clock, CredentialHasher, CurrentUser,
    IdentityResolver, ManualClock, SystemClock, TokenCodec, TokenError,
};
pub use error::{ApiErrorResponse, ApiResult};
pub use routes::*;
pub use state::{AppState, BootstrapError};

#[cfg(any(test, feature = "test-utils"))]
pub use state::{create_test_state, TEST_SECRET};
