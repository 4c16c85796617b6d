//! 인증 및 권한 부여.
//!
//! JWT 기반 인증 및 역할 기반 접근 제어를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`CredentialHasher`]: Argon2id 비밀번호 해싱/검증
//! - [`TokenCodec`]: Access Token 발급/검증 (주입 가능한 [`Clock`] 사용)
//! - [`IdentityResolver`]: 토큰 → 저장소의 현재 사용자 레코드
//! - [`require_role`]: 해석된 사용자의 현재 역할로 권한 확인
//! - [`CurrentUser`], [`AdminUser`]: Axum 추출기
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn admin_only(AdminUser(admin): AdminUser) -> impl IntoResponse {
//!     format!("Hello, {}!", admin.email)
//! }
//! ```

mod clock;
mod guard;
mod jwt;
mod middleware;
mod password;
mod resolver;

pub use clock::{Clock, ManualClock, SystemClock};
pub use guard::require_role;
pub use jwt::{Claims, IssuedToken, TokenCodec, TokenError};
pub use middleware::{bearer_token, AdminUser, AuthError, CurrentUser};
pub use password::{CredentialHasher, PasswordError, MAX_PASSWORD_BYTES};
pub use resolver::IdentityResolver;
