//! 역할 기반 접근 제어.

use tasktrace_core::{Role, UserRecord};
use tracing::debug;

use super::AuthError;

/// 요구 역할 확인.
///
/// 해석기가 방금 저장소에서 읽은 레코드의 역할만 비교하며, 토큰의 역할 클레임은 보지 않습니다.
///
/// # Arguments
///
/// * `identity` - 해석된 사용자
/// * `required` - 필요한 최소 역할
///
/// # Returns
///
/// 권한이 충분하면 같은 사용자, 부족하면 [`AuthError::Forbidden`]
pub fn require_role(identity: UserRecord, required: Role) -> Result<UserRecord, AuthError> {
    if identity.role.satisfies(required) {
        Ok(identity)
    } else {
        debug!(
            user_id = %identity.id,
            role = %identity.role,
            required = %required,
            "Insufficient role"
        );
        Err(AuthError::Forbidden)
    }
}
