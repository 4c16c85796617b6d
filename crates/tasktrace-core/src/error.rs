//! 서비스 공통 에러 타입.
//!
//! 시작 시점의 설정 에러는 치명적이며, 안전하지 않은 기본값으로 대체하지 않습니다.

use thiserror::Error;

/// 설정 에러.
///
/// 서버 시작 단계에서 발생하며, 발생 시 프로세스는 시작을 중단해야 합니다.
/// 메시지에는 비밀 키 값이 절대 포함되지 않습니다.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JWT 비밀 키 미설정 또는 공백
    #[error("JWT 비밀 키가 설정되지 않았습니다 (JWT_SECRET_KEY 또는 TASKTRACE__AUTH__JWT_SECRET_KEY)")]
    MissingSecret,

    /// JWT 비밀 키 길이 부족
    #[error("JWT 비밀 키는 최소 {min}바이트 이상이어야 합니다 (현재 {actual}바이트)")]
    WeakSecret { min: usize, actual: usize },

    /// 지원하지 않는 서명 알고리즘
    #[error("지원하지 않는 서명 알고리즘: {0}")]
    UnsupportedAlgorithm(String),

    /// 토큰 만료 시간이 0 이하
    #[error("토큰 만료 시간은 양수여야 합니다: {0}분")]
    InvalidTokenLifetime(i64),

    /// 비밀번호 해싱 파라미터 오류
    #[error("잘못된 해싱 파라미터: {0}")]
    InvalidHashing(String),

    /// bootstrap 관리자 설정 불완전
    #[error("bootstrap 관리자 설정에는 이메일과 비밀번호가 모두 필요합니다")]
    IncompleteBootstrapAdmin,

    /// 설정 소스 로드/역직렬화 실패
    #[error("설정 로드 실패: {0}")]
    Source(#[from] config::ConfigError),
}

/// 설정 작업을 위한 Result 타입.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// 인증 관련 설정 에러인지 확인합니다.
    pub fn is_auth_related(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingSecret
                | ConfigError::WeakSecret { .. }
                | ConfigError::UnsupportedAlgorithm(_)
                | ConfigError::InvalidTokenLifetime(_)
        )
    }
}
