//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 시작 시 한 번 만들어지고 Arc로 래핑되어 요청 간에 공유됩니다.
//! 인증 설정은 토큰 코덱 안에만 존재하며 이후 변경되지 않습니다.

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tasktrace_core::{
    AuthSettings, BootstrapAdmin, ConfigResult, HashingConfig, NewUser, Role, UserRecord,
};
use tracing::info;

use crate::auth::{Clock, CredentialHasher, IdentityResolver, PasswordError, TokenCodec};
use crate::repository::{
    InMemoryTaskStore, InMemoryUserStore, PgTaskStore, PgUserStore, StoreError, TaskStore,
    UserStore,
};

/// bootstrap 관리자 생성 에러.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("bootstrap 관리자 비밀번호 오류: {0}")]
    Password(#[from] PasswordError),
    #[error("bootstrap 관리자 해싱 작업 실패")]
    HashingTask,
    #[error("bootstrap 관리자 저장 실패: {0}")]
    Store(#[from] StoreError),
}

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 비밀번호 해셔
    pub hasher: CredentialHasher,

    /// Access Token 코덱
    pub codec: Arc<TokenCodec>,

    /// 요청별 사용자 해석기
    pub resolver: IdentityResolver,

    /// 사용자 저장소
    pub users: Arc<dyn UserStore>,

    /// 작업 저장소
    pub tasks: Arc<dyn TaskStore>,

    /// 데이터베이스 연결 풀 (메모리 저장소 사용 시 None)
    pub db_pool: Option<PgPool>,

    /// 회원가입 시 admin 역할 허용 여부
    pub allow_admin_signup: bool,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 메모리 저장소로 AppState 생성.
    ///
    /// # 인자
    /// * `settings` - 검증된 인증 설정
    /// * `hashing` - Argon2 비용 설정
    /// * `clock` - 토큰 코덱이 사용할 시계
    pub fn new(
        settings: &AuthSettings,
        hashing: &HashingConfig,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        Self::with_stores(
            settings,
            hashing,
            clock,
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTaskStore::new()),
        )
    }

    /// 지정된 저장소로 AppState 생성.
    pub fn with_stores(
        settings: &AuthSettings,
        hashing: &HashingConfig,
        clock: Arc<dyn Clock>,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
    ) -> ConfigResult<Self> {
        let hasher = CredentialHasher::new(hashing)?;
        let codec = Arc::new(TokenCodec::new(settings, clock));
        let resolver = IdentityResolver::new(codec.clone(), users.clone());

        Ok(Self {
            hasher,
            codec,
            resolver,
            users,
            tasks,
            db_pool: None,
            allow_admin_signup: false,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// PostgreSQL 저장소로 전환.
    ///
    /// 식별자 해석기도 새 사용자 저장소를 바라보도록 다시 만듭니다.
    #[must_use]
    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.users = Arc::new(PgUserStore::new(pool.clone()));
        self.tasks = Arc::new(PgTaskStore::new(pool.clone()));
        self.resolver = IdentityResolver::new(self.codec.clone(), self.users.clone());
        self.db_pool = Some(pool);
        self
    }

    /// 회원가입 시 admin 역할 허용 여부 설정.
    #[must_use]
    pub fn with_admin_signup(mut self, allowed: bool) -> Self {
        self.allow_admin_signup = allowed;
        self
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (chrono::Utc::now() - self.started_at).num_seconds()
    }

    /// 같은 이메일의 사용자가 없으면 관리자 계정을 생성합니다.
    ///
    /// 이미 존재하면 역할을 바꾸지 않고 `None`을 반환합니다.
    pub async fn bootstrap_admin(
        &self,
        admin: &BootstrapAdmin,
    ) -> Result<Option<UserRecord>, BootstrapError> {
        if self.users.find_by_email(&admin.email).await?.is_some() {
            info!(email = %admin.email, "Bootstrap admin already exists, skipping");
            return Ok(None);
        }

        let hasher = self.hasher.clone();
        let password = admin.password.clone();
        let hashed_password =
            tokio::task::spawn_blocking(move || hasher.hash_password(password.expose_secret()))
                .await
                .map_err(|_| BootstrapError::HashingTask)??;

        let user = self
            .users
            .create(NewUser {
                email: admin.email.clone(),
                hashed_password,
                role: Role::Admin,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
        Ok(Some(user))
    }
}

/// 테스트용 비밀 키.
#[cfg(any(test, feature = "test-utils"))]
pub const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

/// 테스트용 AppState 생성.
///
/// 해싱 비용을 최소로 낮추고 시스템 시계를 사용합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use crate::auth::SystemClock;
    use secrecy::SecretString;
    use tasktrace_core::SigningAlgorithm;

    let settings = AuthSettings::new(
        SecretString::from(TEST_SECRET),
        SigningAlgorithm::HS256,
        30,
    )
    .expect("test auth settings");
    let hashing = HashingConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    };

    AppState::new(&settings, &hashing, Arc::new(SystemClock)).expect("test state")
}
