//! 식별자 해석기.
//!
//! 원본 토큰을 저장소의 사용자 레코드로 변환합니다. 매 요청마다 검증 후 새로 조회하며
//! 요청 간 캐시는 두지 않으므로 역할 변경과 사용자 삭제가 다음 요청부터 즉시 반영됩니다.

use std::sync::Arc;

use tasktrace_core::{UserId, UserRecord};
use tracing::{debug, error};

use super::{AuthError, TokenCodec};
use crate::repository::UserStore;

/// 토큰 → 사용자 해석기.
#[derive(Clone)]
pub struct IdentityResolver {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl IdentityResolver {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { codec, users }
    }

    /// 토큰으로 현재 사용자를 해석합니다.
    ///
    /// 어느 단계에서 실패하든 호출자에게는 [`AuthError::Unauthenticated`] 하나만 반환합니다.
    /// 실패 단계는 debug 로그에만 남습니다. 저장소 장애는 인증 실패가 아니므로
    /// [`AuthError::StoreUnavailable`]로 구분합니다.
    ///
    /// 1. 토큰 검증 (서명, 알고리즘, 만료)
    /// 2. `sub` 클레임 추출
    /// 3. `sub`를 [`UserId`]로 파싱
    /// 4. 저장소에서 사용자 조회
    pub async fn resolve_identity(&self, token: &str) -> Result<UserRecord, AuthError> {
        let claims = self.codec.validate_token(token).map_err(|e| {
            debug!(stage = "validate", reason = e.reason(), "Token rejected");
            AuthError::Unauthenticated
        })?;

        let subject = claims.sub.as_deref().ok_or_else(|| {
            debug!(stage = "subject", "Token has no subject claim");
            AuthError::Unauthenticated
        })?;

        let user_id: UserId = subject.parse().map_err(|_| {
            debug!(stage = "parse_subject", "Token subject is not a user id");
            AuthError::Unauthenticated
        })?;

        let user = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| {
                error!(stage = "load_user", user_id = %user_id, error = %e, "User store lookup failed");
                AuthError::StoreUnavailable
            })?
            .ok_or_else(|| {
                debug!(stage = "load_user", user_id = %user_id, "Token subject no longer exists");
                AuthError::Unauthenticated
            })?;

        if claims.role != Some(user.role) {
            debug!(
                user_id = %user.id,
                token_role = ?claims.role,
                current_role = %user.role,
                "Role changed since token issue"
            );
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ManualClock, SystemClock};
    use crate::repository::{InMemoryUserStore, StoreError, StoreResult};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use secrecy::SecretString;
    use tasktrace_core::{AuthSettings, NewUser, Role, SigningAlgorithm};

    const TEST_SECRET: &str = "test-secret-key-for-jwt-testing-minimum-32-chars";

    fn codec(clock: Arc<dyn crate::auth::Clock>) -> Arc<TokenCodec> {
        let settings =
            AuthSettings::new(SecretString::from(TEST_SECRET), SigningAlgorithm::HS256, 30)
                .unwrap();
        Arc::new(TokenCodec::new(&settings, clock))
    }

    fn setup() -> (IdentityResolver, Arc<TokenCodec>, Arc<InMemoryUserStore>) {
        let users = Arc::new(InMemoryUserStore::new());
        let codec = codec(Arc::new(SystemClock));
        let resolver = IdentityResolver::new(codec.clone(), users.clone());
        (resolver, codec, users)
    }

    async fn add_user(users: &InMemoryUserStore, email: &str, role: Role) -> UserRecord {
        users
            .create(NewUser {
                email: email.to_string(),
                hashed_password: "$argon2id$stub".to_string(),
                role,
            })
            .await
            .unwrap()
    }

    fn raw_token(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resolve_returns_current_record() {
        let (resolver, codec, users) = setup();
        let mut user = add_user(&users, "a@x.com", Role::User).await;

        let token = codec.issue_token(user.id.to_string(), user.role).unwrap();

        // 발급 후 역할 변경
        user.role = Role::Admin;
        users.save(&user).await.unwrap();

        let resolved = resolver.resolve_identity(&token.access_token).await.unwrap();
        assert_eq!(resolved.id, user.id);
        assert_eq!(resolved.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_deleted_user_is_unauthenticated() {
        let (resolver, codec, users) = setup();
        let user = add_user(&users, "a@x.com", Role::User).await;
        let token = codec.issue_token(user.id.to_string(), user.role).unwrap();

        users.delete(user.id).await.unwrap();

        assert_eq!(
            resolver.resolve_identity(&token.access_token).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_missing_or_unparsable_subject() {
        let (resolver, _, users) = setup();
        add_user(&users, "a@x.com", Role::User).await;
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();

        let no_sub = raw_token(serde_json::json!({ "role": "user", "exp": exp }));
        assert_eq!(
            resolver.resolve_identity(&no_sub).await,
            Err(AuthError::Unauthenticated)
        );

        let bad_sub = raw_token(serde_json::json!({ "sub": "abc", "role": "user", "exp": exp }));
        assert_eq!(
            resolver.resolve_identity(&bad_sub).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthenticated() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let codec = codec(clock.clone());
        let users = Arc::new(InMemoryUserStore::new());
        let resolver = IdentityResolver::new(codec.clone(), users.clone());
        let user = add_user(&users, "a@x.com", Role::User).await;

        let token = codec.issue_token(user.id.to_string(), user.role).unwrap();
        clock.advance(Duration::minutes(30));

        assert_eq!(
            resolver.resolve_identity(&token.access_token).await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_unknown_role_claim_still_resolves() {
        let (resolver, _, users) = setup();
        let user = add_user(&users, "a@x.com", Role::Admin).await;
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();

        let token = raw_token(serde_json::json!({
            "sub": user.id.to_string(),
            "role": "superuser",
            "exp": exp
        }));
        let resolved = resolver.resolve_identity(&token).await.unwrap();
        assert_eq!(resolved.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_unauthenticated() {
        struct BrokenStore;

        #[async_trait::async_trait]
        impl UserStore for BrokenStore {
            async fn find_by_id(&self, _: UserId) -> StoreResult<Option<UserRecord>> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
            async fn find_by_email(&self, _: &str) -> StoreResult<Option<UserRecord>> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
            async fn create(&self, _: NewUser) -> StoreResult<UserRecord> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
            async fn save(&self, _: &UserRecord) -> StoreResult<()> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
            async fn delete(&self, _: UserId) -> StoreResult<Option<UserRecord>> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
            async fn list(&self, _: usize, _: usize) -> StoreResult<Vec<UserRecord>> {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
        }

        let codec = codec(Arc::new(SystemClock));
        let resolver = IdentityResolver::new(codec.clone(), Arc::new(BrokenStore));
        let token = codec.issue_token("1", Role::User).unwrap();

        assert_eq!(
            resolver.resolve_identity(&token.access_token).await,
            Err(AuthError::StoreUnavailable)
        );
        // 토큰 검증 실패는 저장소 조회 전에 결정됨
        assert_eq!(
            resolver.resolve_identity("garbage").await,
            Err(AuthError::Unauthenticated)
        );
    }

    #[tokio::test]
    async fn test_garbage_tokens() {
        let (resolver, _, _) = setup();
        for token in ["", "garbage", "a.b.c"] {
            assert_eq!(
                resolver.resolve_identity(token).await,
                Err(AuthError::Unauthenticated)
            );
        }
    }
}
