//! User Repository
//!
//! 사용자 레코드 저장소. 인증 코어는 이 트레이트만 통해 사용자를 조회합니다.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tasktrace_core::{NewUser, Role, UserId, UserRecord};

use super::{map_unique_violation, sql_count, StoreError, StoreResult};

/// 사용자 저장소.
///
/// 조회 결과가 없으면 에러가 아닌 `None`을 반환합니다.
/// 에러는 저장소 자체의 장애만 나타냅니다.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>>;

    /// 이메일로 조회 (대소문자 무시).
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    /// 새 사용자 생성. ID는 저장소가 할당하며 재사용되지 않습니다.
    async fn create(&self, new_user: NewUser) -> StoreResult<UserRecord>;

    /// 기존 레코드 갱신.
    async fn save(&self, record: &UserRecord) -> StoreResult<()>;

    /// 사용자 삭제. 삭제된 레코드를 반환합니다.
    async fn delete(&self, id: UserId) -> StoreResult<Option<UserRecord>>;

    /// ID 순 목록.
    async fn list(&self, skip: usize, limit: usize) -> StoreResult<Vec<UserRecord>>;
}

// ================================================================================================
// In-memory
// ================================================================================================

#[derive(Debug, Default)]
struct UserTable {
    last_id: i64,
    users: BTreeMap<UserId, UserRecord>,
}

impl UserTable {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }
}

/// 메모리 기반 사용자 저장소.
///
/// 프로세스가 종료되면 내용이 사라집니다. 테스트와 DB 없는 로컬 실행용입니다.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    table: RwLock<UserTable>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.email_taken(&new_user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        table.last_id += 1;
        let record = UserRecord {
            id: UserId::new(table.last_id),
            email: new_user.email,
            hashed_password: new_user.hashed_password,
            role: new_user.role,
            created_at: Utc::now(),
        };
        table.users.insert(record.id, record.clone());

        Ok(record)
    }

    async fn save(&self, record: &UserRecord) -> StoreResult<()> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if !table.users.contains_key(&record.id) {
            return Err(StoreError::NotFound);
        }
        if table.email_taken(&record.email, Some(record.id)) {
            return Err(StoreError::DuplicateEmail);
        }

        table.users.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        Ok(table.users.remove(&id))
    }

    async fn list(&self, skip: usize, limit: usize) -> StoreResult<Vec<UserRecord>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.users.values().skip(skip).take(limit).cloned().collect())
    }
}

// ================================================================================================
// PostgreSQL
// ================================================================================================

/// `users` 테이블 행.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    hashed_password: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| {
            StoreError::InvalidRow(format!("user {} has unknown role '{}'", row.id, row.role))
        })?;

        Ok(UserRecord {
            id: UserId::new(row.id),
            email: row.email,
            hashed_password: row.hashed_password,
            role,
            created_at: row.created_at,
        })
    }
}

fn into_record(row: Option<UserRow>) -> StoreResult<Option<UserRecord>> {
    row.map(UserRecord::try_from).transpose()
}

const USER_COLUMNS: &str = "id, email, hashed_password, role, created_at";

/// PostgreSQL 사용자 저장소.
///
/// 이메일 고유성은 `lower(email)` 고유 인덱스로 보장됩니다.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<UserRecord> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (email, hashed_password, role) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new_user.email)
        .bind(new_user.hashed_password)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        UserRecord::try_from(row)
    }

    async fn save(&self, record: &UserRecord) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET email = $2, hashed_password = $3, role = $4 WHERE id = $1",
        )
        .bind(record.id.as_i64())
        .bind(&record.email)
        .bind(&record.hashed_password)
        .bind(record.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        into_record(row)
    }

    async fn list(&self, skip: usize, limit: usize) -> StoreResult<Vec<UserRecord>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(sql_count(skip))
        .bind(sql_count(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            hashed_password: "$argon2id$stub".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        let b = store.create(new_user("b@x.com")).await.unwrap();

        assert_eq!(a.id, UserId::new(1));
        assert_eq!(b.id, UserId::new(2));
        assert_eq!(
            store.find_by_id(b.id).await.unwrap().unwrap().email,
            "b@x.com"
        );
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();

        let result = store.create(new_user("A@X.com")).await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
        assert!(store.find_by_email("A@x.COM").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = InMemoryUserStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        assert!(store.delete(a.id).await.unwrap().is_some());
        assert!(store.delete(a.id).await.unwrap().is_none());
        assert!(store.find_by_id(a.id).await.unwrap().is_none());

        let b = store.create(new_user("a@x.com")).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_save_updates_role() {
        let store = InMemoryUserStore::new();
        let mut a = store.create(new_user("a@x.com")).await.unwrap();
        a.role = Role::Admin;
        store.save(&a).await.unwrap();

        assert_eq!(
            store.find_by_id(a.id).await.unwrap().unwrap().role,
            Role::Admin
        );

        let mut ghost = a.clone();
        ghost.id = UserId::new(99);
        assert!(matches!(store.save(&ghost).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryUserStore::new();
        for i in 0..5 {
            store
                .create(new_user(&format!("u{}@x.com", i)))
                .await
                .unwrap();
        }

        let page = store.list(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, UserId::new(2));
        assert!(store.list(10, 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_row_with_unknown_role_is_invalid() {
        let row = UserRow {
            id: 3,
            email: "a@x.com".to_string(),
            hashed_password: "$argon2id$stub".to_string(),
            role: "owner".to_string(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            UserRecord::try_from(row),
            Err(StoreError::InvalidRow(_))
        ));
    }

    async fn pg_store() -> PgUserStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.unwrap();
        crate::repository::ensure_schema(&pool).await.unwrap();
        PgUserStore::new(pool)
    }

    #[tokio::test]
    #[ignore] // DB 연결 필요
    async fn test_pg_user_lifecycle() {
        let store = pg_store().await;
        let email = format!("pg-{}@x.com", uuid::Uuid::new_v4());

        let mut user = store.create(new_user(&email)).await.unwrap();
        assert!(matches!(
            store.create(new_user(&email.to_uppercase())).await,
            Err(StoreError::DuplicateEmail)
        ));

        user.role = Role::Admin;
        store.save(&user).await.unwrap();
        let loaded = store
            .find_by_email(&email.to_uppercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.role, Role::Admin);

        assert!(store.delete(user.id).await.unwrap().is_some());
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
        assert!(matches!(store.save(&user).await, Err(StoreError::NotFound)));
    }
}
