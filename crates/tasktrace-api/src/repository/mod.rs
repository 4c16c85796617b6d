//! 저장소 계층.
//!
//! 라우트 핸들러와 인증 코어는 구체 저장소가 아닌 트레이트에 의존합니다.
//! `DATABASE_URL`이 설정되면 PostgreSQL 저장소를, 아니면 메모리 저장소를 사용합니다.

pub mod tasks;
pub mod users;

use sqlx::PgPool;

pub use tasks::{InMemoryTaskStore, PgTaskStore, TaskStore};
pub use users::{InMemoryUserStore, PgUserStore, UserStore};

/// 저장소 에러.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("레코드를 찾을 수 없습니다")]
    NotFound,
    #[error("저장된 레코드가 유효하지 않습니다: {0}")]
    InvalidRow(String),
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

/// 저장소 작업을 위한 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

/// 고유 제약 위반은 [`StoreError::DuplicateEmail`]로 변환.
pub(crate) fn map_unique_violation(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(error),
    }
}

/// SQL OFFSET/LIMIT 값으로 변환.
pub(crate) fn sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              BIGSERIAL PRIMARY KEY,
        email           TEXT NOT NULL,
        hashed_password TEXT NOT NULL,
        role            TEXT NOT NULL DEFAULT 'user',
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_key ON users (lower(email))",
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id          BIGSERIAL PRIMARY KEY,
        title       TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        due_date    DATE NOT NULL,
        status      TEXT NOT NULL DEFAULT 'pending',
        owner_id    BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS tasks_owner_id_idx ON tasks (owner_id)",
];

/// 테이블과 인덱스가 없으면 생성합니다. 여러 번 호출해도 안전합니다.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
