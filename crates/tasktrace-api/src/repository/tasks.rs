//! Task Repository
//!
//! 작업 저장소. 사용자 경로의 조회/수정/삭제는 모두 소유자 범위로 제한됩니다.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tasktrace_core::{NewTask, Task, TaskFilter, TaskUpdate, UserId};

use super::{sql_count, StoreResult};

/// 작업 저장소.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, new_task: NewTask) -> StoreResult<Task>;

    /// 소유자의 작업 조회. 다른 사용자의 작업은 `None`입니다.
    async fn find_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>>;

    async fn list_for_owner(&self, owner: UserId, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    async fn update_for_owner(
        &self,
        id: i64,
        owner: UserId,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>>;

    async fn delete_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>>;

    /// 전체 작업 목록 (관리자용).
    async fn list_all(&self, skip: usize, limit: usize) -> StoreResult<Vec<Task>>;

    /// 소유자의 모든 작업 삭제. 삭제된 개수를 반환합니다.
    async fn delete_by_owner(&self, owner: UserId) -> StoreResult<u64>;
}

// ================================================================================================
// In-memory
// ================================================================================================

#[derive(Debug, Default)]
struct TaskTable {
    last_id: i64,
    tasks: BTreeMap<i64, Task>,
}

/// 메모리 기반 작업 저장소.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    table: RwLock<TaskTable>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, new_task: NewTask) -> StoreResult<Task> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.last_id += 1;

        let task = Task {
            id: table.last_id,
            title: new_task.title,
            description: new_task.description,
            due_date: new_task.due_date,
            status: new_task.status,
            owner_id: new_task.owner_id,
            created_at: Utc::now(),
        };
        table.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table
            .tasks
            .get(&id)
            .filter(|t| t.owner_id == owner)
            .cloned())
    }

    async fn list_for_owner(&self, owner: UserId, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table
            .tasks
            .values()
            .filter(|t| t.owner_id == owner && filter.matches(t))
            .skip(filter.skip)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn update_for_owner(
        &self,
        id: i64,
        owner: UserId,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let Some(task) = table.tasks.get_mut(&id).filter(|t| t.owner_id == owner) else {
            return Ok(None);
        };
        update.apply_to(task);
        Ok(Some(task.clone()))
    }

    async fn delete_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if table.tasks.get(&id).map(|t| t.owner_id) != Some(owner) {
            return Ok(None);
        }
        Ok(table.tasks.remove(&id))
    }

    async fn list_all(&self, skip: usize, limit: usize) -> StoreResult<Vec<Task>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.tasks.values().skip(skip).take(limit).cloned().collect())
    }

    async fn delete_by_owner(&self, owner: UserId) -> StoreResult<u64> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let before = table.tasks.len();
        table.tasks.retain(|_, t| t.owner_id != owner);
        Ok((before - table.tasks.len()) as u64)
    }
}

// ================================================================================================
// PostgreSQL
// ================================================================================================

/// `tasks` 테이블 행.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: String,
    due_date: NaiveDate,
    status: String,
    owner_id: i64,
    created_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            status: row.status,
            owner_id: UserId::new(row.owner_id),
            created_at: row.created_at,
        }
    }
}

const TASK_COLUMNS: &str = "id, title, description, due_date, status, owner_id, created_at";

/// PostgreSQL 작업 저장소.
///
/// 사용자 삭제 시 작업은 외래 키의 `ON DELETE CASCADE`로도 함께 삭제됩니다.
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, new_task: NewTask) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks (title, description, due_date, status, owner_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {TASK_COLUMNS}"
        ))
        .bind(new_task.title)
        .bind(new_task.description)
        .bind(new_task.due_date)
        .bind(new_task.status)
        .bind(new_task.owner_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id)
        .bind(owner.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Task::from))
    }

    async fn list_for_owner(&self, owner: UserId, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        // 검색은 제목/설명의 대소문자 구분 부분 일치
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE owner_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::text IS NULL OR strpos(title, $3) > 0 OR strpos(description, $3) > 0) \
             ORDER BY id OFFSET $4 LIMIT $5"
        ))
        .bind(owner.as_i64())
        .bind(filter.status.as_deref())
        .bind(filter.search.as_deref())
        .bind(sql_count(filter.skip))
        .bind(sql_count(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn update_for_owner(
        &self,
        id: i64,
        owner: UserId,
        update: TaskUpdate,
    ) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks SET \
                 title = COALESCE($3, title), \
                 description = COALESCE($4, description), \
                 due_date = COALESCE($5, due_date), \
                 status = COALESCE($6, status) \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(owner.as_i64())
        .bind(update.title)
        .bind(update.description)
        .bind(update.due_date)
        .bind(update.status)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Task::from))
    }

    async fn delete_for_owner(&self, id: i64, owner: UserId) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "DELETE FROM tasks WHERE id = $1 AND owner_id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(owner.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Task::from))
    }

    async fn list_all(&self, skip: usize, limit: usize) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks ORDER BY id OFFSET $1 LIMIT $2"
        ))
        .bind(sql_count(skip))
        .bind(sql_count(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn delete_by_owner(&self, owner: UserId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE owner_id = $1")
            .bind(owner.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
