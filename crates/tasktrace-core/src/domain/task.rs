//! 작업(Task) 도메인 모델.
//!
//! 모든 작업은 한 명의 소유자(사용자)에게 속합니다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// 기본 작업 상태.
pub const DEFAULT_TASK_STATUS: &str = "pending";

/// 작업 레코드
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// 새 작업 입력
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub owner_id: UserId,
}

/// 작업 부분 수정 입력
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TaskUpdate {
    /// 지정된 필드만 작업에 반영합니다.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

/// 작업 목록 필터
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// 상태 일치
    pub status: Option<String>,
    /// 제목 또는 설명에 포함된 문자열
    pub search: Option<String>,
    pub skip: usize,
    pub limit: usize,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = &self.status {
            if &task.status != status {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !task.title.contains(search.as_str()) && !task.description.contains(search.as_str())
            {
                return false;
            }
        }
        true
    }
}
