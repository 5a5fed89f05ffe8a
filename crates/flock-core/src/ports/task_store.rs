//! TaskStore port - タスクの正本（source of truth）
//!
//! # 設計原則
//! - `save` is a full-snapshot overwrite, never a partial patch
//! - last writer wins; there is no version check

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::StoreError;
use crate::domain::{Task, TaskId};
use crate::observability::TaskCounts;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    async fn save(&self, task: &Task) -> Result<(), StoreError>;

    /// Terminal tasks whose `completed_at` is strictly before `cutoff`.
    async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<TaskId>, StoreError>;

    async fn delete(&self, id: TaskId) -> Result<bool, StoreError>;

    async fn counts_by_status(&self) -> Result<TaskCounts, StoreError>;
}
