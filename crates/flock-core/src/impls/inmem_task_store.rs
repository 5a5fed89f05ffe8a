//! InMemoryTaskStore - 開発用・テスト用のタスク正本
//!
//! # 実装詳細
//! - HashMap<TaskId, Task> を tokio Mutex で保護
//! - save は常にスナップショット全体を置き換える（last writer wins）

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{StoreError, Task, TaskId};
use crate::observability::TaskCounts;
use crate::ports::TaskStore;

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<Mutex<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.lock().await.get(&id).cloned())
    }

    async fn save(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks.lock().await.insert(task.id(), task.clone());
        Ok(())
    }

    async fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<TaskId>, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut expired: Vec<TaskId> = tasks
            .values()
            .filter(|task| task.status().is_terminal())
            .filter(|task| matches!(task.completed_at(), Some(at) if at < cutoff))
            .map(Task::id)
            .collect();
        expired.sort();
        Ok(expired)
    }

    async fn delete(&self, id: TaskId) -> Result<bool, StoreError> {
        Ok(self.tasks.lock().await.remove(&id).is_some())
    }

    async fn counts_by_status(&self) -> Result<TaskCounts, StoreError> {
        let tasks = self.tasks.lock().await;
        let mut counts = TaskCounts::default();
        for task in tasks.values() {
            counts.record(task.status());
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorStage;
    use chrono::TimeZone;
    use ulid::Ulid;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn task() -> Task {
        Task::new_collection(TaskId::from_ulid(Ulid::new()), at(0), vec![1])
    }

    #[tokio::test]
    async fn save_overwrites_whole_snapshot() {
        let store = InMemoryTaskStore::new();
        let mut t = task();
        store.save(&t).await.unwrap();

        t.start(at(1)).unwrap();
        t.counters_mut().groups.advance(1);
        store.save(&t).await.unwrap();

        let loaded = store.get(t.id()).await.unwrap().unwrap();
        assert_eq!(loaded, t);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = InMemoryTaskStore::new();
        assert!(store.get(task().id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lists_only_old_terminal_tasks() {
        let store = InMemoryTaskStore::new();

        let mut old_done = task();
        old_done.start(at(1)).unwrap();
        old_done.complete(at(10)).unwrap();

        let mut recent_failed = task();
        recent_failed.fail(at(100), ErrorStage::Validation, "x").unwrap();

        let running = {
            let mut t = task();
            t.start(at(1)).unwrap();
            t
        };

        for t in [&old_done, &recent_failed, &running] {
            store.save(t).await.unwrap();
        }

        let expired = store.list_expired(at(50)).await.unwrap();
        assert_eq!(expired, vec![old_done.id()]);

        let counts = store.counts_by_status().await.unwrap();
        assert_eq!((counts.completed, counts.failed, counts.processing), (1, 1, 1));
    }
}
