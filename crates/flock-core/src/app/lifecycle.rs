//! TaskLifecycle - タスクの生成・状態遷移・保存
//!
//! Every transition goes through here: the state machine on `Task` checks
//! it, the clock stamps it, and the whole snapshot is written back.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::{CommunityId, ErrorStage, FlockError, ParsedFile, Task, TaskId};
use crate::ports::{Clock, IdGenerator, TaskStore};

pub struct TaskLifecycle {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskLifecycle {
    pub fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { store, clock, ids }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn create_import(&self, parsed: &ParsedFile) -> Result<Task, FlockError> {
        let task = Task::new_import(self.ids.generate_task_id(), self.clock.now(), parsed);
        self.store.save(&task).await?;
        info!(task_id = %task.id(), candidates = task.counters().total_candidates, "import task created");
        Ok(task)
    }

    pub async fn create_collection(&self, targets: Vec<CommunityId>) -> Result<Task, FlockError> {
        let task = Task::new_collection(self.ids.generate_task_id(), self.clock.now(), targets);
        self.store.save(&task).await?;
        info!(task_id = %task.id(), targets = task.targets().len(), "collection task created");
        Ok(task)
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<Task>, FlockError> {
        Ok(self.store.get(id).await?)
    }

    /// Full overwrite. Last writer wins.
    pub async fn save(&self, task: &Task) -> Result<(), FlockError> {
        Ok(self.store.save(task).await?)
    }

    pub async fn start(&self, task: &mut Task) -> Result<(), FlockError> {
        task.start(self.clock.now())?;
        self.store.save(task).await?;
        info!(task_id = %task.id(), kind = ?task.kind(), "task processing");
        Ok(())
    }

    pub async fn complete(&self, task: &mut Task) -> Result<(), FlockError> {
        task.complete(self.clock.now())?;
        self.store.save(task).await?;
        info!(
            task_id = %task.id(),
            errors = task.error_count(),
            valid = task.counters().valid,
            duplicates = task.counters().duplicates,
            invalid = task.counters().invalid,
            "task completed"
        );
        Ok(())
    }

    pub async fn fail(
        &self,
        task: &mut Task,
        stage: ErrorStage,
        reason: impl Into<String>,
    ) -> Result<(), FlockError> {
        let reason = reason.into();
        task.fail(self.clock.now(), stage, reason.clone())?;
        self.store.save(task).await?;
        error!(task_id = %task.id(), ?stage, %reason, "task failed");
        Ok(())
    }

    /// Reload the latest snapshot and fail it. Used where the caller holds
    /// no snapshot: a crashed background flow, or a client-side cancel.
    pub async fn fail_by_id(
        &self,
        id: TaskId,
        stage: ErrorStage,
        reason: impl Into<String>,
    ) -> Result<Task, FlockError> {
        let mut task = self
            .store
            .get(id)
            .await?
            .ok_or(FlockError::TaskNotFound(id))?;
        self.fail(&mut task, stage, reason).await?;
        Ok(task)
    }
}
