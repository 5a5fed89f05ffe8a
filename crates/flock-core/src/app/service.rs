//! FlockService - 投入・状態確認の入口
//!
//! `submit` and `start_collection` return as soon as the task record exists;
//! the pipeline runs on a detached tokio task. A second, supervising task
//! awaits it and turns an `Err` or a panic into `failed`, so a task never
//! stays `processing` because its worker died.
//!
//! # Known limitation
//! `cancel` marks the task failed, but a running pipeline does not watch for
//! it. Saves are last-writer-wins: the pipeline's next snapshot overwrites
//! the cancellation.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::app::import::ImportPipeline;
use crate::app::lifecycle::TaskLifecycle;
use crate::app::orchestrator::CollectionOrchestrator;
use crate::app::progress::ProgressCalculator;
use crate::app::retention::RetentionSweeper;
use crate::app::status::{StatusLookup, StatusView, SubmitReceipt};
use crate::domain::{CommunityId, ErrorStage, FlockError, Task, TaskId, TaskKind};
use crate::observability::TaskCounts;
use crate::ports::{
    CommunityStore, EncodingHint, EntryParser, Page, PageFilter, StoredCommunity, TaskStore,
};

pub(crate) struct Inner {
    pub(crate) parser: Arc<dyn EntryParser>,
    pub(crate) tasks: Arc<dyn TaskStore>,
    pub(crate) communities: Arc<dyn CommunityStore>,
    pub(crate) lifecycle: Arc<TaskLifecycle>,
    pub(crate) import: ImportPipeline,
    pub(crate) collection: CollectionOrchestrator,
    pub(crate) progress: ProgressCalculator,
    pub(crate) retention: std::time::Duration,
}

/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct FlockService {
    inner: Arc<Inner>,
}

fn stage_for(kind: TaskKind) -> ErrorStage {
    match kind {
        TaskKind::Import => ErrorStage::Validation,
        TaskKind::Collection => ErrorStage::Collection,
    }
}

impl FlockService {
    pub(crate) fn new(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Parse, create the import task, start validation in the background.
    ///
    /// Pipeline failures never surface here; poll `status` for them.
    pub async fn submit(
        &self,
        bytes: &[u8],
        encoding: EncodingHint,
    ) -> Result<SubmitReceipt, FlockError> {
        let parsed = self.inner.parser.parse(bytes, encoding);
        let task = self.inner.lifecycle.create_import(&parsed).await?;
        let receipt = SubmitReceipt {
            task_id: task.id(),
            total_candidates: task.counters().total_candidates,
            invalid_from_parse: parsed.errors.len() as u64,
            duplicates: 0,
        };

        let inner = self.inner.clone();
        let entries = parsed.entries;
        self.spawn_supervised(task.id(), TaskKind::Import, async move {
            inner.import.run(task, entries).await
        });

        info!(task_id = %receipt.task_id, candidates = receipt.total_candidates, "import submitted");
        Ok(receipt)
    }

    /// Start collecting posts and comments for `targets`.
    pub async fn start_collection(&self, targets: Vec<CommunityId>) -> Result<TaskId, FlockError> {
        let task = self.inner.lifecycle.create_collection(targets).await?;
        let task_id = task.id();

        let inner = self.inner.clone();
        self.spawn_supervised(task_id, TaskKind::Collection, async move {
            inner.collection.run(task).await
        });
        Ok(task_id)
    }

    pub async fn status(&self, task_id: TaskId) -> Result<StatusLookup, FlockError> {
        Ok(match self.inner.tasks.get(task_id).await? {
            Some(task) => StatusLookup::Found(Box::new(StatusView::new(&task, &self.inner.progress))),
            None => StatusLookup::NotFound { task_id },
        })
    }

    /// Client-side cancel: mark the task failed. See the module docs for
    /// how this races with a running pipeline.
    pub async fn cancel(&self, task_id: TaskId, reason: &str) -> Result<Task, FlockError> {
        let mut task = self
            .inner
            .lifecycle
            .get(task_id)
            .await?
            .ok_or(FlockError::TaskNotFound(task_id))?;
        let stage = stage_for(task.kind());
        self.inner
            .lifecycle
            .fail(&mut task, stage, format!("cancelled: {reason}"))
            .await?;
        Ok(task)
    }

    pub async fn counts(&self) -> Result<TaskCounts, FlockError> {
        Ok(self.inner.tasks.counts_by_status().await?)
    }

    /// Communities stored so far, optionally only those one import created.
    pub async fn communities(
        &self,
        filter: &PageFilter,
    ) -> Result<Page<StoredCommunity>, FlockError> {
        Ok(self.inner.communities.get_page(filter).await?)
    }

    /// A sweeper over this service's task store and clock.
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            self.inner.tasks.clone(),
            self.inner.lifecycle.clock().clone(),
            self.inner.retention,
        )
    }

    fn spawn_supervised<F>(&self, task_id: TaskId, kind: TaskKind, work: F)
    where
        F: Future<Output = Result<Task, FlockError>> + Send + 'static,
    {
        let lifecycle = self.inner.lifecycle.clone();
        let worker = tokio::spawn(work);

        tokio::spawn(async move {
            let reason = match worker.await {
                Ok(Ok(task)) => {
                    debug!(task_id = %task.id(), status = %task.status(), "background flow finished");
                    return;
                }
                Ok(Err(e)) => {
                    error!(task_id = %task_id, kind = ?e.kind(), error = %e, "background flow aborted");
                    format!("pipeline aborted: {e}")
                }
                Err(join) if join.is_panic() => {
                    error!(task_id = %task_id, "background flow panicked");
                    "internal error: background worker panicked".to_string()
                }
                Err(_) => "background worker was cancelled".to_string(),
            };

            match lifecycle.fail_by_id(task_id, stage_for(kind), reason).await {
                Ok(_) => {}
                Err(FlockError::InvalidTransition { from, .. }) => {
                    debug!(task_id = %task_id, status = %from, "already terminal");
                }
                Err(e) => error!(task_id = %task_id, kind = ?e.kind(), error = %e, "could not mark task failed"),
            }
        });
    }
}
