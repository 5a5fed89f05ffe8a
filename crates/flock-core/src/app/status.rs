//! Status - ステータスクエリの結果型
//!
//! What the submission and status entrypoints hand back to callers. All of
//! it is plain data, serialisable as JSON for the CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::progress::{Phase, Progress, ProgressCalculator};
use crate::domain::{CommunityId, Counters, Task, TaskId, TaskKind, TaskStatus};

/// Returned synchronously by `submit`, before any validation ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    #[serde(serialize_with = "display")]
    pub task_id: TaskId,
    pub total_candidates: u64,
    pub invalid_from_parse: u64,
    /// Always 0 at submission; duplicates are only known after validation.
    pub duplicates: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressView {
    pub processed: u64,
    pub total: u64,
    pub percentage: u8,
    pub current_phase: Phase,
}

impl From<&Progress> for ProgressView {
    fn from(progress: &Progress) -> Self {
        Self {
            processed: progress.processed,
            total: progress.total,
            percentage: progress.percentage,
            current_phase: progress.current_phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    #[serde(serialize_with = "display")]
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: ProgressView,
    pub counters: Counters,
    pub errors: Vec<String>,
    pub failure_reason: Option<String>,
    pub imported: Vec<CommunityId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusView {
    pub fn new(task: &Task, calculator: &ProgressCalculator) -> Self {
        let progress = calculator.for_task(task);
        Self {
            task_id: task.id(),
            kind: task.kind(),
            status: task.status(),
            progress: ProgressView::from(&progress),
            counters: task.counters().clone(),
            errors: task.errors(),
            failure_reason: task.failure_reason().map(str::to_string),
            imported: task.imported().to_vec(),
            created_at: task.created_at(),
            started_at: task.started_at(),
            completed_at: task.completed_at(),
        }
    }
}

/// Unknown ids are a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StatusLookup {
    Found(Box<StatusView>),
    NotFound {
        #[serde(serialize_with = "display")]
        task_id: TaskId,
    },
}

impl StatusLookup {
    pub fn found(&self) -> Option<&StatusView> {
        match self {
            StatusLookup::Found(view) => Some(view),
            StatusLookup::NotFound { .. } => None,
        }
    }
}

fn display<S: serde::Serializer>(id: &TaskId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(id)
}
