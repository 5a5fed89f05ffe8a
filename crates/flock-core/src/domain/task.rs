//! Task record: the unit of work and its observable state.
//!
//! Design:
//! - `Task` is an owned snapshot. Stages take it by value (or `&mut`),
//!   mutate it through the methods below, and hand the whole snapshot to
//!   `TaskStore::save`. There is no partial-field update path.
//! - Status transitions are methods that check the current state and
//!   refuse anything the state machine forbids.
//! - Error lists only grow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::ParsedFile;
use super::errors::FlockError;
use super::ids::{CommunityId, TaskId};
use super::state::{ErrorStage, TaskKind, TaskStatus};

/// Processed/total pair for one progress phase.
///
/// `total == None` means the total is not known yet; progress for the phase
/// is then estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounter {
    pub processed: u64,
    pub total: Option<u64>,
}

impl PhaseCounter {
    pub fn known(total: u64) -> Self {
        Self {
            processed: 0,
            total: Some(total),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    /// Advance by `n`, never past a known total.
    pub fn advance(&mut self, n: u64) {
        let next = self.processed.saturating_add(n);
        self.processed = match self.total {
            Some(total) => next.min(total),
            None => next,
        };
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = Some(total);
        self.processed = self.processed.min(total);
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.processed >= total)
    }

    /// Make `processed == total`: a known total is taken as done, an
    /// unknown one becomes whatever was processed.
    fn finalize(&mut self) {
        match self.total {
            Some(total) => self.processed = total,
            None => self.total = Some(self.processed),
        }
    }
}

/// Counters written by the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub groups: PhaseCounter,
    pub posts: PhaseCounter,
    pub comments: PhaseCounter,

    /// Lines submitted, including the ones that failed to parse.
    pub total_candidates: u64,
    /// Persisted as new records.
    pub valid: u64,
    /// Already in storage, or repeated within the request.
    pub duplicates: u64,
    /// Parse errors, key-less entries, and keys the directory did not match.
    pub invalid: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    status: TaskStatus,
    counters: Counters,

    parse_errors: Vec<String>,
    validation_errors: Vec<String>,
    collection_errors: Vec<String>,
    failure_reason: Option<String>,

    /// Communities a collection task drains.
    targets: Vec<CommunityId>,
    /// Communities an import task persisted.
    imported: Vec<CommunityId>,

    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    fn new(id: TaskId, kind: TaskKind, now: DateTime<Utc>, counters: Counters) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Pending,
            counters,
            parse_errors: Vec::new(),
            validation_errors: Vec::new(),
            collection_errors: Vec::new(),
            failure_reason: None,
            targets: Vec::new(),
            imported: Vec::new(),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Import task for a parsed upload.
    ///
    /// Only the groups phase carries work. Posts and comments have nothing to
    /// do (a known total of zero) and are left out of import progress.
    pub fn new_import(id: TaskId, now: DateTime<Utc>, parsed: &ParsedFile) -> Self {
        let counters = Counters {
            groups: PhaseCounter::unknown(),
            posts: PhaseCounter::known(0),
            comments: PhaseCounter::known(0),
            total_candidates: parsed.total_candidates() as u64,
            invalid: parsed.errors.len() as u64,
            ..Counters::default()
        };
        let mut task = Self::new(id, TaskKind::Import, now, counters);
        task.parse_errors = parsed.errors.clone();
        task
    }

    /// Collection task for a known set of communities.
    pub fn new_collection(id: TaskId, now: DateTime<Utc>, targets: Vec<CommunityId>) -> Self {
        let counters = Counters {
            groups: PhaseCounter::known(targets.len() as u64),
            posts: PhaseCounter::unknown(),
            comments: PhaseCounter::unknown(),
            ..Counters::default()
        };
        let mut task = Self::new(id, TaskKind::Collection, now, counters);
        task.targets = targets;
        task
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    pub fn targets(&self) -> &[CommunityId] {
        &self.targets
    }

    pub fn imported(&self) -> &[CommunityId] {
        &self.imported
    }

    pub fn set_imported(&mut self, ids: Vec<CommunityId>) {
        self.imported = ids;
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// User-visible errors: parse, then validation, then collection.
    pub fn errors(&self) -> Vec<String> {
        self.parse_errors
            .iter()
            .chain(&self.validation_errors)
            .chain(&self.collection_errors)
            .cloned()
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.parse_errors.len() + self.validation_errors.len() + self.collection_errors.len()
    }

    pub fn record_error(&mut self, stage: ErrorStage, message: impl Into<String>) {
        let bucket = match stage {
            ErrorStage::Parse => &mut self.parse_errors,
            ErrorStage::Validation => &mut self.validation_errors,
            ErrorStage::Collection => &mut self.collection_errors,
        };
        bucket.push(message.into());
    }

    /// pending -> processing. Sets `started_at` exactly once.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), FlockError> {
        self.ensure(TaskStatus::Pending, TaskStatus::Processing)?;
        self.status = TaskStatus::Processing;
        self.started_at = Some(now);
        Ok(())
    }

    /// processing -> completed. Finalizes every phase counter.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), FlockError> {
        self.ensure(TaskStatus::Processing, TaskStatus::Completed)?;
        self.counters.groups.finalize();
        self.counters.posts.finalize();
        self.counters.comments.finalize();
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// pending|processing -> failed. The reason is appended to the stage's errors.
    pub fn fail(
        &mut self,
        now: DateTime<Utc>,
        stage: ErrorStage,
        reason: impl Into<String>,
    ) -> Result<(), FlockError> {
        if self.status.is_terminal() {
            return Err(FlockError::InvalidTransition {
                from: self.status,
                to: TaskStatus::Failed,
            });
        }
        let reason = reason.into();
        self.record_error(stage, reason.clone());
        self.failure_reason = Some(reason);
        self.status = TaskStatus::Failed;
        self.completed_at = Some(now);
        Ok(())
    }

    fn ensure(&self, expected: TaskStatus, to: TaskStatus) -> Result<(), FlockError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(FlockError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn collection(targets: Vec<CommunityId>) -> Task {
        Task::new_collection(TaskId::from_ulid(Ulid::new()), t(0), targets)
    }

    #[test]
    fn new_task_is_pending_without_timestamps() {
        let task = collection(vec![1, 2]);
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.started_at(), None);
        assert_eq!(task.completed_at(), None);
        assert_eq!(task.counters().groups, PhaseCounter::known(2));
    }

    #[test]
    fn start_twice_is_invalid_transition() {
        let mut task = collection(vec![1]);
        task.start(t(1)).unwrap();

        let err = task.start(t(2)).unwrap_err();
        assert_eq!(
            err,
            FlockError::InvalidTransition {
                from: TaskStatus::Processing,
                to: TaskStatus::Processing
            }
        );
        assert_eq!(task.started_at(), Some(t(1)));
    }

    #[test]
    fn complete_requires_processing() {
        let mut task = collection(vec![1]);
        assert!(task.complete(t(1)).is_err());
        assert_eq!(task.status(), TaskStatus::Pending);
    }

    #[test]
    fn complete_finalizes_counters() {
        let mut task = collection(vec![1, 2, 3]);
        task.start(t(1)).unwrap();
        task.counters_mut().groups.advance(2);
        task.counters_mut().comments.advance(40);
        task.complete(t(5)).unwrap();

        let c = task.counters();
        assert_eq!(c.groups.processed, 3);
        assert_eq!(c.comments.total, Some(40));
        assert!(c.groups.is_complete() && c.posts.is_complete() && c.comments.is_complete());
        assert_eq!(task.completed_at(), Some(t(5)));
    }

    #[test]
    fn fail_from_pending_records_reason() {
        let mut task = collection(vec![1]);
        task.fail(t(1), ErrorStage::Validation, "rate limited").unwrap();

        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.failure_reason(), Some("rate limited"));
        assert_eq!(task.errors(), vec!["rate limited".to_string()]);
        assert_eq!(task.started_at(), None);
        assert_eq!(task.completed_at(), Some(t(1)));
    }

    #[rstest]
    #[case::completed(true)]
    #[case::failed(false)]
    fn terminal_states_are_stable(#[case] complete: bool) {
        let mut task = collection(vec![1]);
        task.start(t(1)).unwrap();
        if complete {
            task.complete(t(2)).unwrap();
        } else {
            task.fail(t(2), ErrorStage::Collection, "boom").unwrap();
        }
        let status = task.status();

        assert!(task.start(t(3)).is_err());
        assert!(task.complete(t(3)).is_err());
        assert!(task.fail(t(3), ErrorStage::Collection, "again").is_err());
        assert_eq!(task.status(), status);
        assert_eq!(task.completed_at(), Some(t(2)));
    }

    #[test]
    fn errors_are_ordered_by_stage() {
        let parsed = ParsedFile {
            entries: vec![],
            errors: vec!["line 1: bad".into()],
        };
        let mut task = Task::new_import(TaskId::from_ulid(Ulid::new()), t(0), &parsed);
        task.record_error(ErrorStage::Collection, "post 9: timeout");
        task.record_error(ErrorStage::Validation, "batch 1: network");

        assert_eq!(
            task.errors(),
            vec!["line 1: bad", "batch 1: network", "post 9: timeout"]
        );
        assert_eq!(task.counters().invalid, 1);
        assert_eq!(task.counters().total_candidates, 1);
    }

    #[test]
    fn advance_never_passes_known_total() {
        let mut counter = PhaseCounter::known(3);
        counter.advance(5);
        assert_eq!(counter.processed, 3);

        let mut open = PhaseCounter::unknown();
        open.advance(5);
        open.set_total(4);
        assert_eq!(open.processed, 4);
    }
}
