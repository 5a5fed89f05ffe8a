//! ImportPipeline - resolve → validate → dedup → persist
//!
//! # フロー
//! 1. 解析済みエントリから lookup key を作る（リクエスト内の重複はここで数える）
//! 2. BatchValidator でバッチ検証（各バッチ後に groups 進捗を保存）
//! 3. DedupFilter で新規 / 既存に分ける
//! 4. 新規分だけ `create_many` で 1 回保存
//! 5. 件数を数え直して completed
//!
//! A rate-limit abort fails the task before step 3, so nothing from a
//! partially validated upload is persisted.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::app::dedup::DedupFilter;
use crate::app::lifecycle::TaskLifecycle;
use crate::app::resolver::resolve_keys;
use crate::app::validator::{BatchObserver, BatchValidator};
use crate::domain::{ErrorStage, FlockError, ParsedEntry, Task, TaskStatus};
use crate::ports::CommunityStore;

/// Writes groups progress back after every directory batch.
struct SnapshotObserver<'a> {
    lifecycle: &'a TaskLifecycle,
    task: Mutex<Task>,
}

#[async_trait]
impl BatchObserver for SnapshotObserver<'_> {
    async fn batch_done(&self, batch_index: usize, processed_keys: usize) {
        let mut task = self.task.lock().await;
        let groups = &mut task.counters_mut().groups;
        groups.advance((processed_keys as u64).saturating_sub(groups.processed));

        // progress is best effort; the final save still reports failures
        if let Err(e) = self.lifecycle.save(&task).await {
            warn!(task_id = %task.id(), batch = batch_index + 1, error = %e, "progress snapshot not saved");
        }
    }
}

pub struct ImportPipeline {
    validator: BatchValidator,
    dedup: DedupFilter,
    communities: Arc<dyn CommunityStore>,
    lifecycle: Arc<TaskLifecycle>,
}

impl ImportPipeline {
    pub fn new(
        validator: BatchValidator,
        communities: Arc<dyn CommunityStore>,
        lifecycle: Arc<TaskLifecycle>,
    ) -> Self {
        Self {
            validator,
            dedup: DedupFilter::new(communities.clone()),
            communities,
            lifecycle,
        }
    }

    /// Drives an import task to a terminal state.
    ///
    /// A rate limit ends as a `failed` task, not an `Err`. `Err` is left for
    /// storage failures, which the caller turns into `failed`.
    pub async fn run(&self, mut task: Task, entries: Vec<ParsedEntry>) -> Result<Task, FlockError> {
        if task.status() == TaskStatus::Pending {
            self.lifecycle.start(&mut task).await?;
        }

        let resolved = resolve_keys(&entries);
        {
            let counters = task.counters_mut();
            counters.duplicates += resolved.repeated as u64;
            counters.invalid += resolved.keyless as u64;
            counters.groups.set_total(resolved.keys.len() as u64);
        }
        for _ in 0..resolved.keyless {
            task.record_error(ErrorStage::Validation, "entry has neither an id nor a name");
        }

        if resolved.is_empty() {
            info!(task_id = %task.id(), "nothing to validate");
            self.lifecycle.complete(&mut task).await?;
            return Ok(task);
        }
        self.lifecycle.save(&task).await?;

        let observer = SnapshotObserver {
            lifecycle: &self.lifecycle,
            task: Mutex::new(task),
        };
        let validated = self.validator.validate(&resolved.keys, &observer).await;
        let mut task = observer.task.into_inner();

        let report = match validated {
            Ok(report) => report,
            Err(FlockError::RateLimited(reason)) => {
                self.lifecycle
                    .fail(&mut task, ErrorStage::Validation, reason)
                    .await?;
                return Ok(task);
            }
            Err(e) => return Err(e),
        };

        for message in &report.batch_errors {
            task.record_error(ErrorStage::Validation, message.clone());
        }
        for candidate in &report.candidates {
            if candidate.is_not_found() {
                task.record_error(
                    ErrorStage::Validation,
                    format!("{}: not found in directory", candidate.key),
                );
            }
        }

        let not_found = report.not_found();
        let mut candidates = report.candidates;
        let to_persist = self.dedup.split(&mut candidates).await?;
        let created = if to_persist.is_empty() {
            0
        } else {
            self.communities.create_many(&to_persist, task.id()).await?
        };

        let counters = task.counters_mut();
        counters.invalid += not_found as u64;
        counters.duplicates += candidates.iter().filter(|c| c.is_duplicate()).count() as u64;
        // anything another import stored first counts as a duplicate
        counters.valid += created as u64;
        counters.duplicates += (to_persist.len() - created.min(to_persist.len())) as u64;
        task.set_imported(to_persist.iter().map(|c| c.id).collect());

        self.lifecycle.complete(&mut task).await?;
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::progress::ProgressCalculator;
    use crate::domain::{Community, CommunityId, DirectoryError, LookupKey, ParsedFile};
    use crate::impls::{InMemoryCommunityStore, InMemoryTaskStore};
    use crate::ports::{DirectoryClient, NoDelay, SystemClock, UlidGenerator};
    use ulid::Ulid;

    fn community(id: CommunityId, screen_name: &str) -> Community {
        Community {
            id,
            screen_name: screen_name.to_string(),
            name: screen_name.to_uppercase(),
            members_count: Some(10),
            is_closed: false,
        }
    }

    /// Knows a fixed set of communities; optionally rate limits from a
    /// given call onwards.
    struct Directory {
        known: Vec<Community>,
        rate_limit_on_call: Option<usize>,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl Directory {
        fn new(known: Vec<Community>) -> Self {
            Self {
                known,
                rate_limit_on_call: None,
                calls: Default::default(),
            }
        }
    }

    #[async_trait]
    impl DirectoryClient for Directory {
        fn max_batch_size(&self) -> usize {
            2
        }

        async fn lookup(&self, keys: &[LookupKey]) -> Result<Vec<Community>, DirectoryError> {
            let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if self.rate_limit_on_call.is_some_and(|n| call >= n) {
                return Err(DirectoryError::RateLimited("too many requests per second".into()));
            }
            Ok(self
                .known
                .iter()
                .filter(|c| keys.iter().any(|k| k.matches(c)))
                .cloned()
                .collect())
        }
    }

    struct Harness {
        pipeline: ImportPipeline,
        lifecycle: Arc<TaskLifecycle>,
        communities: Arc<InMemoryCommunityStore>,
    }

    async fn harness(directory: Directory, existing: &[Community]) -> Harness {
        let clock = Arc::new(SystemClock);
        let lifecycle = Arc::new(TaskLifecycle::new(
            Arc::new(InMemoryTaskStore::new()),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
        ));
        let communities = Arc::new(InMemoryCommunityStore::new(clock));
        if !existing.is_empty() {
            communities
                .create_many(existing, crate::domain::TaskId::from_ulid(Ulid::new()))
                .await
                .unwrap();
        }
        let validator = BatchValidator::new(Arc::new(directory), Arc::new(NoDelay), 500);
        Harness {
            pipeline: ImportPipeline::new(validator, communities.clone(), lifecycle.clone()),
            lifecycle,
            communities,
        }
    }

    async fn import(h: &Harness, parsed: ParsedFile) -> Task {
        let task = h.lifecycle.create_import(&parsed).await.unwrap();
        h.pipeline.run(task, parsed.entries).await.unwrap()
    }

    fn assert_accounted(task: &Task) {
        let c = task.counters();
        assert_eq!(c.valid + c.duplicates + c.invalid, c.total_candidates, "{c:?}");
    }

    #[tokio::test]
    async fn match_missing_and_existing() {
        let h = harness(
            Directory::new(vec![community(111, "one"), community(222, "two")]),
            &[community(222, "two")],
        )
        .await;
        let parsed = ParsedFile {
            entries: vec![
                ParsedEntry::with_id(111),
                ParsedEntry::with_name("abc"),
                ParsedEntry::with_id(222),
            ],
            errors: vec![],
        };

        let task = import(&h, parsed).await;

        assert_eq!(task.status(), TaskStatus::Completed);
        let c = task.counters();
        assert_eq!((c.valid, c.duplicates, c.invalid), (1, 1, 1));
        assert_eq!(ProgressCalculator::default().calculate(c).percentage, 100);
        assert_eq!(task.imported(), &[111]);
        assert_eq!(task.errors(), vec!["abc: not found in directory"]);
        assert!(h.communities.get_by_id(111).await.unwrap().is_some());
        assert_accounted(&task);
    }

    #[tokio::test]
    async fn every_entry_is_accounted_for() {
        let h = harness(
            Directory::new(vec![community(1, "alpha"), community(2, "beta"), community(3, "gamma")]),
            &[community(3, "gamma")],
        )
        .await;
        let parsed = ParsedFile {
            entries: vec![
                ParsedEntry::with_id(1),
                ParsedEntry::with_name("ALPHA"),
                ParsedEntry::with_id(1),
                ParsedEntry::with_name("beta"),
                ParsedEntry::with_id(3),
                ParsedEntry::with_id(404),
                ParsedEntry::default(),
            ],
            errors: vec!["line 9: empty identifier".into()],
        };

        let task = import(&h, parsed).await;

        let c = task.counters();
        assert_eq!(c.total_candidates, 8);
        // 1 and beta are new
        assert_eq!(c.valid, 2);
        // second `1`, ALPHA aliasing 1, stored gamma
        assert_eq!(c.duplicates, 3);
        // parse error, key-less entry, 404
        assert_eq!(c.invalid, 3);
        assert_accounted(&task);
    }

    #[tokio::test]
    async fn rate_limit_fails_task_and_persists_nothing() {
        let mut directory = Directory::new((1..=6).map(|id| community(id, "c")).collect());
        directory.rate_limit_on_call = Some(2);
        let h = harness(directory, &[]).await;
        let parsed = ParsedFile {
            entries: (1..=6).map(ParsedEntry::with_id).collect(),
            errors: vec![],
        };

        let task = import(&h, parsed).await;

        assert_eq!(task.status(), TaskStatus::Failed);
        assert!(task.failure_reason().unwrap().contains("rate limit"));
        assert!(h.communities.get_by_id(1).await.unwrap().is_none());
        // first batch progress was saved before the abort
        assert_eq!(task.counters().groups.processed, 2);
        let stored = h.lifecycle.get(task.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn nothing_to_validate_completes_at_100() {
        let h = harness(Directory::new(vec![]), &[]).await;
        let parsed = ParsedFile {
            entries: vec![],
            errors: vec!["line 1: bad".into(), "line 2: bad".into()],
        };

        let task = import(&h, parsed).await;

        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.counters().invalid, 2);
        assert_eq!(ProgressCalculator::default().calculate(task.counters()).percentage, 100);
        assert_accounted(&task);
    }
}
