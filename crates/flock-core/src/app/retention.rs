//! RetentionSweeper - 期限切れタスクの削除
//!
//! # フロー
//! 1. 定期的に completed_at < now - retention の terminal タスクを検索
//! 2. 1 件ずつ削除
//!
//! Non-terminal tasks are never touched, however old they are.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::StoreError;
use crate::ports::{Clock, TaskStore};

pub struct RetentionSweeper {
    tasks: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(tasks: Arc<dyn TaskStore>, clock: Arc<dyn Clock>, retention: Duration) -> Self {
        Self {
            tasks,
            clock,
            retention,
        }
    }

    /// One pass. Returns how many tasks were deleted.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let Ok(window) = chrono::Duration::from_std(self.retention) else {
            return Ok(0);
        };
        let Some(cutoff) = self.clock.now().checked_sub_signed(window) else {
            return Ok(0);
        };

        let mut deleted = 0;
        for id in self.tasks.list_expired(cutoff).await? {
            if self.tasks.delete(id).await? {
                debug!(task_id = %id, "expired task deleted");
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(deleted, %cutoff, "retention sweep");
        }
        Ok(deleted)
    }

    /// Sweep every `interval` until shut down.
    pub fn spawn(self, interval: Duration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // sender dropped: same as shutdown
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    _ = ticker.tick() => {}
                }
                if let Err(e) = self.sweep_once().await {
                    warn!(error = %e, "retention sweep failed");
                }
            }
        });

        SweeperHandle { shutdown_tx, join }
    }
}

/// Dropping `shutdown_tx` (or calling `shutdown_and_join`) stops the loop.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown_and_join(self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorStage, Task, TaskId, TaskStatus};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::FixedClock;
    use chrono::{DateTime, TimeZone, Utc};
    use ulid::Ulid;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    async fn seed(store: &InMemoryTaskStore, finished_on: Option<u32>, fail: bool) -> TaskId {
        let mut task = Task::new_collection(TaskId::from_ulid(Ulid::new()), at(1), vec![1]);
        if let Some(day) = finished_on {
            task.start(at(day)).unwrap();
            if fail {
                task.fail(at(day), ErrorStage::Collection, "boom").unwrap();
            } else {
                task.complete(at(day)).unwrap();
            }
        }
        store.save(&task).await.unwrap();
        task.id()
    }

    #[tokio::test]
    async fn deletes_only_old_terminal_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        let old_done = seed(&store, Some(2), false).await;
        let old_failed = seed(&store, Some(3), true).await;
        let recent = seed(&store, Some(20), false).await;
        let stuck = seed(&store, None, false).await;

        let clock = Arc::new(FixedClock::new(at(25)));
        let sweeper = RetentionSweeper::new(store.clone(), clock, 7 * DAY);

        assert_eq!(sweeper.sweep_once().await.unwrap(), 2);
        assert!(store.get(old_done).await.unwrap().is_none());
        assert!(store.get(old_failed).await.unwrap().is_none());
        assert!(store.get(recent).await.unwrap().is_some());
        let stuck = store.get(stuck).await.unwrap().unwrap();
        assert_eq!(stuck.status(), TaskStatus::Pending);

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn oversized_window_deletes_nothing() {
        let store = Arc::new(InMemoryTaskStore::new());
        seed(&store, Some(2), false).await;
        let sweeper = RetentionSweeper::new(store.clone(), Arc::new(FixedClock::new(at(25))), Duration::MAX);

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_sweeps_until_shutdown() {
        let store = Arc::new(InMemoryTaskStore::new());
        seed(&store, Some(2), false).await;
        let clock = Arc::new(FixedClock::new(at(25)));

        let handle = RetentionSweeper::new(store.clone(), clock, DAY).spawn(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.len().await, 0);

        handle.shutdown_and_join().await;
    }
}
