//! CollectionOrchestrator - コミュニティ単位の投稿・コメント収集
//!
//! # フロー
//! 1. 対象コミュニティを最大 `concurrency` 件まで並行に処理
//! 2. コミュニティ内: 最新の投稿を取得 → 投稿ごとにコメントを順番にページング
//! 3. 取得した投稿・コメントはその場で保存（タスク終了まで溜めない）
//! 4. ワーカーは進捗を channel に流し、受信側だけが Task を更新・保存する
//!
//! A failed comment page skips that post; a failed post fetch skips that
//! community. The task fails only when nothing was collected anywhere and
//! at least one error was recorded.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::lifecycle::TaskLifecycle;
use crate::config::PipelineConfig;
use crate::domain::{
    CollectionUnit, CommunityId, ErrorStage, FlockError, Post, Task, TaskId, TaskStatus,
};
use crate::ports::{ContentSource, ContentStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionLimits {
    pub concurrency: usize,
    pub posts_per_community: usize,
    pub comments_page_size: usize,
    pub max_comment_pages: usize,
}

impl From<&PipelineConfig> for CollectionLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            concurrency: config.collection_concurrency.max(1),
            posts_per_community: config.posts_per_community,
            comments_page_size: config.comments_page_size.max(1),
            max_comment_pages: config.max_comment_pages,
        }
    }
}

impl Default for CollectionLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

/// Progress reported by a community worker.
#[derive(Debug)]
enum UnitEvent {
    /// Sent exactly once per community, zero when its posts were unavailable.
    PostsFound(u64),
    CommentsSaved(u64),
    PostFinished,
    UnitFinished(CollectionUnit),
}

/// The receiving side hung up; the worker stops.
struct Closed;

async fn emit(tx: &mpsc::Sender<UnitEvent>, event: UnitEvent) -> Result<(), Closed> {
    tx.send(event).await.map_err(|_| Closed)
}

/// Folds worker events into the task counters.
struct Tally {
    targets: u64,
    reported: u64,
    posts_found: u64,
}

impl Tally {
    fn new(targets: usize) -> Self {
        Self {
            targets: targets as u64,
            reported: 0,
            posts_found: 0,
        }
    }

    fn apply(&mut self, task: &mut Task, event: UnitEvent) {
        let counters = task.counters_mut();
        match event {
            UnitEvent::PostsFound(n) => {
                self.reported += 1;
                self.posts_found += n;
                // posts total is only known once every community answered
                if self.reported == self.targets {
                    counters.posts.set_total(self.posts_found);
                }
            }
            UnitEvent::CommentsSaved(n) => counters.comments.advance(n),
            UnitEvent::PostFinished => counters.posts.advance(1),
            UnitEvent::UnitFinished(unit) => {
                counters.groups.advance(1);
                info!(
                    task_id = %unit.task_id,
                    community_id = unit.community_id,
                    posts = unit.posts_fetched,
                    comments = unit.comments_fetched,
                    errors = unit.per_item_errors.len(),
                    "community drained"
                );
                for message in unit.per_item_errors {
                    task.record_error(ErrorStage::Collection, message);
                }
            }
        }
    }
}

pub struct CollectionOrchestrator {
    source: Arc<dyn ContentSource>,
    content: Arc<dyn ContentStore>,
    lifecycle: Arc<TaskLifecycle>,
    limits: CollectionLimits,
}

impl CollectionOrchestrator {
    pub fn new(
        source: Arc<dyn ContentSource>,
        content: Arc<dyn ContentStore>,
        lifecycle: Arc<TaskLifecycle>,
        limits: CollectionLimits,
    ) -> Self {
        Self {
            source,
            content,
            lifecycle,
            limits,
        }
    }

    /// Drives a collection task to a terminal state.
    ///
    /// `Err` means the task store failed; source failures end up in the
    /// task's errors instead.
    pub async fn run(&self, mut task: Task) -> Result<Task, FlockError> {
        if task.status() == TaskStatus::Pending {
            self.lifecycle.start(&mut task).await?;
        }

        let task_id = task.id();
        let targets = task.targets().to_vec();
        let concurrency = self.limits.concurrency.max(1);
        let mut tally = Tally::new(targets.len());
        let (tx, rx) = mpsc::channel(concurrency * 4);

        let produce = async move {
            stream::iter(targets)
                .map(|community_id| self.drain_community(task_id, community_id, tx.clone()))
                .buffer_unordered(concurrency)
                .for_each(|_| async {})
                .await;
        };

        // rx moves in: if a save fails, dropping it stops the workers
        let consume = async {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                tally.apply(&mut task, event);
                self.lifecycle.save(&task).await?;
            }
            Ok::<(), FlockError>(())
        };

        let ((), consumed) = tokio::join!(produce, consume);
        consumed?;

        if tally.posts_found == 0 && task.error_count() > 0 {
            let reason = format!(
                "no posts collected from {} communities ({} errors)",
                task.targets().len(),
                task.error_count()
            );
            self.lifecycle
                .fail(&mut task, ErrorStage::Collection, reason)
                .await?;
        } else {
            self.lifecycle.complete(&mut task).await?;
        }
        Ok(task)
    }

    async fn drain_community(
        &self,
        task_id: TaskId,
        community_id: CommunityId,
        tx: mpsc::Sender<UnitEvent>,
    ) -> Result<(), Closed> {
        let mut unit = CollectionUnit::new(task_id, community_id);

        match self.fetch_and_save_posts(task_id, community_id).await {
            Ok(posts) => {
                unit.posts_fetched = posts.len() as u64;
                emit(&tx, UnitEvent::PostsFound(unit.posts_fetched)).await?;
                for post in &posts {
                    self.drain_comments(&mut unit, post, &tx).await?;
                    emit(&tx, UnitEvent::PostFinished).await?;
                }
            }
            Err(message) => {
                warn!(task_id = %task_id, community_id, %message, "community skipped");
                unit.record_error(message);
                emit(&tx, UnitEvent::PostsFound(0)).await?;
            }
        }

        emit(&tx, UnitEvent::UnitFinished(unit)).await
    }

    async fn fetch_and_save_posts(
        &self,
        task_id: TaskId,
        community_id: CommunityId,
    ) -> Result<Vec<Post>, String> {
        let posts = self
            .source
            .fetch_posts(community_id, self.limits.posts_per_community)
            .await
            .map_err(|e| format!("community {community_id}: posts unavailable: {e}"))?;
        self.content
            .save_posts(task_id, &posts)
            .await
            .map_err(|e| format!("community {community_id}: posts not saved: {e}"))?;
        Ok(posts)
    }

    /// 1 投稿分のコメントを古い順にページング。失敗したらその投稿は打ち切り。
    async fn drain_comments(
        &self,
        unit: &mut CollectionUnit,
        post: &Post,
        tx: &mpsc::Sender<UnitEvent>,
    ) -> Result<(), Closed> {
        let page_size = self.limits.comments_page_size.max(1);

        for page in 0..self.limits.max_comment_pages {
            let fetched = self
                .source
                .fetch_comments(unit.community_id, post.id, page * page_size, page_size)
                .await;
            let comments = match fetched {
                Ok(comments) => comments,
                Err(e) => {
                    warn!(task_id = %unit.task_id, community_id = unit.community_id, post_id = post.id, error = %e, "comments unavailable, post skipped");
                    unit.record_error(format!(
                        "post {} in community {}: comments unavailable: {e}",
                        post.id, unit.community_id
                    ));
                    return Ok(());
                }
            };

            if let Err(e) = self.content.save_comments(unit.task_id, &comments).await {
                unit.record_error(format!(
                    "post {} in community {}: comments not saved: {e}",
                    post.id, unit.community_id
                ));
                return Ok(());
            }

            let saved = comments.len() as u64;
            unit.comments_fetched += saved;
            if saved > 0 {
                emit(tx, UnitEvent::CommentsSaved(saved)).await?;
            }
            if comments.len() < page_size {
                debug!(post_id = post.id, pages = page + 1, "comments drained");
                return Ok(());
            }
        }

        warn!(
            task_id = %unit.task_id,
            community_id = unit.community_id,
            post_id = post.id,
            pages = self.limits.max_comment_pages,
            "comment page cap reached, remaining comments skipped"
        );
        Ok(())
    }
}
