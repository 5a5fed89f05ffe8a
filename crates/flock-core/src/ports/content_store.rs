//! ContentStore port - 投稿・コメントの逐次保存
//!
//! The orchestrator writes as it goes, so whatever was collected before a
//! later failure stays persisted.

use async_trait::async_trait;

use crate::domain::errors::StoreError;
use crate::domain::{Comment, Post, TaskId};

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn save_posts(&self, task_id: TaskId, posts: &[Post]) -> Result<usize, StoreError>;

    async fn save_comments(
        &self,
        task_id: TaskId,
        comments: &[Comment],
    ) -> Result<usize, StoreError>;
}
