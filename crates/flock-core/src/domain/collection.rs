//! Collected content and the per-community collection unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommentId, CommunityId, PostId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub community_id: CommunityId,
    pub text: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub comments_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub community_id: CommunityId,
    pub text: String,
    pub published_at: DateTime<Utc>,
}

/// One community being drained for posts and comments.
///
/// Owned by the worker draining it; folded into the task counters when done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionUnit {
    pub task_id: TaskId,
    pub community_id: CommunityId,
    pub posts_fetched: u64,
    pub comments_fetched: u64,
    pub per_item_errors: Vec<String>,
}

impl CollectionUnit {
    pub fn new(task_id: TaskId, community_id: CommunityId) -> Self {
        Self {
            task_id,
            community_id,
            posts_fetched: 0,
            comments_fetched: 0,
            per_item_errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.per_item_errors.push(message.into());
    }
}
