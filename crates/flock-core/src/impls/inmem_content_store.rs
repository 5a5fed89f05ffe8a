//! InMemoryContentStore - 投稿・コメントの保存先（開発用）

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Comment, CommentId, CommunityId, Post, PostId, StoreError, TaskId};
use crate::ports::ContentStore;

#[derive(Default)]
struct State {
    posts: HashMap<(CommunityId, PostId), (TaskId, Post)>,
    comments: HashMap<(CommunityId, PostId, CommentId), (TaskId, Comment)>,
}

/// Keyed by external ids, so re-collecting the same content overwrites it.
#[derive(Default)]
pub struct InMemoryContentStore {
    state: Mutex<State>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn post_count(&self) -> usize {
        self.state.lock().await.posts.len()
    }

    pub async fn comment_count(&self) -> usize {
        self.state.lock().await.comments.len()
    }

    /// Comments of one post, oldest first.
    pub async fn comments_for(&self, community_id: CommunityId, post_id: PostId) -> Vec<Comment> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .map(|(_, comment)| comment)
            .filter(|c| c.community_id == community_id && c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.published_at, c.id));
        comments
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn save_posts(&self, task_id: TaskId, posts: &[Post]) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        for post in posts {
            state
                .posts
                .insert((post.community_id, post.id), (task_id, post.clone()));
        }
        Ok(posts.len())
    }

    async fn save_comments(
        &self,
        task_id: TaskId,
        comments: &[Comment],
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        for comment in comments {
            state.comments.insert(
                (comment.community_id, comment.post_id, comment.id),
                (task_id, comment.clone()),
            );
        }
        Ok(comments.len())
    }
}
