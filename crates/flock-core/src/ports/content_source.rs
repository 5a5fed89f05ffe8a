//! ContentSource port - 投稿・コメントの取得元

use async_trait::async_trait;

use crate::domain::errors::SourceError;
use crate::domain::{Comment, CommunityId, Post, PostId};

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Most recent posts of a community, newest first, at most `limit`.
    async fn fetch_posts(
        &self,
        community_id: CommunityId,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError>;

    /// One page of comments for a post, oldest first.
    async fn fetch_comments(
        &self,
        community_id: CommunityId,
        post_id: PostId,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Comment>, SourceError>;
}
