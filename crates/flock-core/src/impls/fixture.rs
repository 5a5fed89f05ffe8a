//! FixtureWorld - JSON で定義した外部 API のスタンドイン
//!
//! Implements both the directory and the content-source ports from one
//! JSON document, for demos and local runs without network access:
//!
//! ```json
//! {
//!   "max_batch_size": 500,
//!   "communities": [
//!     { "id": 1, "screen_name": "rustlang", "name": "Rust",
//!       "posts": [
//!         { "id": 10, "text": "hello", "published_at": "2024-01-01T00:00:00Z",
//!           "comments": [ { "id": 100, "text": "hi", "published_at": "2024-01-01T01:00:00Z" } ] }
//!       ] }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{
    Comment, CommentId, Community, CommunityId, DirectoryError, LookupKey, Post, PostId,
    SourceError,
};
use crate::ports::{ContentSource, DirectoryClient};

fn default_max_batch_size() -> usize {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureWorld {
    #[serde(default = "default_max_batch_size")]
    max_batch_size: usize,
    #[serde(default)]
    communities: Vec<FixtureCommunity>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureCommunity {
    #[serde(flatten)]
    community: Community,
    #[serde(default)]
    posts: Vec<FixturePost>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixturePost {
    id: PostId,
    #[serde(default)]
    text: String,
    published_at: DateTime<Utc>,
    #[serde(default)]
    comments: Vec<FixtureComment>,
}

#[derive(Debug, Clone, Deserialize)]
struct FixtureComment {
    id: CommentId,
    #[serde(default)]
    text: String,
    published_at: DateTime<Utc>,
}

impl FixtureWorld {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn find(&self, community_id: CommunityId) -> Result<&FixtureCommunity, SourceError> {
        self.communities
            .iter()
            .find(|c| c.community.id == community_id)
            .ok_or_else(|| SourceError::Api {
                code: 100,
                message: format!("community {community_id} not found"),
            })
    }
}

#[async_trait]
impl DirectoryClient for FixtureWorld {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn lookup(&self, keys: &[LookupKey]) -> Result<Vec<Community>, DirectoryError> {
        if keys.len() > self.max_batch_size {
            return Err(DirectoryError::Api {
                code: 100,
                message: format!("too many ids: {} > {}", keys.len(), self.max_batch_size),
            });
        }
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.communities
                    .iter()
                    .find(|c| key.matches(&c.community))
                    .map(|c| c.community.clone())
            })
            .collect())
    }
}

#[async_trait]
impl ContentSource for FixtureWorld {
    async fn fetch_posts(
        &self,
        community_id: CommunityId,
        limit: usize,
    ) -> Result<Vec<Post>, SourceError> {
        let community = self.find(community_id)?;
        let mut posts: Vec<Post> = community
            .posts
            .iter()
            .map(|p| Post {
                id: p.id,
                community_id,
                text: p.text.clone(),
                published_at: p.published_at,
                comments_count: p.comments.len() as u64,
            })
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit);
        Ok(posts)
    }

    async fn fetch_comments(
        &self,
        community_id: CommunityId,
        post_id: PostId,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Comment>, SourceError> {
        let community = self.find(community_id)?;
        let post = community
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .ok_or_else(|| SourceError::Api {
                code: 100,
                message: format!("post {post_id} not found"),
            })?;

        let mut comments: Vec<&FixtureComment> = post.comments.iter().collect();
        comments.sort_by_key(|c| (c.published_at, c.id));
        Ok(comments
            .into_iter()
            .skip(offset)
            .take(count)
            .map(|c| Comment {
                id: c.id,
                post_id,
                community_id,
                text: c.text.clone(),
                published_at: c.published_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: &str = r#"{
        "max_batch_size": 2,
        "communities": [
            { "id": 1, "screen_name": "rustlang", "name": "Rust",
              "posts": [
                { "id": 10, "published_at": "2024-01-01T00:00:00Z",
                  "comments": [
                    { "id": 102, "published_at": "2024-01-01T03:00:00Z" },
                    { "id": 101, "published_at": "2024-01-01T01:00:00Z" },
                    { "id": 103, "published_at": "2024-01-01T05:00:00Z" }
                  ] },
                { "id": 11, "published_at": "2024-02-01T00:00:00Z" }
              ] },
            { "id": 2, "screen_name": "tokio", "name": "Tokio" }
        ]
    }"#;

    #[tokio::test]
    async fn lookup_returns_only_matches() {
        let world = FixtureWorld::from_json(WORLD).unwrap();
        let found = world
            .lookup(&[LookupKey::Name("Tokio".into()), LookupKey::Id(404)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 2);
    }

    #[tokio::test]
    async fn lookup_enforces_batch_limit() {
        let world = FixtureWorld::from_json(WORLD).unwrap();
        let keys: Vec<LookupKey> = (1..=3).map(LookupKey::Id).collect();
        assert!(matches!(
            world.lookup(&keys).await,
            Err(DirectoryError::Api { .. })
        ));
    }

    #[tokio::test]
    async fn posts_newest_first_and_comments_oldest_first() {
        let world = FixtureWorld::from_json(WORLD).unwrap();

        let posts = world.fetch_posts(1, 10).await.unwrap();
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![11, 10]);

        let page = world.fetch_comments(1, 10, 1, 5).await.unwrap();
        assert_eq!(page.iter().map(|c| c.id).collect::<Vec<_>>(), vec![102, 103]);
    }

    #[tokio::test]
    async fn unknown_community_is_a_source_error() {
        let world = FixtureWorld::from_json(WORLD).unwrap();
        assert!(world.fetch_posts(9, 10).await.is_err());
    }
}
