//! CommunityStore port - 検証済みコミュニティの永続化

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::StoreError;
use crate::domain::{Community, CommunityId, TaskId};

/// A community as stored, with the task that imported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCommunity {
    pub community: Community,
    pub task_id: TaskId,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFilter {
    pub task_id: Option<TaskId>,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Existence check keyed on the canonical id.
    async fn exists(&self, id: CommunityId) -> Result<bool, StoreError>;

    /// Insert new records; returns how many were inserted.
    async fn create_many(
        &self,
        records: &[Community],
        task_id: TaskId,
    ) -> Result<usize, StoreError>;

    async fn get_by_id(&self, id: CommunityId) -> Result<Option<StoredCommunity>, StoreError>;

    async fn get_page(&self, filter: &PageFilter) -> Result<Page<StoredCommunity>, StoreError>;
}
