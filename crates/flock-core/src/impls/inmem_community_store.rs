//! InMemoryCommunityStore - 開発用のコミュニティ保存先

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{Community, CommunityId, StoreError, TaskId};
use crate::ports::{Clock, CommunityStore, Page, PageFilter, StoredCommunity};

#[derive(Default)]
struct State {
    by_id: HashMap<CommunityId, StoredCommunity>,
    /// Insertion order, for stable paging.
    order: Vec<CommunityId>,
}

pub struct InMemoryCommunityStore {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    exists_calls: AtomicUsize,
}

impl InMemoryCommunityStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            clock,
            exists_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `exists` calls served so far.
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CommunityStore for InMemoryCommunityStore {
    async fn exists(&self, id: CommunityId) -> Result<bool, StoreError> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.lock().await.by_id.contains_key(&id))
    }

    /// Records whose id is already stored are skipped, not overwritten.
    async fn create_many(
        &self,
        records: &[Community],
        task_id: TaskId,
    ) -> Result<usize, StoreError> {
        let imported_at = self.clock.now();
        let mut state = self.state.lock().await;
        let mut inserted = 0;

        for community in records {
            if state.by_id.contains_key(&community.id) {
                continue;
            }
            state.order.push(community.id);
            state.by_id.insert(
                community.id,
                StoredCommunity {
                    community: community.clone(),
                    task_id,
                    imported_at,
                },
            );
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn get_by_id(&self, id: CommunityId) -> Result<Option<StoredCommunity>, StoreError> {
        Ok(self.state.lock().await.by_id.get(&id).cloned())
    }

    async fn get_page(&self, filter: &PageFilter) -> Result<Page<StoredCommunity>, StoreError> {
        let state = self.state.lock().await;
        let matching: Vec<&StoredCommunity> = state
            .order
            .iter()
            .filter_map(|id| state.by_id.get(id))
            .filter(|stored| filter.task_id.is_none_or(|task_id| stored.task_id == task_id))
            .collect();

        let total = matching.len();
        let limit = if filter.limit == 0 { total } else { filter.limit };
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(Page { items, total })
    }
}
