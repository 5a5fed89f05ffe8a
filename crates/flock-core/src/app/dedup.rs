//! Dedup filter: mark matched candidates as new or duplicate.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::{CandidateRecord, Community, StoreError};
use crate::ports::CommunityStore;

pub struct DedupFilter {
    store: Arc<dyn CommunityStore>,
}

impl DedupFilter {
    pub fn new(store: Arc<dyn CommunityStore>) -> Self {
        Self { store }
    }

    /// Self-dedups on canonical id first, then asks storage once per
    /// remaining id, one call at a time.
    ///
    /// Matched candidates that repeat an id, or whose id is already stored,
    /// are marked `Duplicate`. The first appearances of unknown ids are
    /// returned in input order.
    pub async fn split(&self, candidates: &mut [CandidateRecord]) -> Result<Vec<Community>, StoreError> {
        let mut seen = HashSet::with_capacity(candidates.len());
        let mut to_persist = Vec::new();

        for candidate in candidates.iter_mut() {
            let Some(community) = candidate.matched() else {
                continue;
            };
            let id = community.id;

            if !seen.insert(id) {
                debug!(community_id = id, key = %candidate.key, "repeated in directory response");
                candidate.mark_duplicate();
                continue;
            }

            if self.store.exists(id).await? {
                debug!(community_id = id, "already stored");
                candidate.mark_duplicate();
            } else {
                to_persist.push(community.clone());
            }
        }

        Ok(to_persist)
    }
}
