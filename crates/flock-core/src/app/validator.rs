//! BatchValidator - 外部ディレクトリ API によるバッチ検証
//!
//! # フロー
//! 1. keys を `batch_size` ごとに分割（順序維持）
//! 2. 2 バッチ目以降は RateLimiter で待つ
//! 3. 各バッチで DirectoryClient::lookup を 1 回だけ呼ぶ
//! 4. 応答をまとめ、応答に無い key は NotFound
//!
//! A rate-limit response aborts the whole run before anything is persisted.
//! Any other batch failure is logged and its keys fall through to NotFound;
//! partial outages therefore reduce coverage without failing the task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::errors::DirectoryError;
use crate::domain::{CandidateRecord, Community, CommunityId, FlockError, LookupKey, Resolution};
use crate::ports::{DirectoryClient, RateLimiter};

/// Notified after every batch, so the caller can publish progress.
#[async_trait]
pub trait BatchObserver: Send + Sync {
    async fn batch_done(&self, batch_index: usize, processed_keys: usize);
}

#[async_trait]
impl BatchObserver for () {
    async fn batch_done(&self, _batch_index: usize, _processed_keys: usize) {}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// One record per unique key, in input order.
    pub candidates: Vec<CandidateRecord>,
    /// Non-fatal batch failures.
    pub batch_errors: Vec<String>,
    pub calls: usize,
}

impl ValidationReport {
    pub fn not_found(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_not_found()).count()
    }
}

pub struct BatchValidator {
    directory: Arc<dyn DirectoryClient>,
    limiter: Arc<dyn RateLimiter>,
    batch_size: usize,
}

impl BatchValidator {
    /// `batch_size` is clamped to the directory's own limit.
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        limiter: Arc<dyn RateLimiter>,
        batch_size: usize,
    ) -> Self {
        let batch_size = batch_size.min(directory.max_batch_size()).max(1);
        Self {
            directory,
            limiter,
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn validate(
        &self,
        keys: &[LookupKey],
        observer: &dyn BatchObserver,
    ) -> Result<ValidationReport, FlockError> {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique: Vec<LookupKey> = keys
            .iter()
            .filter(|key| seen.insert(*key))
            .cloned()
            .collect();

        let total_batches = unique.len().div_ceil(self.batch_size);
        let mut by_id: HashMap<CommunityId, Community> = HashMap::new();
        let mut by_name: HashMap<String, CommunityId> = HashMap::new();
        let mut report = ValidationReport::default();
        let mut processed = 0;

        for (index, batch) in unique.chunks(self.batch_size).enumerate() {
            if index > 0 {
                self.limiter.wait().await;
            }

            report.calls += 1;
            match self.directory.lookup(batch).await {
                Ok(found) => {
                    debug!(batch = index + 1, keys = batch.len(), found = found.len(), "directory batch answered");
                    for community in found {
                        by_name
                            .entry(community.screen_name.to_lowercase())
                            .or_insert(community.id);
                        by_id.entry(community.id).or_insert(community);
                    }
                }
                Err(DirectoryError::RateLimited(message)) => {
                    warn!(batch = index + 1, total_batches, %message, "directory rate limit, aborting validation");
                    return Err(FlockError::RateLimited(format!(
                        "directory API rate limit hit on batch {}/{}: {message}",
                        index + 1,
                        total_batches
                    )));
                }
                Err(err) => {
                    warn!(batch = index + 1, total_batches, error = %err, "directory batch failed, keys treated as not found");
                    report.batch_errors.push(format!(
                        "batch {}/{} ({} keys) treated as not found: {err}",
                        index + 1,
                        total_batches,
                        batch.len()
                    ));
                }
            }

            processed += batch.len();
            observer.batch_done(index, processed).await;
        }

        report.candidates = unique.into_iter().map(CandidateRecord::new).collect();
        for candidate in &mut report.candidates {
            let hit = match &candidate.key {
                LookupKey::Id(id) => by_id.get(id),
                LookupKey::Name(name) => by_name
                    .get(&name.to_lowercase())
                    .and_then(|id| by_id.get(id)),
            };
            candidate.resolution = match hit {
                Some(community) => Resolution::Matched(community.clone()),
                None => Resolution::NotFound,
            };
        }

        Ok(report)
    }
}
