//! DirectoryClient port - 外部ディレクトリ API（コミュニティ検索）
//!
//! The directory answers a batch of lookup keys with the records it could
//! match. Absence from the response is the only "not found" signal.

use async_trait::async_trait;

use crate::domain::errors::DirectoryError;
use crate::domain::{Community, LookupKey};

/// DirectoryClient は外部 API のバッチ検索
///
/// # 設計原則
/// - 1 回の呼び出しは `max_batch_size()` 件まで
/// - レート制限は `DirectoryError::RateLimited` で区別する
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Hard per-call limit imposed by the external API.
    fn max_batch_size(&self) -> usize;

    /// Look up at most `max_batch_size()` keys.
    async fn lookup(&self, keys: &[LookupKey]) -> Result<Vec<Community>, DirectoryError>;
}
