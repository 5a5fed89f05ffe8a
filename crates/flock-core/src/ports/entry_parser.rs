//! EntryParser port - アップロードされたファイルの解析

use serde::{Deserialize, Serialize};

use crate::domain::ParsedFile;

/// Encoding hint supplied with an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingHint {
    #[default]
    Utf8,
    /// UTF-8 with invalid sequences replaced instead of rejected.
    Utf8Lossy,
    Latin1,
}

/// Turns an uploaded blob into entries plus per-line errors.
///
/// Never fails as a whole: unreadable lines become entries in `errors`.
pub trait EntryParser: Send + Sync {
    fn parse(&self, bytes: &[u8], encoding: EncodingHint) -> ParsedFile;
}
