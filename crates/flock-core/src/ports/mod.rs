//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部コラボレーター（ディレクトリ API、投稿 API、ストレージ）
//! へのインターフェースで、パイプラインはこれらにだけ依存します。

pub mod clock;
pub mod community_store;
pub mod content_source;
pub mod content_store;
pub mod directory;
pub mod entry_parser;
pub mod id_generator;
pub mod rate_limiter;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::community_store::{CommunityStore, Page, PageFilter, StoredCommunity};
pub use self::content_source::ContentSource;
pub use self::content_store::ContentStore;
pub use self::directory::DirectoryClient;
pub use self::entry_parser::{EncodingHint, EntryParser};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::rate_limiter::{FixedDelayLimiter, NoDelay, RateLimiter};
pub use self::task_store::TaskStore;
