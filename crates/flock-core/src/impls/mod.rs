//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskStore / InMemoryCommunityStore / InMemoryContentStore**: 開発用の保存先
//! - **LineEntryParser**: 1 行 1 識別子のテキスト形式
//! - **FixtureWorld**: JSON で定義したディレクトリ API と投稿 API

pub mod fixture;
pub mod inmem_community_store;
pub mod inmem_content_store;
pub mod inmem_task_store;
pub mod line_parser;

pub use self::fixture::FixtureWorld;
pub use self::inmem_community_store::InMemoryCommunityStore;
pub use self::inmem_content_store::InMemoryContentStore;
pub use self::inmem_task_store::InMemoryTaskStore;
pub use self::line_parser::LineEntryParser;
