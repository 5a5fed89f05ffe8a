//! flock-core
//!
//! Core building blocks for the Flock collection pipeline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task state machine, candidates, collected content, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, DirectoryClient, ContentSource, RateLimiter, など）
//! - **app**: アプリケーションロジック（builder, service, import, orchestrator, progress, など）
//! - **impls**: 実装（in-memory ストア、fixture、行形式パーサ）
//! - **config**: パイプライン設定（`FLOCK_*` 環境変数）
//! - **observability**: ステータス別の件数

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;

pub use app::{AppBuilder, FlockService, StatusLookup};
pub use config::PipelineConfig;
pub use domain::{FlockError, TaskId};
