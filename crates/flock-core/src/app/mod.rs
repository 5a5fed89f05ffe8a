//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: collaborator のワイヤリング
//! - **FlockService**: 投入・状態確認・キャンセルの入口
//! - **ImportPipeline**: resolve → validate → dedup → persist
//! - **CollectionOrchestrator**: 投稿・コメントの並行収集
//! - **TaskLifecycle**: 状態遷移とスナップショット保存
//! - **ProgressCalculator**: カウンタ → パーセンテージ
//! - **RetentionSweeper**: 期限切れタスクの削除

pub mod builder;
pub mod dedup;
pub mod import;
pub mod lifecycle;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod retention;
pub mod service;
pub mod status;
pub mod validator;

// 主要な型を再エクスポート
pub use self::builder::{AppBuilder, BuildError};
pub use self::dedup::DedupFilter;
pub use self::import::ImportPipeline;
pub use self::lifecycle::TaskLifecycle;
pub use self::orchestrator::{CollectionLimits, CollectionOrchestrator};
pub use self::progress::{PHASE_WEIGHTS, Phase, PhaseDetail, Progress, ProgressCalculator};
pub use self::resolver::{ResolvedKeys, key_for, resolve_keys};
pub use self::retention::{RetentionSweeper, SweeperHandle};
pub use self::service::FlockService;
pub use self::status::{ProgressView, StatusLookup, StatusView, SubmitReceipt};
pub use self::validator::{BatchObserver, BatchValidator, ValidationReport};
