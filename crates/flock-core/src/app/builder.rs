//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 開発用の既定値（in-memory ストア、SystemClock、ULID）

use std::sync::Arc;

use crate::app::import::ImportPipeline;
use crate::app::lifecycle::TaskLifecycle;
use crate::app::orchestrator::{CollectionLimits, CollectionOrchestrator};
use crate::app::progress::ProgressCalculator;
use crate::app::service::{FlockService, Inner};
use crate::app::validator::BatchValidator;
use crate::config::PipelineConfig;
use crate::impls::{InMemoryCommunityStore, InMemoryContentStore, InMemoryTaskStore, LineEntryParser};
use crate::ports::{
    Clock, CommunityStore, ContentSource, ContentStore, DirectoryClient, EntryParser,
    FixedDelayLimiter, IdGenerator, RateLimiter, SystemClock, TaskStore, UlidGenerator,
};

/// AppBuilder は FlockService を構築
///
/// # 使用例
/// ```ignore
/// let service = AppBuilder::new()
///     .config(PipelineConfig::from_env()?)
///     .directory(Arc::new(world.clone()))
///     .content_source(Arc::new(world))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - 外部 API 側（directory, content source）には既定値が無い
/// - build() 時に未設定の collaborator を全部まとめて BuildError で返す
/// - それ以外（ストア、clock、parser、rate limiter）は開発用の既定値
#[derive(Default)]
pub struct AppBuilder {
    config: PipelineConfig,
    directory: Option<Arc<dyn DirectoryClient>>,
    source: Option<Arc<dyn ContentSource>>,
    parser: Option<Arc<dyn EntryParser>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    tasks: Option<Arc<dyn TaskStore>>,
    communities: Option<Arc<dyn CommunityStore>>,
    content: Option<Arc<dyn ContentStore>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing collaborators: {0:?}. These must be set before build().")]
    MissingCollaborators(Vec<&'static str>),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn directory(mut self, directory: Arc<dyn DirectoryClient>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn content_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn entry_parser(mut self, parser: Arc<dyn EntryParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replaces the fixed inter-batch delay from the config.
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn task_store(mut self, tasks: Arc<dyn TaskStore>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn community_store(mut self, communities: Arc<dyn CommunityStore>) -> Self {
        self.communities = Some(communities);
        self
    }

    pub fn content_store(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    /// # 検証
    /// - directory と content_source が設定済みかチェック
    /// - 不足があれば BuildError::MissingCollaborators を返す
    pub fn build(self) -> Result<FlockService, BuildError> {
        let (directory, source) = match (self.directory, self.source) {
            (Some(directory), Some(source)) => (directory, source),
            (directory, source) => {
                let mut missing = Vec::new();
                if directory.is_none() {
                    missing.push("directory");
                }
                if source.is_none() {
                    missing.push("content_source");
                }
                return Err(BuildError::MissingCollaborators(missing));
            }
        };

        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(FixedDelayLimiter::new(config.inter_batch_delay)));
        let tasks = self
            .tasks
            .unwrap_or_else(|| Arc::new(InMemoryTaskStore::new()));
        let communities = self
            .communities
            .unwrap_or_else(|| Arc::new(InMemoryCommunityStore::new(clock.clone())));
        let content = self
            .content
            .unwrap_or_else(|| Arc::new(InMemoryContentStore::new()));
        let parser = self
            .parser
            .unwrap_or_else(|| Arc::new(LineEntryParser::new()));

        let lifecycle = Arc::new(TaskLifecycle::new(tasks.clone(), clock, ids));
        let validator = BatchValidator::new(directory, limiter, config.batch_size);

        Ok(FlockService::new(Inner {
            parser,
            tasks,
            communities: communities.clone(),
            lifecycle: lifecycle.clone(),
            import: ImportPipeline::new(validator, communities, lifecycle.clone()),
            collection: CollectionOrchestrator::new(
                source,
                content,
                lifecycle,
                CollectionLimits::from(&config),
            ),
            progress: ProgressCalculator::new(config.estimate.clone()),
            retention: config.retention,
        }))
    }
}
