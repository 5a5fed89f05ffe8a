use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flock_core::app::{AppBuilder, FlockService, StatusLookup, StatusView};
use flock_core::config::PipelineConfig;
use flock_core::domain::TaskId;
use flock_core::impls::FixtureWorld;
use flock_core::ports::EncodingHint;

/// Import a list of communities, then optionally collect their posts and comments.
#[derive(Parser)]
#[command(name = "flock")]
struct Args {
    /// One community per line: id, screen name or URL, optional `;name`.
    file: PathBuf,

    /// JSON fixture standing in for the directory and content APIs.
    #[arg(long, env = "FLOCK_FIXTURE")]
    fixture: PathBuf,

    #[arg(long, value_enum, default_value_t = Encoding::Utf8)]
    encoding: Encoding,

    /// After the import, collect posts and comments of the new communities.
    #[arg(long)]
    collect: bool,

    /// Status polling interval.
    #[arg(long, default_value_t = 50)]
    poll_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Encoding {
    Utf8,
    Utf8Lossy,
    Latin1,
}

impl From<Encoding> for EncodingHint {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => EncodingHint::Utf8,
            Encoding::Utf8Lossy => EncodingHint::Utf8Lossy,
            Encoding::Latin1 => EncodingHint::Latin1,
        }
    }
}

/// terminal になるまでポーリング（進捗が変わったときだけログ）
async fn wait_terminal(
    service: &FlockService,
    task_id: TaskId,
    poll: Duration,
) -> anyhow::Result<StatusView> {
    let mut last = None;
    loop {
        let view = match service.status(task_id).await? {
            StatusLookup::Found(view) => view,
            StatusLookup::NotFound { task_id } => bail!("task {task_id} disappeared"),
        };
        if last != Some(view.progress.percentage) {
            info!(
                task_id = %task_id,
                status = %view.status,
                percentage = view.progress.percentage,
                phase = ?view.progress.current_phase,
                "progress"
            );
            last = Some(view.progress.percentage);
        }
        if view.status.is_terminal() {
            return Ok(*view);
        }
        sleep(poll).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("flock=info".parse()?)
                .add_directive("flock_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let poll = Duration::from_millis(args.poll_ms.max(1));

    // (A) 設定と collaborator を用意
    let config = PipelineConfig::from_env()?;
    let fixture = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading fixture {}", args.fixture.display()))?;
    let world = Arc::new(FixtureWorld::from_json(&fixture).context("parsing fixture")?);
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let service = AppBuilder::new()
        .config(config)
        .directory(world.clone())
        .content_source(world)
        .build()?;
    let sweeper = service.retention_sweeper().spawn(Duration::from_secs(60 * 60));

    // (B) 投入（すぐ返る）
    let receipt = service.submit(&bytes, args.encoding.into()).await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    // (C) import の完了を待つ
    let imported = wait_terminal(&service, receipt.task_id, poll).await?;
    println!("{}", serde_json::to_string_pretty(&imported)?);

    // (D) 新規に登録されたコミュニティだけ収集
    if args.collect {
        if imported.imported.is_empty() {
            info!("nothing new to collect");
        } else {
            let task_id = service.start_collection(imported.imported.clone()).await?;
            let collected = wait_terminal(&service, task_id, poll).await?;
            println!("{}", serde_json::to_string_pretty(&collected)?);
        }
    }

    println!("{}", serde_json::to_string(&service.counts().await?)?);
    sweeper.shutdown_and_join().await;
    Ok(())
}
