use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use clipsync_lib::bootstrap::{
    apply_env_overrides, build_engine, resolve_config, run_until_shutdown,
    tracing::init_tracing_subscriber, AppPaths,
};
use cs_platform::DirsAppDirsAdapter;

#[derive(Parser)]
#[command(name = "clipsync")]
#[command(about = "Clipboard cloud sync engine", long_about = None)]
struct Cli {
    /// Config file path (default: <data dir>/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll the clipboard every N ms instead of using OS notifications
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Data directory override
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref())?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    if let Some(ms) = cli.poll_ms {
        config.capture.poll_interval_ms = Some(ms);
    }
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = Some(dir);
    }

    let paths = AppPaths::resolve(&config.storage, &DirsAppDirsAdapter::new())?;
    paths.ensure_dirs()?;
    init_tracing_subscriber(Some(&paths.logs_dir)).context("Failed to initialize tracing")?;

    let (engine, handle) = build_engine(&config, &paths)?;
    run_until_shutdown(engine, handle).await
}
