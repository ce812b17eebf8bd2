use std::{str::FromStr, sync::Arc};

use clap::Parser;
use monit_collector::{
    api::{ApiConfig, ApiState, spawn_api_server},
    config::{Config, read_config_file},
    ingest::Ingestor,
    storage::{SqliteBackend, StorageBackend},
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); built-in defaults are used when omitted
    #[arg(short, long)]
    file: Option<String>,

    /// Log level for the collector targets
    #[arg(long, default_value = "debug")]
    log_level: String,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("monit_collector", level),
        ("collector", level),
        ("tower_http", level),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = LevelFilter::from_str(&args.log_level)
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {e}", args.log_level))?;
    init(level);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides();

    let backend = Arc::new(SqliteBackend::connect(&config.storage).await?);
    info!("store opened at {}", backend.db_path());

    let ingestor = Arc::new(Ingestor::new(
        backend.pool().clone(),
        config.ingest.timeout(),
    ));
    let storage: Arc<dyn StorageBackend> = backend.clone();
    let state = ApiState::new(ingestor, storage);

    let addr = spawn_api_server(ApiConfig::from(&config), state).await?;
    info!("accepting reports on http://{addr}/collector");

    tokio::signal::ctrl_c().await?;
    warn!("shutting down");

    backend.close().await?;

    Ok(())
}
