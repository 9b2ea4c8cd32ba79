use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use pricewatch_core::backup::BackupCoordinator;
use pricewatch_core::jobs::{JobRunner, SyncJobStore};
use pricewatch_core::price_sync::PriceSourceClient;
use pricewatch_core::{PriceSyncDeps, PriceSyncService};
use pricewatch_price_source::MenorPrecoProvider;
use pricewatch_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, FileSnapshotService, MarketRepository,
    PriceRecordRepository, ProductRepository, SqliteStagingFactory, SyncJobRepository,
};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub runner: Arc<JobRunner>,
    pub jobs: Arc<dyn SyncJobStore>,
    pub price_sync: Arc<PriceSyncService>,
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let staging = Arc::new(SqliteStagingFactory::new(&config.staging_dir));
    match staging.sweep_expired(chrono::Utc::now()) {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired staging files", n),
        Err(e) => tracing::warn!("Staging sweep failed: {}", e),
    }

    let jobs: Arc<dyn SyncJobStore> =
        Arc::new(SyncJobRepository::new(pool.clone(), writer.clone()));
    let provider = Arc::new(MenorPrecoProvider::new(config.price_source.clone())?);
    let snapshots = Arc::new(FileSnapshotService::new(&db_path, &config.snapshot_dir));
    let backup = Arc::new(BackupCoordinator::new(
        snapshots,
        config.price_sync.snapshot_prefix.clone(),
        config.price_sync.snapshot_retention_days,
    ));

    let price_sync = Arc::new(PriceSyncService::new(
        config.price_sync.clone(),
        PriceSyncDeps {
            markets: Arc::new(MarketRepository::new(pool.clone(), writer.clone())),
            products: Arc::new(ProductRepository::new(pool.clone(), writer.clone())),
            source: Arc::new(PriceSourceClient::new(provider)),
            staging,
            prices: Arc::new(PriceRecordRepository::new(pool.clone(), writer.clone())),
            backup,
            jobs: jobs.clone(),
        },
    )?);

    let runner = Arc::new(
        JobRunner::new(jobs.clone(), config.job_concurrency).register(price_sync.clone()),
    );

    Ok(Arc::new(AppState {
        runner,
        jobs,
        price_sync,
    }))
}
