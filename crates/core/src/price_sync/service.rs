//! Price sync orchestration.
//!
//! Phases run INIT → COLLECTING → IMPORTING → BACKING_UP → terminal. Every
//! outcome, fatal or not, ends as a structured [`PriceSyncOutcome`] and a
//! terminal job record; nothing is returned as an error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;

use super::client::PriceSource;
use super::detail::{MarketSummary, PhaseDetail, PriceSyncSummary};
use crate::backup::{BackupCoordinator, BackupOutcome, SnapshotTags};
use crate::catalog::{Market, MarketRepositoryTrait, Product, ProductRepositoryTrait};
use crate::config::PriceSyncConfig;
use crate::errors::{Error, Result};
use crate::import::{ImportEngine, ImportOptions, ImportProgress, ImportResult};
use crate::jobs::{
    CancellationToken, JobHandler, JobReporter, JobStatus, SyncJob, SyncJobStore, PRICE_SYNC_JOB,
};
use crate::matching::MarketMatcher;
use crate::prices::{PriceRecordStore, StagedObservation};
use crate::staging::{StagingStore, StagingStoreFactory};

const PROGRESS_INIT: u8 = 5;
const PROGRESS_COLLECT_END: u8 = 75;
const PROGRESS_IMPORT_END: u8 = 95;
const PROGRESS_BACKUP: u8 = 95;

/// Collaborators of the price sync service, constructed by the host
/// process and injected.
pub struct PriceSyncDeps {
    pub markets: Arc<dyn MarketRepositoryTrait>,
    pub products: Arc<dyn ProductRepositoryTrait>,
    pub source: Arc<dyn PriceSource>,
    pub staging: Arc<dyn StagingStoreFactory>,
    pub prices: Arc<dyn PriceRecordStore>,
    pub backup: Arc<BackupCoordinator>,
    pub jobs: Arc<dyn SyncJobStore>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSyncOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub summary: PriceSyncSummary,
    pub error: Option<String>,
}

/// What collecting one product produced.
struct ProductOutcome {
    found: bool,
    staged: u64,
    /// (market, price) per staged observation, in observation order.
    hits: Vec<(Market, Decimal)>,
}

impl ProductOutcome {
    fn not_found() -> Self {
        Self {
            found: false,
            staged: 0,
            hits: Vec::new(),
        }
    }
}

#[derive(Default)]
struct CollectTotals {
    processed: u64,
    found: u64,
    not_found: u64,
    outcomes: Vec<ProductOutcome>,
}

pub struct PriceSyncService {
    config: PriceSyncConfig,
    markets: Arc<dyn MarketRepositoryTrait>,
    products: Arc<dyn ProductRepositoryTrait>,
    source: Arc<dyn PriceSource>,
    staging: Arc<dyn StagingStoreFactory>,
    importer: ImportEngine,
    backup: Arc<BackupCoordinator>,
    jobs: Arc<dyn SyncJobStore>,
}

impl PriceSyncService {
    pub fn new(config: PriceSyncConfig, deps: PriceSyncDeps) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            markets: deps.markets,
            products: deps.products,
            source: deps.source,
            staging: deps.staging,
            importer: ImportEngine::new(deps.prices),
            backup: deps.backup,
            jobs: deps.jobs,
        })
    }

    /// Creates a job record and runs it inline.
    pub async fn start(&self) -> Result<PriceSyncOutcome> {
        let job = SyncJob::new(PRICE_SYNC_JOB);
        self.jobs.create(&job).await?;
        Ok(self.run(job).await)
    }

    /// Runs an already created job to a terminal status.
    pub async fn run(&self, job: SyncJob) -> PriceSyncOutcome {
        let started = Instant::now();
        let job_id = job.id.clone();
        let reporter = JobReporter::new(self.jobs.clone(), job);
        let token = CancellationToken::new(self.jobs.clone(), job_id.clone());

        reporter.log("Price sync started");
        reporter.update(0, PhaseDetail::Init).await;

        // INIT
        let staging = match self.staging.create(&job_id).await {
            Ok(staging) => staging,
            Err(e) => return self.fail(&reporter, None, e, PriceSyncSummary::default()).await,
        };
        let (markets, products) = match self.load_catalogs() {
            Ok(catalogs) => catalogs,
            Err(e) => {
                return self
                    .fail(&reporter, Some(&staging), e, PriceSyncSummary::default())
                    .await
            }
        };

        let mut summary = PriceSyncSummary {
            backup_status: "skipped".to_string(),
            ..PriceSyncSummary::default()
        };

        if markets.is_empty() || products.is_empty() {
            reporter.log(format!(
                "Nothing to sync ({} markets, {} products)",
                markets.len(),
                products.len()
            ));
            staging.close(true, 0).await;
            summary.total_duration_ms = elapsed_ms(started);
            return self
                .finish(&reporter, JobStatus::Completed, summary)
                .await;
        }

        let matcher = MarketMatcher::new(markets);
        summary.markets_processed = matcher.len() as u64;
        reporter.log(format!(
            "Loaded {} markets and {} products",
            matcher.len(),
            products.len()
        ));
        reporter.update(PROGRESS_INIT, PhaseDetail::Init).await;

        // COLLECTING
        let collect_started = Instant::now();
        let (totals, cancelled) = self
            .collect(&reporter, &token, &matcher, &products, staging.as_ref())
            .await;
        summary.products_processed = totals.processed;
        summary.products_found = totals.found;
        summary.products_not_found = totals.not_found;
        summary.prices_staged = staging.record_count();
        summary.markets = summarize_markets(&totals.outcomes);
        summary.collect_duration_ms = elapsed_ms(collect_started);

        if cancelled {
            reporter.log(format!(
                "Cancelled after {} of {} products",
                totals.processed,
                products.len()
            ));
            staging.close(true, 0).await;
            summary.total_duration_ms = elapsed_ms(started);
            return self
                .finish(&reporter, JobStatus::Cancelled, summary)
                .await;
        }

        reporter.log(format!(
            "Collected {} prices ({} products found, {} not found)",
            summary.prices_staged, summary.products_found, summary.products_not_found
        ));
        if let Ok(stats) = staging.stats().await {
            debug!(
                "Staging {}: {} rows, {} products, {} markets, price {:?}..{:?}",
                job_id,
                stats.count,
                stats.distinct_products,
                stats.distinct_markets,
                stats.min_price,
                stats.max_price
            );
        }

        // IMPORTING
        if summary.prices_staged == 0 {
            staging.close(true, 0).await;
            summary.total_duration_ms = elapsed_ms(started);
            return self
                .finish(&reporter, JobStatus::Completed, summary)
                .await;
        }

        let import_started = Instant::now();
        let result = self.import(&reporter, staging.clone()).await;
        summary.prices_imported = result.imported;
        summary.prices_skipped = result.skipped;
        summary.import_errors = result.errors;
        summary.import_duration_ms = elapsed_ms(import_started);
        reporter.log(format!(
            "Imported {} prices ({} skipped, {} errors)",
            result.imported, result.skipped, result.errors
        ));
        if result.errors > 0 {
            reporter.error(format!(
                "{} staged prices failed to import; retained for reimport",
                result.errors
            ));
        }
        staging
            .close(false, self.config.staging_retention_days)
            .await;

        // BACKING_UP
        reporter
            .update(PROGRESS_BACKUP, PhaseDetail::BackingUp)
            .await;
        let outcome = if result.imported == 0 {
            BackupOutcome::Skipped {
                reason: "nothing imported".to_string(),
            }
        } else {
            self.backup.run(&backup_tags(&job_id, &summary)).await
        };
        match &outcome {
            BackupOutcome::Created { snapshot_id, .. } => {
                reporter.log(format!("Snapshot {} requested", snapshot_id))
            }
            BackupOutcome::Skipped { reason } => {
                reporter.log(format!("Backup skipped: {}", reason))
            }
        }
        summary.backup_status = outcome.status_label().to_string();
        summary.backup_snapshot_id = outcome.snapshot_id().map(str::to_string);

        summary.total_duration_ms = elapsed_ms(started);
        self.finish(&reporter, JobStatus::Completed, summary).await
    }

    /// Re-drains the staging file retained by an earlier run of `job_id`.
    /// The run must have recorded its terminal status.
    pub async fn reimport(&self, job_id: &str) -> Result<ImportResult> {
        let job = self
            .jobs
            .get_by_id(job_id)?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if !job.status.is_terminal() || job.finished_at.is_none() {
            return Err(Error::JobInProgress(job_id.to_string()));
        }
        let staging = self.staging.reopen(job_id).await?;

        info!(
            "Reimporting {} staged prices for job {}",
            staging.record_count(),
            job_id
        );
        let options = ImportOptions {
            page_size: self.config.import_page_size,
            check_existing: true,
            workers: self.config.import_workers,
            progress_interval: self.config.progress_interval,
            on_progress: None,
        };
        let result = self.importer.drain(staging.clone(), &options).await;
        staging
            .close(false, self.config.staging_retention_days)
            .await;

        let line = format!(
            "Reimport: {} imported, {} skipped, {} errors",
            result.imported, result.skipped, result.errors
        );
        if !self.jobs.append_log(job_id, &line).await? {
            warn!("Job {} disappeared before its reimport was logged", job_id);
        }
        Ok(result)
    }

    fn load_catalogs(&self) -> Result<(Vec<Market>, Vec<Product>)> {
        let markets = self.markets.list_with_legal_name()?;
        let products = self.products.list_with_barcode()?;
        Ok((markets, products))
    }

    /// Returns the totals and whether the run was cancelled.
    async fn collect(
        &self,
        reporter: &JobReporter,
        token: &CancellationToken,
        matcher: &MarketMatcher,
        products: &[Product],
        staging: &dyn StagingStore,
    ) -> (CollectTotals, bool) {
        let started = Instant::now();
        let total = products.len() as u64;
        let batch_size = self.config.batch_size;
        let total_batches = products.len().div_ceil(batch_size) as u64;
        let mut totals = CollectTotals::default();

        for (batch_index, batch) in products.chunks(batch_size).enumerate() {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|product| self.collect_product(product, matcher, staging)),
            )
            .await;

            for outcome in outcomes {
                totals.processed += 1;
                if outcome.found {
                    totals.found += 1;
                } else {
                    totals.not_found += 1;
                }
                totals.outcomes.push(outcome);
            }

            let fraction = totals.processed as f64 / total as f64;
            let progress = PROGRESS_INIT as f64
                + (PROGRESS_COLLECT_END - PROGRESS_INIT) as f64 * fraction;
            reporter
                .update(
                    progress as u8,
                    PhaseDetail::Collecting {
                        batch: batch_index as u64 + 1,
                        total_batches,
                        processed: totals.processed,
                        total_products: total,
                        found: totals.found,
                        not_found: totals.not_found,
                        staged: staging.record_count(),
                        eta_seconds: eta_seconds(started.elapsed(), fraction),
                    },
                )
                .await;

            if token.is_cancelled() {
                return (totals, true);
            }
            if totals.processed < total && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        (totals, false)
    }

    /// Never fails: source errors and unmatched sellers count as not found.
    async fn collect_product(
        &self,
        product: &Product,
        matcher: &MarketMatcher,
        staging: &dyn StagingStore,
    ) -> ProductOutcome {
        let Some(barcode) = product.barcode.as_deref() else {
            return ProductOutcome::not_found();
        };

        let observations = match self.source.observations_for(barcode).await {
            Ok(observations) => observations,
            Err(e) => {
                warn!("Price source failed for product {}: {}", product.id, e);
                return ProductOutcome::not_found();
            }
        };

        let mut staged = Vec::new();
        let mut hits = Vec::new();
        for observation in &observations {
            let Some(price) = observation.net_price() else {
                debug!(
                    "Discarding observation for {}: discount {} >= price {}",
                    product.id, observation.discount, observation.listed_price
                );
                continue;
            };
            let Some(found) = matcher.resolve(&observation.seller) else {
                continue;
            };
            staged.push(StagedObservation {
                product_id: product.id.clone(),
                market_id: found.market.id.clone(),
                price,
                observed_at: observation.observed_at,
                notes: Some(observation_notes(&observation.seller.name, observation.description.as_deref())),
            });
            hits.push((found.market.clone(), price));
        }

        if staged.is_empty() {
            return ProductOutcome::not_found();
        }

        let stored = staging.insert_batch(&staged).await as u64;
        if stored == 0 {
            warn!(
                "Staging rejected {} observations for product {}",
                staged.len(),
                product.id
            );
        }
        ProductOutcome {
            found: true,
            staged: stored,
            hits,
        }
    }

    async fn import(&self, reporter: &JobReporter, staging: Arc<dyn StagingStore>) -> ImportResult {
        let total = staging.record_count();
        reporter
            .update(
                PROGRESS_COLLECT_END,
                PhaseDetail::Importing {
                    imported: 0,
                    skipped: 0,
                    errors: 0,
                    total,
                },
            )
            .await;

        // Worker callbacks are synchronous; persisting happens on this task.
        let (tx, mut rx) = mpsc::unbounded_channel::<ImportProgress>();
        let options = ImportOptions {
            page_size: self.config.import_page_size,
            check_existing: self.config.check_existing,
            workers: self.config.import_workers,
            progress_interval: self.config.progress_interval,
            on_progress: Some(Arc::new(move |progress| {
                let _ = tx.send(progress);
            })),
        };

        let drain = self.importer.drain(staging, &options);
        tokio::pin!(drain);

        let result = loop {
            tokio::select! {
                result = &mut drain => break result,
                Some(progress) = rx.recv() => {
                    reporter.update(import_progress(&progress), importing_detail(&progress)).await;
                }
            }
        };
        while let Ok(progress) = rx.try_recv() {
            reporter
                .update(import_progress(&progress), importing_detail(&progress))
                .await;
        }
        result
    }

    async fn fail(
        &self,
        reporter: &JobReporter,
        staging: Option<&Arc<dyn StagingStore>>,
        err: Error,
        summary: PriceSyncSummary,
    ) -> PriceSyncOutcome {
        let message = err.to_string();
        error!("Price sync job {} failed: {}", reporter.job_id(), message);
        if let Some(staging) = staging {
            staging.close(true, 0).await;
        }
        reporter.error(message.clone());
        reporter
            .finish(
                JobStatus::Failed,
                PhaseDetail::Failed {
                    message: message.clone(),
                },
            )
            .await;
        PriceSyncOutcome {
            job_id: reporter.job_id(),
            status: JobStatus::Failed,
            summary,
            error: Some(message),
        }
    }

    async fn finish(
        &self,
        reporter: &JobReporter,
        status: JobStatus,
        summary: PriceSyncSummary,
    ) -> PriceSyncOutcome {
        let detail = match status {
            JobStatus::Cancelled => PhaseDetail::Cancelled(summary.clone()),
            _ => PhaseDetail::Completed(summary.clone()),
        };
        let mut status = status;
        if !reporter.finish(status, detail).await {
            // Cancelled while the last phases ran: keep the cancellation but
            // record what was done.
            warn!(
                "Job {} left running before it finished; recording as cancelled",
                reporter.job_id()
            );
            reporter
                .finish(JobStatus::Cancelled, PhaseDetail::Cancelled(summary.clone()))
                .await;
            status = JobStatus::Cancelled;
        }
        info!(
            "Price sync job {} {}: {} products, {} staged, {} imported in {} ms",
            reporter.job_id(),
            status.as_str(),
            summary.products_processed,
            summary.prices_staged,
            summary.prices_imported,
            summary.total_duration_ms
        );
        PriceSyncOutcome {
            job_id: reporter.job_id(),
            status,
            summary,
            error: None,
        }
    }
}

#[async_trait]
impl JobHandler for PriceSyncService {
    fn name(&self) -> &'static str {
        PRICE_SYNC_JOB
    }

    async fn run(&self, job: SyncJob, _payload: Value) {
        PriceSyncService::run(self, job).await;
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Remaining time extrapolated from elapsed time over fraction complete.
fn eta_seconds(elapsed: Duration, fraction: f64) -> Option<u64> {
    if fraction <= 0.0 {
        return None;
    }
    let remaining = elapsed.as_secs_f64() / fraction * (1.0 - fraction);
    Some(remaining.max(0.0).round() as u64)
}

fn import_progress(progress: &ImportProgress) -> u8 {
    if progress.total == 0 {
        return PROGRESS_IMPORT_END;
    }
    let fraction = progress.processed as f64 / progress.total as f64;
    (PROGRESS_COLLECT_END as f64 + (PROGRESS_IMPORT_END - PROGRESS_COLLECT_END) as f64 * fraction)
        as u8
}

fn importing_detail(progress: &ImportProgress) -> PhaseDetail {
    PhaseDetail::Importing {
        imported: progress.imported,
        skipped: progress.skipped,
        errors: progress.errors,
        total: progress.total,
    }
}

fn observation_notes(seller: &str, description: Option<&str>) -> String {
    match description {
        Some(desc) => format!("{} | {}", seller, desc),
        None => seller.to_string(),
    }
}

/// Per-market aggregates in order of first appearance.
fn summarize_markets(outcomes: &[ProductOutcome]) -> Vec<MarketSummary> {
    let mut order: Vec<MarketSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (market, price) in outcomes.iter().filter(|o| o.staged > 0).flat_map(|o| o.hits.iter()) {
        match index.get(&market.id) {
            Some(&i) => {
                let entry = &mut order[i];
                entry.observations += 1;
                entry.min_price = entry.min_price.min(*price);
            }
            None => {
                index.insert(market.id.clone(), order.len());
                order.push(MarketSummary {
                    market_id: market.id.clone(),
                    market_name: market.name.clone(),
                    observations: 1,
                    min_price: *price,
                });
            }
        }
    }
    order
}

fn backup_tags(job_id: &str, summary: &PriceSyncSummary) -> SnapshotTags {
    SnapshotTags::from([
        ("jobId".to_string(), job_id.to_string()),
        ("produtosProcessados".to_string(), summary.products_processed.to_string()),
        ("precosRegistrados".to_string(), summary.prices_staged.to_string()),
        ("precosImportados".to_string(), summary.prices_imported.to_string()),
    ])
}
