//! Paginated, de-duplicating, optionally parallel import.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};

use super::model::{ImportOptions, ImportProgress, ImportResult, ProgressCallback};
use crate::config::DUPLICATE_WINDOW_HOURS;
use crate::errors::Result;
use crate::prices::{DuplicateKey, NewPriceRecord, PriceRecordStore, StagedObservation};
use crate::staging::StagingStore;

/// Splits `total` rows into pages of `page_size` and hands each worker a
/// contiguous range of page indices. Pages are divided evenly by count,
/// so the last range may be shorter (or missing when pages < workers).
pub fn partition_pages(total: u64, page_size: usize, workers: usize) -> Vec<Range<u64>> {
    let page_size = page_size.max(1) as u64;
    let total_pages = total.div_ceil(page_size);
    if total_pages == 0 {
        return Vec::new();
    }
    let workers = (workers.max(1) as u64).min(total_pages);
    let pages_per_worker = total_pages.div_ceil(workers);

    (0..workers)
        .map(|w| {
            let start = w * pages_per_worker;
            let end = ((w + 1) * pages_per_worker).min(total_pages);
            start..end
        })
        .filter(|range| !range.is_empty())
        .collect()
}

#[derive(Default)]
struct Tally {
    imported: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

impl Tally {
    fn accounted(&self) -> u64 {
        self.imported.load(Ordering::SeqCst)
            + self.skipped.load(Ordering::SeqCst)
            + self.errors.load(Ordering::SeqCst)
    }
}

/// State shared by the workers of one drain.
struct DrainContext {
    primary: Arc<dyn PriceRecordStore>,
    staging: Arc<dyn StagingStore>,
    page_size: usize,
    check_existing: bool,
    total: u64,
    progress_interval: u64,
    on_progress: Option<ProgressCallback>,
    tallies: Vec<Arc<Tally>>,
}

impl DrainContext {
    fn rows_in_page(&self, page: u64) -> u64 {
        let offset = page * self.page_size as u64;
        (self.page_size as u64).min(self.total.saturating_sub(offset))
    }

    fn rows_in_range(&self, pages: &Range<u64>) -> u64 {
        pages.clone().map(|p| self.rows_in_page(p)).sum()
    }

    fn snapshot(&self) -> ImportProgress {
        let mut progress = ImportProgress {
            total: self.total,
            ..ImportProgress::default()
        };
        for tally in &self.tallies {
            progress.imported += tally.imported.load(Ordering::SeqCst);
            progress.skipped += tally.skipped.load(Ordering::SeqCst);
            progress.errors += tally.errors.load(Ordering::SeqCst);
        }
        progress.processed = progress.imported + progress.skipped + progress.errors;
        progress
    }

    fn report(&self, before: u64, after: u64) {
        let Some(callback) = &self.on_progress else {
            return;
        };
        if after / self.progress_interval > before / self.progress_interval {
            callback(self.snapshot());
        }
    }

    /// Runs the sequential algorithm over `pages`.
    async fn run_pages(&self, worker: usize, pages: Range<u64>) {
        let tally = &self.tallies[worker];
        for page in pages {
            let expected = self.rows_in_page(page);
            let before = self.snapshot().processed;

            match self.import_page(page).await {
                Ok((read, imported, skipped)) => {
                    tally.imported.fetch_add(imported, Ordering::SeqCst);
                    tally.skipped.fetch_add(skipped, Ordering::SeqCst);
                    if read < expected {
                        warn!(
                            "Worker {} page {} returned {} of {} rows",
                            worker, page, read, expected
                        );
                        tally.errors.fetch_add(expected - read, Ordering::SeqCst);
                    }
                }
                Err(e) => {
                    error!("Worker {} failed to import page {}: {}", worker, page, e);
                    tally.errors.fetch_add(expected, Ordering::SeqCst);
                }
            }

            self.report(before, self.snapshot().processed);
        }
    }

    /// Returns (rows read, inserted, skipped).
    async fn import_page(&self, page: u64) -> Result<(u64, u64, u64)> {
        let offset = page * self.page_size as u64;
        let rows = self.staging.read_page(offset, self.page_size).await?;
        let read = rows.len() as u64;
        if rows.is_empty() {
            return Ok((0, 0, 0));
        }

        let residual = if self.check_existing {
            self.filter_existing(rows).await?
        } else {
            rows
        };

        let records: Vec<NewPriceRecord> = residual.iter().map(NewPriceRecord::from_staged).collect();
        let inserted = if records.is_empty() {
            0
        } else {
            self.primary.insert_ignoring_duplicates(&records).await? as u64
        };
        let inserted = inserted.min(read);

        Ok((read, inserted, read - inserted))
    }

    /// Drops rows whose key already exists in the primary store within the
    /// duplicate window, or earlier in the same page.
    async fn filter_existing(&self, rows: Vec<StagedObservation>) -> Result<Vec<StagedObservation>> {
        let mut pairs: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.product_id.clone(), r.market_id.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();

        let since = Utc::now() - Duration::hours(DUPLICATE_WINDOW_HOURS);
        let existing = self.primary.find_recent_for_pairs(&pairs, since).await?;
        let mut seen: HashSet<DuplicateKey> =
            existing.iter().map(|record| record.duplicate_key()).collect();

        Ok(rows
            .into_iter()
            .filter(|row| seen.insert(DuplicateKey::of_staged(row)))
            .collect())
    }
}

/// Drains staging stores into the primary store.
pub struct ImportEngine {
    primary: Arc<dyn PriceRecordStore>,
}

impl ImportEngine {
    pub fn new(primary: Arc<dyn PriceRecordStore>) -> Self {
        Self { primary }
    }

    /// Transfers every staged row. Never fails: page and worker failures
    /// are counted as errors and the remaining work continues.
    pub async fn drain(
        &self,
        staging: Arc<dyn StagingStore>,
        options: &ImportOptions,
    ) -> ImportResult {
        let total = staging.record_count();
        let ranges = partition_pages(total, options.page_size, options.workers);

        info!(
            "Importing {} staged rows for job {} ({} worker(s), page size {}, check existing: {})",
            total,
            staging.job_id(),
            ranges.len(),
            options.page_size,
            options.check_existing
        );

        let ctx = Arc::new(DrainContext {
            primary: self.primary.clone(),
            staging,
            page_size: options.page_size.max(1),
            check_existing: options.check_existing,
            total,
            progress_interval: options.progress_interval.max(1) as u64,
            on_progress: options.on_progress.clone(),
            tallies: ranges.iter().map(|_| Arc::new(Tally::default())).collect(),
        });

        if ranges.len() <= 1 {
            if let Some(pages) = ranges.into_iter().next() {
                ctx.run_pages(0, pages).await;
            }
        } else {
            let handles: Vec<_> = ranges
                .iter()
                .cloned()
                .enumerate()
                .map(|(worker, pages)| {
                    let ctx = ctx.clone();
                    debug!("Worker {} takes pages {:?}", worker, pages);
                    tokio::spawn(async move { ctx.run_pages(worker, pages).await })
                })
                .collect();

            for (worker, (handle, pages)) in handles.into_iter().zip(ranges).enumerate() {
                if let Err(e) = handle.await {
                    let tally = &ctx.tallies[worker];
                    let lost = ctx.rows_in_range(&pages).saturating_sub(tally.accounted());
                    error!(
                        "Import worker {} aborted ({}); counting {} rows as errors",
                        worker, e, lost
                    );
                    tally.errors.fetch_add(lost, Ordering::SeqCst);
                }
            }
        }

        let progress = ctx.snapshot();
        let result = ImportResult {
            imported: progress.imported,
            skipped: progress.skipped,
            errors: progress.errors,
            total,
        };
        info!(
            "Import finished: {} imported, {} skipped, {} errors of {}",
            result.imported, result.skipped, result.errors, result.total
        );
        result
    }
}
