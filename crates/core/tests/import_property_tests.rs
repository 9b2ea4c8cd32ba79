//! Property-based integration tests for matching and import.
//!
//! These tests verify invariants that must hold across all inputs, using
//! the `proptest` crate for random test case generation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use pricewatch_core::import::{partition_pages, ImportEngine, ImportOptions};
use pricewatch_core::matching::{name_score, normalize};
use pricewatch_core::prices::{DuplicateKey, NewPriceRecord, PriceRecord, PriceRecordStore, StagedObservation};
use pricewatch_core::staging::{StagingStats, StagingStore};
use pricewatch_core::{Error, Result};

// =============================================================================
// Fixtures
// =============================================================================

struct VecStaging {
    rows: Vec<StagedObservation>,
    failing_offsets: HashSet<u64>,
    reads: Mutex<Vec<(u64, usize)>>,
}

#[async_trait]
impl StagingStore for VecStaging {
    fn job_id(&self) -> &str {
        "prop"
    }

    async fn insert(&self, _observation: &StagedObservation) -> bool {
        false
    }

    async fn insert_batch(&self, _observations: &[StagedObservation]) -> usize {
        0
    }

    async fn stats(&self) -> Result<StagingStats> {
        Ok(StagingStats::default())
    }

    fn record_count(&self) -> u64 {
        self.rows.len() as u64
    }

    async fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<StagedObservation>> {
        self.reads.lock().unwrap().push((offset, limit));
        if self.failing_offsets.contains(&offset) {
            return Err(Error::Staging("unreadable page".into()));
        }
        Ok(self.rows.iter().skip(offset as usize).take(limit).cloned().collect())
    }

    async fn close(&self, _delete_now: bool, _retention_days: i64) {}
}

#[derive(Default)]
struct CountingStore {
    ids: Mutex<HashSet<String>>,
    inserts: AtomicU64,
}

#[async_trait]
impl PriceRecordStore for CountingStore {
    async fn find_recent_for_pairs(
        &self,
        _pairs: &[(String, String)],
        _since: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        Ok(Vec::new())
    }

    async fn insert_ignoring_duplicates(&self, records: &[NewPriceRecord]) -> Result<usize> {
        let mut ids = self.ids.lock().unwrap();
        let inserted = records.iter().filter(|r| ids.insert(r.id.clone())).count();
        self.inserts.fetch_add(inserted as u64, Ordering::SeqCst);
        Ok(inserted)
    }
}

fn rows(count: usize) -> Vec<StagedObservation> {
    (0..count)
        .map(|i| StagedObservation {
            product_id: format!("p{}", i),
            market_id: "m1".to_string(),
            price: Decimal::new(100 + i as i64, 2),
            observed_at: Utc::now(),
            notes: None,
        })
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Partitions never drop or double-read a page.
    #[test]
    fn prop_partition_is_exact_cover(total in 0u64..50_000, page in 1usize..2_000, workers in 1usize..16) {
        let ranges = partition_pages(total, page, workers);
        let mut next = 0;
        for range in &ranges {
            prop_assert_eq!(range.start, next);
            prop_assert!(range.end > range.start);
            next = range.end;
        }
        prop_assert_eq!(next, total.div_ceil(page as u64));
    }

    /// Normalizing twice changes nothing.
    #[test]
    fn prop_normalize_is_idempotent(text in "[A-Za-zÀ-ÿ0-9 ./-]{0,40}") {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    /// A normalized name always fully matches itself on its significant words.
    #[test]
    fn prop_name_matches_itself(words in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
        let name = words.join(" ");
        let significant = words.iter().filter(|w| w.len() >= 4).count();
        prop_assert_eq!(name_score(&name, &name), significant);
    }

    /// Prices equal at 2-decimal precision share a key.
    #[test]
    fn prop_duplicate_key_rounds_to_cents(cents in 1i64..1_000_000, extra in 0i64..5) {
        let exact = Decimal::new(cents, 2);
        let noisy = Decimal::new(cents * 1000 + extra, 5);
        prop_assert_eq!(
            DuplicateKey::new("p", "m", exact),
            DuplicateKey::new("p", "m", noisy)
        );
    }

    /// imported + skipped + errors == total staged, for any worker count and
    /// any set of unreadable pages; reads never overlap.
    #[test]
    fn prop_import_accounts_for_every_row(
        count in 0usize..300,
        page in 1usize..40,
        workers in 1usize..6,
        failing in proptest::collection::hash_set(0u64..10, 0..3),
    ) {
        let failing_offsets: HashSet<u64> = failing.iter().map(|p| p * page as u64).collect();
        let staging = Arc::new(VecStaging {
            rows: rows(count),
            failing_offsets,
            reads: Mutex::new(Vec::new()),
        });
        let primary = Arc::new(CountingStore::default());
        let options = ImportOptions {
            page_size: page,
            workers,
            check_existing: false,
            ..ImportOptions::default()
        };

        let result = runtime().block_on(ImportEngine::new(primary.clone()).drain(staging.clone(), &options));

        prop_assert_eq!(result.total, count as u64);
        prop_assert_eq!(result.imported + result.skipped + result.errors, count as u64);
        prop_assert_eq!(result.imported, primary.inserts.load(Ordering::SeqCst));

        let reads = staging.reads.lock().unwrap();
        let offsets: HashSet<u64> = reads.iter().map(|(offset, _)| *offset).collect();
        prop_assert_eq!(offsets.len(), reads.len());
    }

    /// Parallel and sequential imports agree on an empty primary store.
    #[test]
    fn prop_parallel_matches_sequential(count in 0usize..200, page in 1usize..25, workers in 2usize..6) {
        let rt = runtime();
        let options = |workers| ImportOptions {
            page_size: page,
            workers,
            check_existing: false,
            ..ImportOptions::default()
        };
        let staging = || Arc::new(VecStaging {
            rows: rows(count),
            failing_offsets: HashSet::new(),
            reads: Mutex::new(Vec::new()),
        });

        let sequential = rt.block_on(
            ImportEngine::new(Arc::new(CountingStore::default())).drain(staging(), &options(1)),
        );
        let parallel = rt.block_on(
            ImportEngine::new(Arc::new(CountingStore::default())).drain(staging(), &options(workers)),
        );

        prop_assert_eq!(parallel.imported, sequential.imported);
        prop_assert_eq!(sequential.imported, count as u64);
    }
}
