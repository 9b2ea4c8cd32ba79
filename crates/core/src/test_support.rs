//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::backup::{Snapshot, SnapshotService, SnapshotStatus, SnapshotTags};
use crate::catalog::{Market, MarketRepositoryTrait, Product, ProductRepositoryTrait};
use crate::errors::{DatabaseError, Error, Result};
use crate::jobs::{JobStatus, SyncJob, SyncJobStore};
use crate::matching::SellerReference;
use crate::price_sync::{PhaseDetail, PriceSource, PriceSourceError, SourceObservation};
use crate::prices::{NewPriceRecord, PriceRecord, PriceRecordStore, StagedObservation};
use crate::staging::{StagingStats, StagingStore, StagingStoreFactory};

pub fn observation(product_id: &str, market_id: &str, price: Decimal) -> StagedObservation {
    StagedObservation {
        product_id: product_id.to_string(),
        market_id: market_id.to_string(),
        price,
        observed_at: Utc::now(),
        notes: None,
    }
}

// =========================================================================
// Primary price store
// =========================================================================

#[derive(Default)]
pub struct MockPriceStore {
    records: Mutex<Vec<PriceRecord>>,
    fail_for_product: Mutex<Option<String>>,
}

impl MockPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PriceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// Any insert batch containing this product fails.
    pub fn fail_inserts_for_product(&self, product_id: &str) {
        *self.fail_for_product.lock().unwrap() = Some(product_id.to_string());
    }

    pub fn records(&self) -> Vec<PriceRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceRecordStore for MockPriceStore {
    async fn find_recent_for_pairs(
        &self,
        pairs: &[(String, String)],
        since: DateTime<Utc>,
    ) -> Result<Vec<PriceRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.recorded_at >= since)
            .filter(|r| {
                pairs
                    .iter()
                    .any(|(p, m)| *p == r.product_id && *m == r.market_id)
            })
            .cloned()
            .collect())
    }

    async fn insert_ignoring_duplicates(&self, new_records: &[NewPriceRecord]) -> Result<usize> {
        if let Some(poison) = self.fail_for_product.lock().unwrap().as_deref() {
            if new_records.iter().any(|r| r.product_id == poison) {
                return Err(DatabaseError::QueryFailed("insert failed".into()).into());
            }
        }
        let mut records = self.records.lock().unwrap();
        let mut inserted = 0;
        for record in new_records {
            if records.iter().any(|r| r.id == record.id) {
                continue;
            }
            records.push(PriceRecord {
                id: record.id.clone(),
                product_id: record.product_id.clone(),
                market_id: record.market_id.clone(),
                price: record.price,
                recorded_at: record.recorded_at,
                notes: record.notes.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }
}

// =========================================================================
// Staging
// =========================================================================

pub struct MockStagingStore {
    job_id: String,
    rows: Mutex<Vec<StagedObservation>>,
    count: AtomicU64,
    fail_offsets: Mutex<HashSet<u64>>,
    reject_inserts: AtomicBool,
    closed: Mutex<Option<(bool, i64)>>,
}

impl MockStagingStore {
    pub fn new(job_id: &str) -> Arc<Self> {
        Self::with_rows(job_id, Vec::new())
    }

    pub fn with_rows(job_id: &str, rows: Vec<StagedObservation>) -> Arc<Self> {
        Arc::new(Self {
            job_id: job_id.to_string(),
            count: AtomicU64::new(rows.len() as u64),
            rows: Mutex::new(rows),
            fail_offsets: Mutex::new(HashSet::new()),
            reject_inserts: AtomicBool::new(false),
            closed: Mutex::new(None),
        })
    }

    pub fn fail_reads_at(&self, offset: u64) {
        self.fail_offsets.lock().unwrap().insert(offset);
    }

    pub fn reject_inserts(&self) {
        self.reject_inserts.store(true, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<StagedObservation> {
        self.rows.lock().unwrap().clone()
    }

    /// `(delete_now, retention_days)` of the last close.
    pub fn closed_with(&self) -> Option<(bool, i64)> {
        *self.closed.lock().unwrap()
    }

    fn is_deleted(&self) -> bool {
        matches!(self.closed_with(), Some((true, _)))
    }
}

#[async_trait]
impl StagingStore for MockStagingStore {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn insert(&self, observation: &StagedObservation) -> bool {
        self.insert_batch(std::slice::from_ref(observation)).await == 1
    }

    async fn insert_batch(&self, observations: &[StagedObservation]) -> usize {
        if self.reject_inserts.load(Ordering::SeqCst) {
            return 0;
        }
        self.rows.lock().unwrap().extend_from_slice(observations);
        self.count
            .fetch_add(observations.len() as u64, Ordering::SeqCst);
        observations.len()
    }

    async fn stats(&self) -> Result<StagingStats> {
        let rows = self.rows.lock().unwrap();
        let products: HashSet<_> = rows.iter().map(|r| &r.product_id).collect();
        let markets: HashSet<_> = rows.iter().map(|r| &r.market_id).collect();
        Ok(StagingStats {
            count: rows.len() as u64,
            distinct_products: products.len() as u64,
            distinct_markets: markets.len() as u64,
            min_price: rows.iter().map(|r| r.price).min(),
            max_price: rows.iter().map(|r| r.price).max(),
            avg_price: None,
        })
    }

    fn record_count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    async fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<StagedObservation>> {
        if self.fail_offsets.lock().unwrap().contains(&offset) {
            return Err(Error::Staging(format!("read failed at offset {}", offset)));
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .skip(offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn close(&self, delete_now: bool, retention_days: i64) {
        *self.closed.lock().unwrap() = Some((delete_now, retention_days));
    }
}

#[derive(Default)]
pub struct MockStagingFactory {
    stores: Mutex<HashMap<String, Arc<MockStagingStore>>>,
    fail_on_create: AtomicBool,
    reject_inserts: AtomicBool,
}

impl MockStagingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    /// Stores created from now on refuse every write.
    pub fn set_reject_inserts(&self, reject: bool) {
        self.reject_inserts.store(reject, Ordering::SeqCst);
    }

    pub fn store(&self, job_id: &str) -> Option<Arc<MockStagingStore>> {
        self.stores.lock().unwrap().get(job_id).cloned()
    }

    pub fn insert_store(&self, store: Arc<MockStagingStore>) {
        self.stores
            .lock()
            .unwrap()
            .insert(store.job_id.clone(), store);
    }
}

#[async_trait]
impl StagingStoreFactory for MockStagingFactory {
    async fn create(&self, job_id: &str) -> Result<Arc<dyn StagingStore>> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(Error::Staging("disk full".into()));
        }
        let store = MockStagingStore::new(job_id);
        if self.reject_inserts.load(Ordering::SeqCst) {
            store.reject_inserts();
        }
        self.insert_store(store.clone());
        Ok(store)
    }

    async fn reopen(&self, job_id: &str) -> Result<Arc<dyn StagingStore>> {
        match self.store(job_id) {
            Some(store) if !store.is_deleted() => {
                *store.closed.lock().unwrap() = None;
                Ok(store)
            }
            _ => Err(Error::NotFound(format!("staging file for job {}", job_id))),
        }
    }

    fn exists(&self, job_id: &str) -> bool {
        self.store(job_id).map(|s| !s.is_deleted()).unwrap_or(false)
    }
}

// =========================================================================
// Jobs
// =========================================================================

#[derive(Default)]
pub struct MockJobStore {
    jobs: Mutex<Vec<SyncJob>>,
    cancel_on_batch: Mutex<Option<u64>>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags the job cancelled when progress for collection batch `batch`
    /// is saved, as if a user cancelled while that batch ran.
    pub fn cancel_during_batch(&self, batch: u64) {
        *self.cancel_on_batch.lock().unwrap() = Some(batch);
    }
}

#[async_trait]
impl SyncJobStore for MockJobStore {
    async fn create(&self, job: &SyncJob) -> Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<SyncJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id)
            .cloned())
    }

    fn list_recent(&self, limit: i64) -> Result<Vec<SyncJob>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.iter().rev().take(limit.max(0) as usize).cloned().collect())
    }

    fn get_status(&self, id: &str) -> Result<Option<JobStatus>> {
        Ok(self.get_by_id(id)?.map(|j| j.status))
    }

    async fn save_progress(&self, job: &SyncJob) -> Result<()> {
        let cancel_on = *self.cancel_on_batch.lock().unwrap();
        let mut jobs = self.jobs.lock().unwrap();
        let stored = jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| Error::NotFound(job.id.clone()))?;
        stored.progress = job.progress;
        stored.detail = job.detail.clone();
        stored.logs = job.logs.clone();
        stored.errors = job.errors.clone();
        stored.updated_at = job.updated_at;

        if let (Some(target), PhaseDetail::Collecting { batch, .. }) = (cancel_on, &job.detail) {
            if *batch == target && stored.status == JobStatus::Running {
                stored.status = JobStatus::Cancelled;
            }
        }
        Ok(())
    }

    async fn finish(&self, job: &SyncJob) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(stored) = jobs.iter_mut().find(|j| j.id == job.id) else {
            return Ok(false);
        };
        let allowed = match stored.status {
            JobStatus::Running => true,
            JobStatus::Cancelled => {
                job.status == JobStatus::Cancelled && stored.finished_at.is_none()
            }
            _ => false,
        };
        if allowed {
            *stored = job.clone();
        }
        Ok(allowed)
    }

    async fn request_cancel(&self, id: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.status == JobStatus::Running => {
                job.status = JobStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_log(&self, id: &str, message: &str) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) => {
                job.push_log(message);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =========================================================================
// Catalogs
// =========================================================================

#[derive(Default)]
pub struct MockCatalog {
    pub markets: Vec<Market>,
    pub products: Vec<Product>,
    pub fail: bool,
}

impl MarketRepositoryTrait for MockCatalog {
    fn list_with_legal_name(&self) -> Result<Vec<Market>> {
        if self.fail {
            return Err(DatabaseError::ConnectionFailed("catalog unavailable".into()).into());
        }
        Ok(self
            .markets
            .iter()
            .filter(|m| m.legal_name.is_some())
            .cloned()
            .collect())
    }
}

impl ProductRepositoryTrait for MockCatalog {
    fn list_with_barcode(&self) -> Result<Vec<Product>> {
        if self.fail {
            return Err(DatabaseError::ConnectionFailed("catalog unavailable".into()).into());
        }
        Ok(self
            .products
            .iter()
            .filter(|p| p.barcode.is_some())
            .cloned()
            .collect())
    }
}

pub fn market(id: &str, legal_name: &str, location: Option<&str>) -> Market {
    Market {
        id: id.to_string(),
        name: format!("{} ({})", legal_name, id),
        legal_name: Some(legal_name.to_string()),
        location: location.map(str::to_string),
    }
}

pub fn product(id: &str, barcode: &str) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        barcode: Some(barcode.to_string()),
    }
}

// =========================================================================
// Price source
// =========================================================================

#[derive(Default)]
pub struct MockPriceSource {
    responses: Mutex<HashMap<String, Vec<SourceObservation>>>,
    failing: Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, barcode: &str, observations: Vec<SourceObservation>) {
        self.responses
            .lock()
            .unwrap()
            .insert(barcode.to_string(), observations);
    }

    pub fn fail_for(&self, barcode: &str) {
        self.failing.lock().unwrap().insert(barcode.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn observations_for(
        &self,
        barcode: &str,
    ) -> std::result::Result<Vec<SourceObservation>, PriceSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(barcode) {
            return Err(PriceSourceError::Timeout("MOCK".to_string()));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(barcode)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn source_observation(seller: &str, listed: Decimal, discount: Decimal) -> SourceObservation {
    SourceObservation {
        seller: SellerReference {
            name: seller.to_string(),
            street: None,
            number: None,
            neighborhood: None,
        },
        description: Some("ITEM".to_string()),
        listed_price: listed,
        discount,
        observed_at: Utc::now(),
    }
}

// =========================================================================
// Snapshots
// =========================================================================

#[derive(Default)]
pub struct MockSnapshotService {
    snapshots: Mutex<Vec<Snapshot>>,
    fail_on_create: AtomicBool,
    created: AtomicUsize,
}

impl MockSnapshotService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.fail_on_create.store(fail, Ordering::SeqCst);
    }

    pub fn add(&self, id: &str, status: SnapshotStatus, created_at: DateTime<Utc>) {
        self.snapshots.lock().unwrap().push(Snapshot {
            id: id.to_string(),
            status,
            tags: SnapshotTags::new(),
            created_at,
        });
    }

    pub fn set_status(&self, id: &str, status: SnapshotStatus) {
        if let Some(s) = self
            .snapshots
            .lock()
            .unwrap()
            .iter_mut()
            .find(|s| s.id == id)
        {
            s.status = status;
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotService for MockSnapshotService {
    async fn create_snapshot(&self, prefix: &str, tags: &SnapshotTags) -> Result<Snapshot> {
        if self.fail_on_create.load(Ordering::SeqCst) {
            return Err(Error::Snapshot("service unavailable".into()));
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Snapshot {
            id: format!("{}-{}", prefix, n),
            status: SnapshotStatus::Creating,
            tags: tags.clone(),
            created_at: Utc::now(),
        };
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn list_snapshots(&self, prefix: &str) -> Result<Vec<Snapshot>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.id.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        self.snapshots.lock().unwrap().retain(|s| s.id != id);
        Ok(())
    }
}
