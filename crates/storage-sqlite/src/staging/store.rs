//! SQLite-backed staging store, one file per job.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::connection::{Connection, SimpleConnection};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;

use pricewatch_core::errors::{Error, Result};
use pricewatch_core::prices::StagedObservation;
use pricewatch_core::staging::{StagingStats, StagingStore};

use super::model::{NewStagedPriceDB, StagedPriceDB, StatsRow};
use super::schema::{staged_prices, CREATE_STAGING_SCHEMA, STATS_QUERY};
use crate::db::{create_pool_with_size, get_connection, spawn_writer_tracked, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::utils::{to_db_timestamp, SQLITE_MAX_PARAMS_CHUNK};

// Five bound columns per row.
const ROWS_PER_INSERT: usize = SQLITE_MAX_PARAMS_CHUNK / 5;

// Enough readers for parallel import workers.
const STAGING_POOL_SIZE: u32 = 4;

struct StagingHandles {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    actor: JoinHandle<()>,
}

pub struct SqliteStagingStore {
    job_id: String,
    path: PathBuf,
    count: AtomicU64,
    handles: RwLock<Option<StagingHandles>>,
}

/// Sidecar file holding the RFC3339 expiry of a retained staging file.
pub(super) fn expiry_marker_path(path: &Path) -> PathBuf {
    let mut marker = path.as_os_str().to_owned();
    marker.push(".expires");
    PathBuf::from(marker)
}

/// The database file and its WAL/SHM companions.
pub(super) fn database_files(path: &Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            PathBuf::from(file)
        })
        .collect()
}

pub(super) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

impl SqliteStagingStore {
    /// Opens (creating if needed) the staging file at `path`. The record
    /// counter starts at the number of rows already in the file.
    pub fn open(job_id: &str, path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let db_path = path
            .to_str()
            .ok_or_else(|| Error::Staging(format!("non UTF-8 staging path {:?}", path)))?;

        {
            let mut conn = SqliteConnection::establish(db_path).map_err(StorageError::from)?;
            conn.batch_execute("PRAGMA journal_mode = WAL;")
                .into_core()?;
            conn.batch_execute(CREATE_STAGING_SCHEMA).into_core()?;
        }

        let pool = create_pool_with_size(db_path, STAGING_POOL_SIZE)?;
        let existing: i64 = {
            let mut conn = get_connection(&pool)?;
            staged_prices::table
                .count()
                .get_result(&mut conn)
                .into_core()?
        };
        let (writer, actor) = spawn_writer_tracked((*pool).clone());

        debug!(
            "Opened staging store for job {} at {} ({} rows)",
            job_id,
            path.display(),
            existing
        );

        Ok(Self {
            job_id: job_id.to_string(),
            path: path.to_path_buf(),
            count: AtomicU64::new(existing.max(0) as u64),
            handles: RwLock::new(Some(StagingHandles {
                pool,
                writer,
                actor,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pool(&self) -> Result<Arc<DbPool>> {
        self.handles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|h| h.pool.clone())
            .ok_or_else(|| self.closed_error())
    }

    fn writer(&self) -> Result<WriteHandle> {
        self.handles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|h| h.writer.clone())
            .ok_or_else(|| self.closed_error())
    }

    fn closed_error(&self) -> Error {
        Error::Staging(format!("staging store for job {} is closed", self.job_id))
    }

    /// Runs `read` on a pooled connection on the blocking thread pool.
    async fn with_reader<F, T>(&self, read: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool()?;
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            read(&mut conn)
        })
        .await
        .map_err(|e| Error::Staging(format!("staging read task failed: {}", e)))?
    }

    async fn write_rows(&self, rows: Vec<NewStagedPriceDB>) -> Result<usize> {
        let writer = self.writer()?;
        writer
            .exec(move |conn| {
                let mut written = 0;
                for chunk in rows.chunks(ROWS_PER_INSERT) {
                    written += diesel::insert_into(staged_prices::table)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(written)
            })
            .await
    }

    async fn release(&self) {
        let handles = self
            .handles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(StagingHandles {
            pool,
            writer,
            actor,
        }) = handles
        {
            drop(writer);
            if let Err(e) = actor.await {
                warn!("Staging writer for job {} ended abnormally: {}", self.job_id, e);
            }
            drop(pool);
        }
    }

    fn delete_files(&self) {
        let mut files = database_files(&self.path);
        files.push(expiry_marker_path(&self.path));
        for file in files {
            if let Err(e) = remove_if_exists(&file) {
                warn!("Failed to delete staging file {}: {}", file.display(), e);
            }
        }
    }

    fn write_expiry(&self, retention_days: i64) {
        let expires_at = Utc::now() + Duration::days(retention_days);
        let marker = expiry_marker_path(&self.path);
        match fs::write(&marker, to_db_timestamp(&expires_at)) {
            Ok(()) => info!(
                "Staging file {} retained until {}",
                self.path.display(),
                expires_at
            ),
            Err(e) => warn!("Failed to write expiry marker {}: {}", marker.display(), e),
        }
    }
}

#[async_trait]
impl StagingStore for SqliteStagingStore {
    fn job_id(&self) -> &str {
        &self.job_id
    }

    async fn insert(&self, observation: &StagedObservation) -> bool {
        match self.write_rows(vec![NewStagedPriceDB::from(observation)]).await {
            Ok(written) => {
                self.count.fetch_add(written as u64, Ordering::SeqCst);
                written == 1
            }
            Err(e) => {
                warn!("Staging insert failed for job {}: {}", self.job_id, e);
                false
            }
        }
    }

    async fn insert_batch(&self, observations: &[StagedObservation]) -> usize {
        if observations.is_empty() {
            return 0;
        }
        let rows = observations.iter().map(NewStagedPriceDB::from).collect();
        match self.write_rows(rows).await {
            Ok(written) => {
                self.count.fetch_add(written as u64, Ordering::SeqCst);
                written
            }
            Err(e) => {
                warn!(
                    "Staging batch of {} failed for job {}: {}",
                    observations.len(),
                    self.job_id,
                    e
                );
                0
            }
        }
    }

    async fn stats(&self) -> Result<StagingStats> {
        let row = self
            .with_reader(|conn| {
                diesel::sql_query(STATS_QUERY)
                    .get_result::<StatsRow>(conn)
                    .into_core()
            })
            .await?;
        Ok(row.into())
    }

    fn record_count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    async fn read_page(&self, offset: u64, limit: usize) -> Result<Vec<StagedObservation>> {
        let rows = self
            .with_reader(move |conn| {
                staged_prices::table
                    .order(staged_prices::id.asc())
                    .limit(limit as i64)
                    .offset(offset as i64)
                    .select(StagedPriceDB::as_select())
                    .load::<StagedPriceDB>(conn)
                    .into_core()
            })
            .await?;
        rows.into_iter().map(StagedObservation::try_from).collect()
    }

    async fn close(&self, delete_now: bool, retention_days: i64) {
        self.release().await;

        if !delete_now && retention_days > 0 {
            self.write_expiry(retention_days);
        } else {
            self.delete_files();
            debug!("Deleted staging store for job {}", self.job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn observation(product: &str, market: &str, price: rust_decimal::Decimal) -> StagedObservation {
        StagedObservation {
            product_id: product.to_string(),
            market_id: market.to_string(),
            price,
            observed_at: Utc::now(),
            notes: Some("menor preco".to_string()),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> SqliteStagingStore {
        let path = dir.path().join("staging_job-1.db");
        SqliteStagingStore::open("job-1", &path).unwrap()
    }

    #[tokio::test]
    async fn test_insert_is_reflected_in_count_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert_eq!(store.record_count(), 0);
        assert!(store.insert(&observation("p1", "m1", dec!(7.50))).await);
        assert_eq!(store.record_count(), 1);

        let batch = vec![
            observation("p2", "m1", dec!(3.20)),
            observation("p3", "m2", dec!(12.00)),
        ];
        assert_eq!(store.insert_batch(&batch).await, 2);
        assert_eq!(store.record_count(), 3);
        store.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_pages_follow_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let rows: Vec<StagedObservation> = (0..25)
            .map(|i| observation(&format!("p{}", i), "m1", rust_decimal::Decimal::new(100 + i, 2)))
            .collect();
        assert_eq!(store.insert_batch(&rows).await, 25);

        let first = store.read_page(0, 10).await.unwrap();
        let last = store.read_page(20, 10).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].product_id, "p0");
        assert_eq!(last.len(), 5);
        assert_eq!(last[4].product_id, "p24");
        assert_eq!(last[4].price, dec!(1.24));
        assert!(store.read_page(25, 10).await.unwrap().is_empty());
        store.close(true, 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_readers_see_disjoint_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open_store(&dir));
        let rows: Vec<StagedObservation> = (0..40)
            .map(|i| observation(&format!("p{}", i), "m1", dec!(1.00)))
            .collect();
        assert_eq!(store.insert_batch(&rows).await, 40);

        // More readers than pooled connections, as parallel import workers do.
        let readers: Vec<_> = (0..8u64)
            .map(|page| {
                let store = store.clone();
                tokio::spawn(async move { store.read_page(page * 5, 5).await })
            })
            .collect();
        let stats = store.stats().await.unwrap();

        let mut seen = Vec::new();
        for reader in readers {
            let page = reader.await.unwrap().unwrap();
            assert_eq!(page.len(), 5);
            seen.extend(page.into_iter().map(|r| r.product_id));
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 40);
        assert_eq!(stats.count, 40);
        store.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_large_batch_is_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let rows: Vec<StagedObservation> = (0..(ROWS_PER_INSERT * 2 + 3))
            .map(|i| observation(&format!("p{}", i), "m1", dec!(1.00)))
            .collect();
        assert_eq!(store.insert_batch(&rows).await, rows.len());
        assert_eq!(store.record_count(), rows.len() as u64);
        store.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_stats_single_scan() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store
            .insert_batch(&[
                observation("p1", "m1", dec!(2.00)),
                observation("p1", "m2", dec!(4.00)),
                observation("p2", "m1", dec!(6.00)),
            ])
            .await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.distinct_products, 2);
        assert_eq!(stats.distinct_markets, 2);
        assert_eq!(stats.min_price, Some(dec!(2.00)));
        assert_eq!(stats.max_price, Some(dec!(6.00)));
        assert_eq!(stats.avg_price, Some(dec!(4.00)));
        store.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_empty_stats_have_no_prices() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, StagingStats::default());
        store.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_close_and_delete_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.insert(&observation("p1", "m1", dec!(1.00))).await;
        let path = store.path().to_path_buf();

        store.close(true, 7).await;

        for file in database_files(&path) {
            assert!(!file.exists(), "{} still exists", file.display());
        }
        assert!(!expiry_marker_path(&path).exists());
    }

    #[tokio::test]
    async fn test_close_with_retention_keeps_file_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.insert(&observation("p1", "m1", dec!(1.00))).await;
        let path = store.path().to_path_buf();

        store.close(false, 7).await;

        assert!(path.exists());
        let marker = fs::read_to_string(expiry_marker_path(&path)).unwrap();
        let expires_at = crate::utils::parse_db_timestamp(&marker).unwrap();
        assert!(expires_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn test_writes_after_close_are_rejected_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.close(true, 0).await;

        assert!(!store.insert(&observation("p1", "m1", dec!(1.00))).await);
        assert_eq!(store.record_count(), 0);
        assert!(store.read_page(0, 10).await.is_err());
        // Closing twice is harmless.
        store.close(true, 0).await;
    }
}
