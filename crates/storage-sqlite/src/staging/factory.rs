//! Opens per-job staging files under one directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pricewatch_core::errors::{Error, Result};
use pricewatch_core::staging::{staging_file_name, StagingStore, StagingStoreFactory};

use super::store::{database_files, expiry_marker_path, remove_if_exists, SqliteStagingStore};
use crate::utils::parse_db_timestamp;

pub struct SqliteStagingFactory {
    staging_dir: PathBuf,
}

impl SqliteStagingFactory {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.staging_dir.join(staging_file_name(job_id))
    }

    /// Expiry recorded when the job's staging file was retained.
    pub fn expires_at(&self, job_id: &str) -> Option<DateTime<Utc>> {
        read_expiry(&self.path_for(job_id))
    }

    /// Deletes retained staging files whose expiry is before `now`.
    /// Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let entries = match fs::read_dir(&self.staging_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_staging_db = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("staging_") && n.ends_with(".db"))
                .unwrap_or(false);
            if !is_staging_db {
                continue;
            }
            match read_expiry(&path) {
                Some(expires_at) if expires_at < now => {
                    let mut files = database_files(&path);
                    files.push(expiry_marker_path(&path));
                    for file in files {
                        if let Err(e) = remove_if_exists(&file) {
                            warn!("Failed to delete expired staging file {}: {}", file.display(), e);
                        }
                    }
                    info!("Swept expired staging file {}", path.display());
                    removed += 1;
                }
                _ => {}
            }
        }
        Ok(removed)
    }
}

fn read_expiry(path: &Path) -> Option<DateTime<Utc>> {
    let marker = fs::read_to_string(expiry_marker_path(path)).ok()?;
    parse_db_timestamp(marker.trim()).ok()
}

#[async_trait]
impl StagingStoreFactory for SqliteStagingFactory {
    async fn create(&self, job_id: &str) -> Result<Arc<dyn StagingStore>> {
        let path = self.path_for(job_id);
        // A leftover file for the same id would otherwise be drained again.
        for file in database_files(&path) {
            remove_if_exists(&file)?;
        }
        remove_if_exists(&expiry_marker_path(&path))?;

        let store = SqliteStagingStore::open(job_id, &path)?;
        Ok(Arc::new(store))
    }

    async fn reopen(&self, job_id: &str) -> Result<Arc<dyn StagingStore>> {
        let path = self.path_for(job_id);
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "no staging file for job {}",
                job_id
            )));
        }
        let store = SqliteStagingStore::open(job_id, &path)?;
        Ok(Arc::new(store))
    }

    fn exists(&self, job_id: &str) -> bool {
        self.path_for(job_id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pricewatch_core::prices::StagedObservation;
    use rust_decimal_macros::dec;

    fn observation(product: &str) -> StagedObservation {
        StagedObservation {
            product_id: product.to_string(),
            market_id: "m1".to_string(),
            price: dec!(5.25),
            observed_at: Utc::now(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_file_is_named_after_job() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteStagingFactory::new(dir.path());

        let store = factory.create("abc").await.unwrap();
        assert!(dir.path().join("staging_abc.db").exists());
        assert!(factory.exists("abc"));
        assert!(!factory.exists("other"));
        store.close(true, 0).await;
        assert!(!factory.exists("abc"));
    }

    #[tokio::test]
    async fn test_reopen_restores_counter_from_rows() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteStagingFactory::new(dir.path());

        let store = factory.create("job-7").await.unwrap();
        store
            .insert_batch(&[observation("p1"), observation("p2"), observation("p3")])
            .await;
        store.close(false, 7).await;
        assert!(factory.expires_at("job-7").is_some());

        let reopened = factory.reopen("job-7").await.unwrap();
        assert_eq!(reopened.record_count(), 3);
        let page = reopened.read_page(0, 10).await.unwrap();
        assert_eq!(page[2].product_id, "p3");
        reopened.close(true, 0).await;
    }

    #[tokio::test]
    async fn test_reopen_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteStagingFactory::new(dir.path());
        match factory.reopen("nope").await {
            Err(Error::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
            Ok(_) => panic!("expected NotFound"),
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteStagingFactory::new(dir.path());

        for (job, retention_days) in [("old", 1), ("fresh", 5)] {
            let store = factory.create(job).await.unwrap();
            store.insert(&observation("p1")).await;
            store.close(false, retention_days).await;
        }

        assert_eq!(factory.sweep_expired(Utc::now()).unwrap(), 0);

        let removed = factory.sweep_expired(Utc::now() + Duration::days(2)).unwrap();
        assert_eq!(removed, 1);
        assert!(!factory.exists("old"));
        assert!(factory.exists("fresh"));
    }

    #[tokio::test]
    async fn test_create_replaces_leftover_file() {
        let dir = tempfile::tempdir().unwrap();
        let factory = SqliteStagingFactory::new(dir.path());

        let first = factory.create("dup").await.unwrap();
        first.insert(&observation("p1")).await;
        first.close(false, 7).await;

        let second = factory.create("dup").await.unwrap();
        assert_eq!(second.record_count(), 0);
        assert!(factory.expires_at("dup").is_none());
        second.close(true, 0).await;
    }
}
