//! Snapshot service writing point-in-time copies of the primary database
//! into a local directory.
//!
//! Each snapshot is `<dir>/<id>.db` plus a `<dir>/<id>.json` sidecar that
//! holds its status, tags and creation time. The copy is taken with
//! `VACUUM INTO`, which yields a consistent single-file image even while
//! the primary is being written in WAL mode.

use async_trait::async_trait;
use chrono::Utc;
use diesel::connection::Connection;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::{debug, error, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pricewatch_core::backup::{Snapshot, SnapshotService, SnapshotStatus, SnapshotTags};
use pricewatch_core::errors::{DatabaseError, Error, Result};

use crate::errors::{IntoCore, StorageError};

pub struct FileSnapshotService {
    db_path: PathBuf,
    snapshot_dir: PathBuf,
}

impl FileSnapshotService {
    pub fn new(db_path: impl Into<PathBuf>, snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            snapshot_dir: snapshot_dir.into(),
        }
    }

    fn image_path(&self, id: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{}.db", id))
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{}.json", id))
    }
}

fn write_sidecar(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_vec_pretty(snapshot).into_core()?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_sidecar(path: &Path) -> Result<Option<Snapshot>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).into_core()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn vacuum_into(source: &Path, target: &Path) -> Result<()> {
    let source = source
        .to_str()
        .ok_or_else(|| Error::Snapshot(format!("non UTF-8 database path {:?}", source)))?;
    let target = target
        .to_str()
        .ok_or_else(|| Error::Snapshot(format!("non UTF-8 snapshot path {:?}", target)))?;

    let mut conn = SqliteConnection::establish(source).map_err(StorageError::from)?;
    diesel::sql_query("VACUUM INTO ?")
        .bind::<Text, _>(target)
        .execute(&mut conn)
        .into_core()?;
    Ok(())
}

#[async_trait]
impl SnapshotService for FileSnapshotService {
    async fn create_snapshot(&self, prefix: &str, tags: &SnapshotTags) -> Result<Snapshot> {
        fs::create_dir_all(&self.snapshot_dir)?;
        if !self.db_path.exists() {
            return Err(Error::Database(DatabaseError::BackupFailed(format!(
                "database {} does not exist",
                self.db_path.display()
            ))));
        }

        let created_at = Utc::now();
        let short = uuid::Uuid::new_v4().simple().to_string();
        let id = format!(
            "{}-{}-{}",
            prefix,
            created_at.format("%Y%m%d%H%M%S"),
            &short[..8]
        );
        let snapshot = Snapshot {
            id: id.clone(),
            status: SnapshotStatus::Creating,
            tags: tags.clone(),
            created_at,
        };

        let sidecar = self.sidecar_path(&id);
        write_sidecar(&sidecar, &snapshot)?;

        let source = self.db_path.clone();
        let target = self.image_path(&id);
        let pending = snapshot.clone();
        // Detached: the caller gets the snapshot back in `creating` state.
        tokio::task::spawn_blocking(move || {
            let status = match vacuum_into(&source, &target) {
                Ok(()) => {
                    info!("Snapshot {} written to {}", pending.id, target.display());
                    SnapshotStatus::Available
                }
                Err(e) => {
                    error!("Snapshot {} failed: {}", pending.id, e);
                    SnapshotStatus::Failed
                }
            };
            let finished = Snapshot { status, ..pending };
            if let Err(e) = write_sidecar(&sidecar, &finished) {
                error!("Failed to record status of snapshot {}: {}", finished.id, e);
            }
        });

        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        read_sidecar(&self.sidecar_path(id))
    }

    async fn list_snapshots(&self, prefix: &str) -> Result<Vec<Snapshot>> {
        let entries = match fs::read_dir(&self.snapshot_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let matches_prefix = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.starts_with(prefix))
                .unwrap_or(false);
            if !matches_prefix {
                continue;
            }
            match read_sidecar(&path) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(e) => debug!("Skipping unreadable sidecar {}: {}", path.display(), e),
            }
        }

        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(snapshots)
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let sidecar = self.sidecar_path(id);
        if !sidecar.exists() {
            return Err(Error::NotFound(format!("snapshot {}", id)));
        }
        match fs::remove_file(self.image_path(id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        fs::remove_file(&sidecar)?;
        info!("Deleted snapshot {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::setup;
    use pricewatch_core::backup::BackupCoordinator;
    use std::sync::Arc;
    use std::time::Duration;

    fn tags() -> SnapshotTags {
        SnapshotTags::from([
            ("jobId".to_string(), "job-1".to_string()),
            ("imported".to_string(), "42".to_string()),
        ])
    }

    #[tokio::test]
    async fn test_snapshot_becomes_available() {
        let (dir, _pool, _writer, db_path) = setup();
        let service = Arc::new(FileSnapshotService::new(&db_path, dir.path().join("snapshots")));

        let snapshot = service.create_snapshot("price-sync", &tags()).await.unwrap();
        assert_eq!(snapshot.status, SnapshotStatus::Creating);
        assert!(snapshot.id.starts_with("price-sync-"));

        let coordinator = BackupCoordinator::new(service.clone(), "price-sync", 7);
        let ready = coordinator
            .wait_for_available(&snapshot.id, Duration::from_secs(10), Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(ready.tags, tags());
        assert!(service.image_path(&snapshot.id).exists());
    }

    #[tokio::test]
    async fn test_missing_database_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileSnapshotService::new(dir.path().join("absent.db"), dir.path().join("snaps"));
        assert!(service.create_snapshot("price-sync", &tags()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_and_sorts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_dir = dir.path().join("snaps");
        fs::create_dir_all(&snapshot_dir).unwrap();
        let service = FileSnapshotService::new(dir.path().join("primary.db"), &snapshot_dir);

        let now = Utc::now();
        for (id, age_days) in [("price-sync-b", 1), ("price-sync-a", 3), ("manual-x", 5)] {
            let snapshot = Snapshot {
                id: id.to_string(),
                status: SnapshotStatus::Available,
                tags: SnapshotTags::new(),
                created_at: now - chrono::Duration::days(age_days),
            };
            write_sidecar(&service.sidecar_path(id), &snapshot).unwrap();
        }

        let listed = service.list_snapshots("price-sync").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["price-sync-a", "price-sync-b"]);
    }

    #[tokio::test]
    async fn test_delete_removes_image_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_dir = dir.path().join("snaps");
        fs::create_dir_all(&snapshot_dir).unwrap();
        let service = FileSnapshotService::new(dir.path().join("primary.db"), &snapshot_dir);

        let snapshot = Snapshot {
            id: "price-sync-old".to_string(),
            status: SnapshotStatus::Available,
            tags: SnapshotTags::new(),
            created_at: Utc::now(),
        };
        write_sidecar(&service.sidecar_path(&snapshot.id), &snapshot).unwrap();
        fs::write(service.image_path(&snapshot.id), b"image").unwrap();

        service.delete_snapshot(&snapshot.id).await.unwrap();
        assert!(service.get_snapshot(&snapshot.id).await.unwrap().is_none());
        assert!(!service.image_path(&snapshot.id).exists());
        assert!(matches!(
            service.delete_snapshot(&snapshot.id).await,
            Err(Error::NotFound(_))
        ));
    }
}
