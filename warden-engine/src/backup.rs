// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pre-destruction snapshots
//!
//! Before a destructive operation commits, the prior state of the target is
//! copied into the backup store (`.backups` under the workspace root by
//! default) together with a JSON record carrying a checksum of the stored
//! bytes. Restore verifies that checksum before writing anything back, so a
//! rotted backup is reported instead of silently resurrected.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warden_core::{
    config::BackupConfig, BackupRetention, CancelToken, EntryKind, FsError, FsResult,
    ResolvedPath, WorkspaceRoot,
};

use crate::{checksum, fsops};

/// Disambiguates snapshots taken within the same millisecond.
static SNAPSHOT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metadata for one stored backup generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    /// Workspace-relative path the backup was taken from, `/`-rooted.
    pub original_path: String,
    /// Absolute path of the stored copy.
    pub backup_path: PathBuf,
    pub created: DateTime<Utc>,
    /// Blake3 of the stored file, or of the tree manifest for directories.
    pub checksum: String,
    pub kind: EntryKind,
    pub size_bytes: u64,
}

pub struct BackupManager {
    root: WorkspaceRoot,
    config: BackupConfig,
}

impl BackupManager {
    pub fn new(root: WorkspaceRoot, config: BackupConfig) -> Self {
        Self { root, config }
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.as_path().join(&self.config.dir_name)
    }

    /// Snapshot the current state of `path`.
    ///
    /// Returns `Ok(None)` when the policy disables backups — callers can
    /// tell "no backup requested" apart from "backup failed".
    pub async fn snapshot(&self, path: &ResolvedPath) -> FsResult<Option<BackupRecord>> {
        if !self.config.enabled {
            return Ok(None);
        }
        if path.is_root() {
            return Err(FsError::PermissionDenied(
                "cannot snapshot the workspace root".into(),
            ));
        }

        let meta = tokio::fs::symlink_metadata(path.canonical())
            .await
            .map_err(|e| FsError::from_io(e, path.canonical()))?;

        let store = self.store_dir();
        tokio::fs::create_dir_all(&store)
            .await
            .map_err(|e| FsError::from_io(e, &store))?;

        if self.config.retention == BackupRetention::LatestOnly {
            self.remove_generations_of(&path.display_relative()).await?;
        }

        let created = Utc::now();
        let seq = SNAPSHOT_SEQ.fetch_add(1, Ordering::Relaxed);
        let sanitized = sanitize(&path.display_relative());
        let id = format!("{sanitized}.{}-{seq}", created.timestamp_millis());
        let backup_path = store.join(format!("{id}.bak"));

        let (kind, size_bytes, digest) = if meta.is_dir() {
            let bytes = fsops::copy_tree(
                path.canonical().to_path_buf(),
                backup_path.clone(),
                true,
                CancelToken::new(),
            )
            .await?;
            let digest = fsops::tree_checksum(backup_path.clone()).await?;
            (EntryKind::Directory, bytes, digest)
        } else {
            let bytes = fsops::copy_file_atomic(
                path.canonical().to_path_buf(),
                backup_path.clone(),
                true,
                CancelToken::new(),
            )
            .await?;
            let digest = checksum::blake3_file(&backup_path).await?;
            (EntryKind::File, bytes, digest)
        };

        let record = BackupRecord {
            id: id.clone(),
            original_path: path.display_relative(),
            backup_path,
            created,
            checksum: digest,
            kind,
            size_bytes,
        };

        let record_path = store.join(format!("{id}.json"));
        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| FsError::Io(std::io::Error::other(e)))?;
        fsops::atomic_write(record_path, json.into()).await?;

        info!(path = %record.original_path, id = %record.id, "backup snapshot taken");
        Ok(Some(record))
    }

    /// Write a backup back to its original path, verifying the stored
    /// checksum first.
    pub async fn restore(&self, record: &BackupRecord) -> FsResult<()> {
        let actual = match record.kind {
            EntryKind::Directory => fsops::tree_checksum(record.backup_path.clone()).await?,
            _ => checksum::blake3_file(&record.backup_path).await?,
        };
        if actual != record.checksum {
            return Err(FsError::BackupCorrupted(format!(
                "{}: stored checksum {} but content hashes to {}",
                record.id, record.checksum, actual
            )));
        }

        let dest = self
            .root
            .as_path()
            .join(record.original_path.trim_start_matches('/'));
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(e, parent))?;
        }

        match record.kind {
            EntryKind::Directory => {
                if tokio::fs::symlink_metadata(&dest).await.is_ok() {
                    remove_any(&dest).await?;
                }
                fsops::copy_tree(
                    record.backup_path.clone(),
                    dest.clone(),
                    true,
                    CancelToken::new(),
                )
                .await?;
            }
            _ => {
                fsops::copy_file_atomic(
                    record.backup_path.clone(),
                    dest.clone(),
                    true,
                    CancelToken::new(),
                )
                .await?;
            }
        }

        info!(path = %record.original_path, id = %record.id, "backup restored");
        Ok(())
    }

    /// All records in the store, newest first.
    pub async fn list(&self) -> FsResult<Vec<BackupRecord>> {
        let store = self.store_dir();
        let mut read_dir = match tokio::fs::read_dir(&store).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FsError::from_io(e, &store)),
        };

        let mut records = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(e, &store))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| FsError::from_io(e, &path))?;
                match serde_json::from_slice::<BackupRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable backup record"),
                }
            }
        }
        records.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(records)
    }

    pub async fn find(&self, id: &str) -> FsResult<BackupRecord> {
        self.list()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| FsError::NotFound(format!("backup {id}")))
    }

    /// Apply the age and total-size prune limits. Returns removed records.
    pub async fn prune(&self) -> FsResult<Vec<BackupRecord>> {
        let records = self.list().await?;
        let now = Utc::now();
        let mut keep_total = 0u64;
        let mut removed = Vec::new();

        // Newest first; size budget protects recent generations.
        for record in records {
            let too_old = self.config.max_age_secs.is_some_and(|limit| {
                (now - record.created).num_seconds() > limit as i64
            });
            let over_budget = self
                .config
                .max_total_bytes
                .is_some_and(|cap| keep_total + record.size_bytes > cap);

            if too_old || over_budget {
                self.remove_record(&record).await?;
                removed.push(record);
            } else {
                keep_total += record.size_bytes;
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "pruned backups");
        }
        Ok(removed)
    }

    async fn remove_generations_of(&self, original_path: &str) -> FsResult<()> {
        for record in self.list().await? {
            if record.original_path == original_path {
                self.remove_record(&record).await?;
            }
        }
        Ok(())
    }

    async fn remove_record(&self, record: &BackupRecord) -> FsResult<()> {
        if tokio::fs::symlink_metadata(&record.backup_path).await.is_ok() {
            remove_any(&record.backup_path).await?;
        }
        let json = record.backup_path.with_extension("json");
        if tokio::fs::symlink_metadata(&json).await.is_ok() {
            tokio::fs::remove_file(&json)
                .await
                .map_err(|e| FsError::from_io(e, &json))?;
        }
        Ok(())
    }
}

async fn remove_any(path: &std::path::Path) -> FsResult<()> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| FsError::from_io(e, path))?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(|e| FsError::from_io(e, path))
    } else {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| FsError::from_io(e, path))
    }
}

fn sanitize(relative: &str) -> String {
    relative
        .trim_start_matches('/')
        .replace(['/', '\\'], "__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir, config: BackupConfig) -> BackupManager {
        let root = WorkspaceRoot::open(dir.path()).unwrap();
        BackupManager::new(root, config)
    }

    fn resolved(dir: &TempDir, raw: &str) -> ResolvedPath {
        WorkspaceRoot::open(dir.path()).unwrap().resolve(raw).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_disabled_is_none_not_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"x").unwrap();
        let config = BackupConfig {
            enabled: false,
            ..Default::default()
        };
        let record = manager(&dir, config)
            .snapshot(&resolved(&dir, "f.txt"))
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_and_restore_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("doc.txt"), b"original").unwrap();
        let mgr = manager(&dir, BackupConfig::default());

        let record = mgr
            .snapshot(&resolved(&dir, "doc.txt"))
            .await
            .unwrap()
            .expect("backups enabled");
        assert_eq!(record.original_path, "/doc.txt");
        assert_eq!(record.size_bytes, 8);

        std::fs::write(dir.path().join("doc.txt"), b"clobbered").unwrap();
        mgr.restore(&record).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("doc.txt")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_restore_after_deletion_recreates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("gone.txt"), b"bytes").unwrap();
        let mgr = manager(&dir, BackupConfig::default());

        let record = mgr
            .snapshot(&resolved(&dir, "gone.txt"))
            .await
            .unwrap()
            .unwrap();
        std::fs::remove_file(dir.path().join("gone.txt")).unwrap();

        mgr.restore(&record).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("gone.txt")).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_corrupted_backup_detected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"good").unwrap();
        let mgr = manager(&dir, BackupConfig::default());

        let record = mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap().unwrap();
        std::fs::write(&record.backup_path, b"tampered").unwrap();

        let err = mgr.restore(&record).await.unwrap_err();
        assert!(matches!(err, FsError::BackupCorrupted(_)));
        // Original untouched.
        assert_eq!(std::fs::read(dir.path().join("f.txt")).unwrap(), b"good");
    }

    #[tokio::test]
    async fn test_directory_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("proj/sub")).unwrap();
        std::fs::write(dir.path().join("proj/a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("proj/sub/b.txt"), b"b").unwrap();
        let mgr = manager(&dir, BackupConfig::default());

        let record = mgr.snapshot(&resolved(&dir, "proj")).await.unwrap().unwrap();
        assert_eq!(record.kind, EntryKind::Directory);

        std::fs::remove_dir_all(dir.path().join("proj")).unwrap();
        mgr.restore(&record).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("proj/sub/b.txt")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_latest_only_supersedes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"v1").unwrap();
        let config = BackupConfig {
            retention: BackupRetention::LatestOnly,
            ..Default::default()
        };
        let mgr = manager(&dir, config);

        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();
        std::fs::write(dir.path().join("f.txt"), b"v2").unwrap();
        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();

        let records = mgr.list().await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_keep_all_accumulates_generations() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"v1").unwrap();
        let mgr = manager(&dir, BackupConfig::default());

        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();
        std::fs::write(dir.path().join("f.txt"), b"v2").unwrap();
        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();

        assert_eq!(mgr.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_prune_by_total_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), vec![0u8; 1000]).unwrap();
        let config = BackupConfig {
            max_total_bytes: Some(1500),
            ..Default::default()
        };
        let mgr = manager(&dir, config);

        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();
        mgr.snapshot(&resolved(&dir, "f.txt")).await.unwrap();
        assert_eq!(mgr.list().await.unwrap().len(), 2);

        let removed = mgr.prune().await.unwrap();
        assert_eq!(removed.len(), 1);
        let remaining = mgr.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        // The newest generation survives.
        assert!(remaining[0].created >= removed[0].created);
    }
}
