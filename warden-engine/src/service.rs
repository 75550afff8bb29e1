// SPDX-License-Identifier: AGPL-3.0-or-later
//! The public file-operation surface
//!
//! Every operation resolves its path arguments through the workspace root
//! before touching the filesystem and fails fast on resolution errors.
//! Destructive operations (delete, move, overwrite) serialize per canonical
//! path and snapshot the prior state through the backup manager before they
//! commit. Read-only operations never block on those locks.

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info};
use warden_core::{
    operations::{
        CopyOptions, DeleteOptions, InfoOptions, ListOptions, MkdirOptions, MoveOptions,
        ReadOptions, SearchOptions, WriteOptions,
    },
    CancelToken, EngineConfig, FileEntry, FsError, FsResult, ResolvedPath, WorkspaceRoot,
};
use warden_search::{
    order_matches, ContentMatcher, NamePattern, SearchEngine, SearchSpec, SearchStream,
};

use crate::backup::BackupManager;
use crate::locks::LockRegistry;
use crate::payload::{
    CopyResult, DeleteResult, ListResult, MkdirResult, MoveResult, MoveStrategy, ReadResult,
    SearchOutcome, WriteResult,
};
use crate::watch::ChangeStream;
use crate::{checksum, fsops, watch};

/// Bytes sniffed for the NUL probe in binary detection.
const BINARY_PROBE_LEN: usize = 8192;

pub struct FileOperationService {
    root: WorkspaceRoot,
    config: RwLock<EngineConfig>,
    locks: LockRegistry,
}

impl FileOperationService {
    /// Open the configured workspace root and build a service around it.
    /// The root is validated once here and immutable afterwards.
    pub fn new(config: EngineConfig) -> FsResult<Self> {
        let root = WorkspaceRoot::open(&config.workspace_root)?;
        Ok(Self {
            root,
            config: RwLock::new(config),
            locks: LockRegistry::new(),
        })
    }

    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    pub fn resolve(&self, raw: &str) -> FsResult<ResolvedPath> {
        self.root.resolve(raw)
    }

    /// Current configuration snapshot.
    pub fn get_config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Update one mutable configuration key; persistence is the caller's
    /// concern. Returns the updated snapshot.
    pub fn set_config(&self, key: &str, value: &str) -> FsResult<EngineConfig> {
        let mut config = self.config.write();
        config.apply_update(key, value)?;
        Ok(config.clone())
    }

    /// Backup manager bound to the current policy.
    pub fn backups(&self) -> BackupManager {
        BackupManager::new(self.root.clone(), self.config.read().backup.clone())
    }

    /// List the immediate children of a directory (non-recursive).
    pub async fn list(&self, path: &str, opts: &ListOptions) -> FsResult<ListResult> {
        let resolved = self.resolve(path)?;
        let config = self.get_config();

        let meta = tokio::fs::metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(resolved.display_relative()));
        }

        let filter = match &opts.filter_pattern {
            Some(pattern) => Some(NamePattern::new(pattern, true)?),
            None => None,
        };

        let mut read_dir = tokio::fs::read_dir(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;

        let mut entries = Vec::new();
        while let Some(child) = read_dir
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?
        {
            let name = match child.file_name().into_string() {
                Ok(n) => n,
                Err(_) => continue,
            };
            if !opts.include_hidden && name.starts_with('.') {
                continue;
            }
            if let Some(filter) = &filter {
                if !filter.matches(&name) {
                    continue;
                }
            }

            let display = if resolved.is_root() {
                format!("/{name}")
            } else {
                format!("{}/{name}", resolved.display_relative())
            };

            let entry = if opts.include_metadata {
                let child_meta = tokio::fs::symlink_metadata(child.path())
                    .await
                    .map_err(|e| FsError::from_io(e, &child.path()))?;
                let mut entry = fsops::entry_from_metadata(&name, &display, &child_meta, true);
                if config.checksums_in_listings
                    && child_meta.is_file()
                    && !config.checksum_algorithms.is_empty()
                {
                    entry.checksums = Some(
                        checksum::compute(&child.path(), &config.checksum_algorithms).await?,
                    );
                }
                entry
            } else {
                let file_type = child
                    .file_type()
                    .await
                    .map_err(|e| FsError::from_io(e, &child.path()))?;
                let kind = if file_type.is_symlink() {
                    warden_core::EntryKind::Symlink
                } else if file_type.is_dir() {
                    warden_core::EntryKind::Directory
                } else if file_type.is_file() {
                    warden_core::EntryKind::File
                } else {
                    warden_core::EntryKind::Other
                };
                FileEntry::new(&name, &display, kind)
            };
            entries.push(entry);
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ListResult {
            path: resolved.display_relative(),
            total_count: entries.len(),
            entries,
        })
    }

    /// Read a file, enforcing the size ceiling before any content I/O.
    pub async fn read(&self, path: &str, opts: &ReadOptions) -> FsResult<ReadResult> {
        let resolved = self.resolve(path)?;
        let config = self.get_config();

        let encoding = opts.encoding.to_ascii_lowercase();
        if !matches!(encoding.as_str(), "utf-8" | "utf8") {
            return Err(FsError::Encoding(format!(
                "unsupported encoding: {}",
                opts.encoding
            )));
        }

        let meta = tokio::fs::metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        if meta.is_dir() {
            return Err(FsError::NotAFile(resolved.display_relative()));
        }

        let limit = opts
            .max_size_bytes
            .map(|m| m.min(config.max_file_size_bytes))
            .unwrap_or(config.max_file_size_bytes);
        if meta.len() > limit {
            return Err(FsError::SizeLimitExceeded {
                path: resolved.display_relative(),
                actual: meta.len(),
                limit,
            });
        }

        let bytes = tokio::fs::read(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;

        let size = bytes.len() as u64;
        let size_formatted = warden_core::entry::format_size(size);
        let checksums = if config.checksums_in_listings && !config.checksum_algorithms.is_empty() {
            Some(checksum::compute(resolved.canonical(), &config.checksum_algorithms).await?)
        } else {
            None
        };

        let sniffed = infer::get(&bytes);
        let looks_binary = sniffed
            .map(|t| t.matcher_type() != infer::MatcherType::Text)
            .unwrap_or_else(|| bytes[..bytes.len().min(BINARY_PROBE_LEN)].contains(&0));

        if looks_binary {
            return Ok(ReadResult {
                path: resolved.display_relative(),
                binary: true,
                content: None,
                encoding: None,
                lines: None,
                detected_type: sniffed.map(|t| t.mime_type().to_string()),
                size,
                size_formatted,
                checksums,
            });
        }

        let content = String::from_utf8(bytes).map_err(|_| {
            FsError::Encoding(format!(
                "{} is not valid utf-8",
                resolved.display_relative()
            ))
        })?;
        let lines = content.lines().count();

        Ok(ReadResult {
            path: resolved.display_relative(),
            binary: false,
            content: Some(content),
            encoding: Some("utf-8".to_string()),
            lines: Some(lines),
            detected_type: None,
            size,
            size_formatted,
            checksums,
        })
    }

    /// Write a file atomically, snapshotting any file being overwritten.
    pub async fn write(&self, path: &str, contents: Bytes, opts: &WriteOptions) -> FsResult<WriteResult> {
        let resolved = self.resolve(path)?;
        let config = self.get_config();

        if contents.len() as u64 > config.max_file_size_bytes {
            return Err(FsError::SizeLimitExceeded {
                path: resolved.display_relative(),
                actual: contents.len() as u64,
                limit: config.max_file_size_bytes,
            });
        }

        let existing = tokio::fs::symlink_metadata(resolved.canonical()).await.ok();
        if let Some(meta) = &existing {
            if meta.is_dir() {
                return Err(FsError::NotAFile(resolved.display_relative()));
            }
            if !opts.overwrite {
                return Err(FsError::AlreadyExists(resolved.display_relative()));
            }
        }

        if let Some(parent) = resolved.canonical().parent() {
            if tokio::fs::metadata(parent).await.is_err() {
                if opts.create_parents {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| FsError::from_io(e, parent))?;
                } else {
                    return Err(FsError::NotFound(parent.display().to_string()));
                }
            }
        }

        let backup = if existing.is_some() {
            // Overwrite is destructive; serialize and snapshot first.
            let _guard = self.locks.acquire(resolved.lock_key()).await;
            let backup = self.backups().snapshot(&resolved).await?;
            fsops::atomic_write(resolved.canonical().to_path_buf(), contents).await?;
            backup
        } else {
            fsops::atomic_write(resolved.canonical().to_path_buf(), contents).await?;
            None
        };

        let meta = tokio::fs::metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        let entry = fsops::entry_from_metadata(
            resolved.file_name().unwrap_or_default(),
            &resolved.display_relative(),
            &meta,
            true,
        );
        info!(path = %resolved, bytes = entry.size, "wrote file");
        Ok(WriteResult { entry, backup })
    }

    /// Stat one path.
    pub async fn get_info(&self, path: &str, opts: &InfoOptions) -> FsResult<FileEntry> {
        let resolved = self.resolve(path)?;
        let config = self.get_config();

        let meta = tokio::fs::symlink_metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;

        let name = resolved.file_name().unwrap_or_default().to_string();
        let mut entry = fsops::entry_from_metadata(
            &name,
            &resolved.display_relative(),
            &meta,
            opts.include_permissions,
        );

        if opts.include_checksums && meta.is_file() && !config.checksum_algorithms.is_empty() {
            entry.checksums =
                Some(checksum::compute(resolved.canonical(), &config.checksum_algorithms).await?);
        }
        Ok(entry)
    }

    /// Create a directory. Idempotent when the target already is one.
    pub async fn create_dir(&self, path: &str, opts: &MkdirOptions) -> FsResult<MkdirResult> {
        let resolved = self.resolve(path)?;

        match tokio::fs::symlink_metadata(resolved.canonical()).await {
            Ok(meta) if meta.is_dir() => {
                let entry = fsops::entry_from_metadata(
                    resolved.file_name().unwrap_or_default(),
                    &resolved.display_relative(),
                    &meta,
                    true,
                );
                return Ok(MkdirResult {
                    entry,
                    created: false,
                });
            }
            Ok(_) => return Err(FsError::AlreadyExists(resolved.display_relative())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(FsError::from_io(e, resolved.canonical())),
        }

        let result = if opts.create_parents {
            tokio::fs::create_dir_all(resolved.canonical()).await
        } else {
            tokio::fs::create_dir(resolved.canonical()).await
        };
        result.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                FsError::NotFound(format!("parent of {}", resolved.display_relative()))
            }
            _ => FsError::from_io(e, resolved.canonical()),
        })?;

        #[cfg(unix)]
        if let Some(mode) = opts.mode {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(
                resolved.canonical(),
                std::fs::Permissions::from_mode(mode),
            )
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        }

        let meta = tokio::fs::metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        let entry = fsops::entry_from_metadata(
            resolved.file_name().unwrap_or_default(),
            &resolved.display_relative(),
            &meta,
            true,
        );
        debug!(path = %resolved, "created directory");
        Ok(MkdirResult {
            entry,
            created: true,
        })
    }

    /// Delete a file or directory. Requires `confirm=true`; snapshots the
    /// target first when backups are enabled.
    pub async fn delete(&self, path: &str, opts: &DeleteOptions) -> FsResult<DeleteResult> {
        let resolved = self.resolve(path)?;
        if resolved.is_root() {
            return Err(FsError::PermissionDenied(
                "cannot delete the workspace root".into(),
            ));
        }

        tokio::fs::symlink_metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;

        if !opts.confirm {
            return Err(FsError::ConfirmationRequired(resolved.display_relative()));
        }

        let _guard = self.locks.acquire(resolved.lock_key()).await;

        // Re-check under the lock: a concurrent delete may have won.
        let meta = tokio::fs::symlink_metadata(resolved.canonical())
            .await
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;

        let backup = self.backups().snapshot(&resolved).await?;

        if meta.is_dir() {
            if !opts.recursive {
                let mut read_dir = tokio::fs::read_dir(resolved.canonical())
                    .await
                    .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
                if read_dir
                    .next_entry()
                    .await
                    .map_err(|e| FsError::from_io(e, resolved.canonical()))?
                    .is_some()
                {
                    return Err(FsError::DirectoryNotEmpty(resolved.display_relative()));
                }
                tokio::fs::remove_dir(resolved.canonical())
                    .await
                    .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
            } else {
                tokio::fs::remove_dir_all(resolved.canonical())
                    .await
                    .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
            }
        } else {
            tokio::fs::remove_file(resolved.canonical())
                .await
                .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        }

        info!(path = %resolved, backed_up = backup.is_some(), "deleted");
        Ok(DeleteResult {
            path: resolved.display_relative(),
            deleted: true,
            backup,
        })
    }

    /// Copy a file or directory tree, verifying checksums afterwards.
    pub async fn copy(&self, source: &str, destination: &str, opts: &CopyOptions) -> FsResult<CopyResult> {
        self.copy_cancelable(source, destination, opts, &CancelToken::new())
            .await
    }

    pub async fn copy_cancelable(
        &self,
        source: &str,
        destination: &str,
        opts: &CopyOptions,
        cancel: &CancelToken,
    ) -> FsResult<CopyResult> {
        let src = self.resolve(source)?;
        let dest = self.resolve(destination)?;

        let src_meta = tokio::fs::metadata(src.canonical())
            .await
            .map_err(|e| FsError::from_io(e, src.canonical()))?;
        self.check_distinct(&src, &dest, src_meta.is_dir())?;

        let dest_exists = tokio::fs::symlink_metadata(dest.canonical()).await.is_ok();
        if dest_exists && !opts.overwrite {
            return Err(FsError::AlreadyExists(dest.display_relative()));
        }
        if let Some(parent) = dest.canonical().parent() {
            if tokio::fs::metadata(parent).await.is_err() {
                return Err(FsError::NotFound(parent.display().to_string()));
            }
        }

        let mut replaced_backup = None;
        {
            let _guard = self.locks.acquire(dest.lock_key()).await;
            if dest_exists {
                replaced_backup = self.backups().snapshot(&dest).await?;
                remove_any(dest.canonical()).await?;
            }

            if src_meta.is_dir() {
                fsops::copy_tree(
                    src.canonical().to_path_buf(),
                    dest.canonical().to_path_buf(),
                    opts.preserve_metadata,
                    cancel.clone(),
                )
                .await?;
                let src_sum = fsops::tree_checksum(src.canonical().to_path_buf()).await?;
                let dest_sum = fsops::tree_checksum(dest.canonical().to_path_buf()).await?;
                if src_sum != dest_sum {
                    return Err(FsError::Integrity(format!(
                        "tree checksums differ after copying {} to {}",
                        src.display_relative(),
                        dest.display_relative()
                    )));
                }
            } else {
                fsops::copy_file_atomic(
                    src.canonical().to_path_buf(),
                    dest.canonical().to_path_buf(),
                    opts.preserve_metadata,
                    cancel.clone(),
                )
                .await?;
                let src_sum = checksum::blake3_file(src.canonical()).await?;
                let dest_sum = checksum::blake3_file(dest.canonical()).await?;
                if src_sum != dest_sum {
                    return Err(FsError::Integrity(format!(
                        "checksums differ after copying {} to {}",
                        src.display_relative(),
                        dest.display_relative()
                    )));
                }
            }
        }

        let meta = tokio::fs::metadata(dest.canonical())
            .await
            .map_err(|e| FsError::from_io(e, dest.canonical()))?;
        let entry = fsops::entry_from_metadata(
            dest.file_name().unwrap_or_default(),
            &dest.display_relative(),
            &meta,
            true,
        );
        info!(source = %src, destination = %dest, "copied");
        Ok(CopyResult {
            source: src.display_relative(),
            destination: dest.display_relative(),
            entry,
            verified: true,
            replaced_backup,
        })
    }

    /// Move or rename. Falls back to copy+delete when rename is refused
    /// (cross-device); the source is only removed, with a backup, after the
    /// destination write verified.
    pub async fn move_entry(&self, source: &str, destination: &str, opts: &MoveOptions) -> FsResult<MoveResult> {
        let src = self.resolve(source)?;
        let dest = self.resolve(destination)?;

        let src_meta = tokio::fs::metadata(src.canonical())
            .await
            .map_err(|e| FsError::from_io(e, src.canonical()))?;
        self.check_distinct(&src, &dest, src_meta.is_dir())?;

        let dest_exists = tokio::fs::symlink_metadata(dest.canonical()).await.is_ok();
        if dest_exists && !opts.overwrite {
            return Err(FsError::AlreadyExists(dest.display_relative()));
        }
        if let Some(parent) = dest.canonical().parent() {
            if tokio::fs::metadata(parent).await.is_err() {
                return Err(FsError::NotFound(parent.display().to_string()));
            }
        }

        // Both paths are destructive targets; lock in sorted order so two
        // opposite moves cannot deadlock.
        let mut keys = [src.lock_key(), dest.lock_key()];
        keys.sort();
        let _guard_a = self.locks.acquire(keys[0].clone()).await;
        let _guard_b = self.locks.acquire(keys[1].clone()).await;

        let mut replaced_backup = None;
        if dest_exists {
            replaced_backup = self.backups().snapshot(&dest).await?;
            remove_any(dest.canonical()).await?;
        }

        let (strategy, source_backup) =
            match tokio::fs::rename(src.canonical(), dest.canonical()).await {
                Ok(()) => (MoveStrategy::Rename, None),
                Err(rename_err) => {
                    debug!(
                        source = %src,
                        destination = %dest,
                        error = %rename_err,
                        "rename refused, falling back to copy+delete"
                    );
                    let cancel = CancelToken::new();
                    if src_meta.is_dir() {
                        fsops::copy_tree(
                            src.canonical().to_path_buf(),
                            dest.canonical().to_path_buf(),
                            true,
                            cancel,
                        )
                        .await?;
                        let src_sum = fsops::tree_checksum(src.canonical().to_path_buf()).await?;
                        let dest_sum = fsops::tree_checksum(dest.canonical().to_path_buf()).await?;
                        if src_sum != dest_sum {
                            return Err(FsError::Integrity(format!(
                                "tree checksums differ after moving {} to {}",
                                src.display_relative(),
                                dest.display_relative()
                            )));
                        }
                    } else {
                        fsops::copy_file_atomic(
                            src.canonical().to_path_buf(),
                            dest.canonical().to_path_buf(),
                            true,
                            cancel,
                        )
                        .await?;
                        let src_sum = checksum::blake3_file(src.canonical()).await?;
                        let dest_sum = checksum::blake3_file(dest.canonical()).await?;
                        if src_sum != dest_sum {
                            return Err(FsError::Integrity(format!(
                                "checksums differ after moving {} to {}",
                                src.display_relative(),
                                dest.display_relative()
                            )));
                        }
                    }
                    // Destination verified; now the source removal is the
                    // destructive step and gets the backup.
                    let backup = self.backups().snapshot(&src).await?;
                    remove_any(src.canonical()).await?;
                    (MoveStrategy::CopyDelete, backup)
                }
            };

        let meta = tokio::fs::metadata(dest.canonical())
            .await
            .map_err(|e| FsError::from_io(e, dest.canonical()))?;
        let entry = fsops::entry_from_metadata(
            dest.file_name().unwrap_or_default(),
            &dest.display_relative(),
            &meta,
            true,
        );
        info!(source = %src, destination = %dest, ?strategy, "moved");
        Ok(MoveResult {
            source: src.display_relative(),
            destination: dest.display_relative(),
            entry,
            strategy,
            replaced_backup,
            source_backup,
        })
    }

    /// Collected, ordered search results: filename matches first, then
    /// content-only matches, lexicographic within each group.
    pub async fn search(&self, path: &str, opts: &SearchOptions) -> FsResult<SearchOutcome> {
        let (mut stream, display) = self.start_search(path, opts)?;
        let mut matches = stream.collect().await;
        let truncated = stream.hit_result_cap();
        order_matches(&mut matches);
        Ok(SearchOutcome {
            path: display,
            pattern: opts.pattern.clone(),
            total_matches: matches.len(),
            matches,
            truncated,
        })
    }

    /// Raw lazy match stream in walk order, cancelable mid-traversal.
    pub fn search_stream(&self, path: &str, opts: &SearchOptions) -> FsResult<SearchStream> {
        let (stream, _) = self.start_search(path, opts)?;
        Ok(stream)
    }

    fn start_search(
        &self,
        path: &str,
        opts: &SearchOptions,
    ) -> FsResult<(SearchStream, String)> {
        let resolved = self.resolve(path)?;
        let config = self.get_config();

        let meta = std::fs::metadata(resolved.canonical())
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(resolved.display_relative()));
        }

        let name_pattern = NamePattern::new(&opts.pattern, opts.case_sensitive)?;
        let content = if opts.content_search {
            Some(ContentMatcher::new(
                &opts.pattern,
                opts.case_sensitive,
                opts.regex,
            )?)
        } else {
            None
        };

        let max_results = opts
            .max_results
            .unwrap_or(config.search.default_max_results)
            .max(1);
        let spec = SearchSpec {
            start: resolved.canonical().to_path_buf(),
            workspace_root: self.root.as_path().to_path_buf(),
            name_pattern,
            content,
            max_results,
            max_depth: opts.max_depth.unwrap_or(config.search.max_depth),
            max_content_bytes: opts
                .max_content_bytes
                .unwrap_or(config.search.max_content_bytes),
            skip_dir_names: vec![config.backup.dir_name.clone()],
        };
        Ok((SearchEngine::spawn(spec), resolved.display_relative()))
    }

    /// Watch a subtree for changes.
    pub fn watch(&self, path: &str) -> FsResult<ChangeStream> {
        let resolved = self.resolve(path)?;
        std::fs::metadata(resolved.canonical())
            .map_err(|e| FsError::from_io(e, resolved.canonical()))?;
        watch::watch(&self.root, &resolved)
    }

    fn check_distinct(&self, src: &ResolvedPath, dest: &ResolvedPath, src_is_dir: bool) -> FsResult<()> {
        if src.canonical() == dest.canonical() {
            return Err(FsError::PathSyntax(format!(
                "source and destination are the same path: {}",
                src.display_relative()
            )));
        }
        if src_is_dir && dest.canonical().starts_with(src.canonical()) {
            return Err(FsError::PathSyntax(format!(
                "destination {} is inside source {}",
                dest.display_relative(),
                src.display_relative()
            )));
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use warden_core::EntryKind;

    fn service(dir: &TempDir) -> FileOperationService {
        FileOperationService::new(EngineConfig::new(dir.path())).unwrap()
    }

    async fn write_str(svc: &FileOperationService, path: &str, content: &str) -> WriteResult {
        let opts = WriteOptions {
            overwrite: false,
            create_parents: true,
        };
        svc.write(path, Bytes::copy_from_slice(content.as_bytes()), &opts)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_escape_attempts_touch_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        for path in ["../outside.txt", "a/../../outside.txt", "/.."] {
            let err = svc
                .write(path, Bytes::from_static(b"x"), &WriteOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, FsError::PathEscape(_)), "{path}: {err}");
        }
        assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let written = write_str(&svc, "notes/todo.txt", "first\nsecond\n").await;
        assert_eq!(written.entry.path, "/notes/todo.txt");
        assert!(written.backup.is_none());

        let read = svc.read("notes/todo.txt", &ReadOptions::default()).await.unwrap();
        assert!(!read.binary);
        assert_eq!(read.content.as_deref(), Some("first\nsecond\n"));
        assert_eq!(read.lines, Some(2));
        assert_eq!(read.size, 13);
    }

    #[tokio::test]
    async fn test_write_overwrite_guard_and_backup() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "a.txt", "original").await;

        let err = svc
            .write("a.txt", Bytes::from_static(b"new"), &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        let result = svc
            .write(
                "a.txt",
                Bytes::from_static(b"new"),
                &WriteOptions {
                    overwrite: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let backup = result.backup.expect("overwrite should snapshot the old file");
        assert_eq!(backup.original_path, "/a.txt");
        assert!(backup.backup_path.exists());

        let read = svc.read("a.txt", &ReadOptions::default()).await.unwrap();
        assert_eq!(read.content.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_write_rejects_oversized_payload() {
        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::new(dir.path());
        config.max_file_size_bytes = 8;
        let svc = FileOperationService::new(config).unwrap();

        let err = svc
            .write("big.bin", Bytes::from_static(b"123456789"), &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::SizeLimitExceeded { limit: 8, .. }));
        assert!(!dir.path().join("big.bin").exists());
    }

    #[tokio::test]
    async fn test_read_size_limit_checked_before_io() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "long.txt", "0123456789").await;

        let err = svc
            .read(
                "long.txt",
                &ReadOptions {
                    max_size_bytes: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::SizeLimitExceeded { actual: 10, limit: 4, .. }));
    }

    #[tokio::test]
    async fn test_read_flags_binary_content() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        tokio::fs::write(dir.path().join("blob.bin"), b"ab\0cd")
            .await
            .unwrap();

        let read = svc.read("blob.bin", &ReadOptions::default()).await.unwrap();
        assert!(read.binary);
        assert!(read.content.is_none());
        assert_eq!(read.size, 5);
    }

    #[tokio::test]
    async fn test_read_undecodable_text_is_encoding_error() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        // Latin-1 bytes, no NULs: passes the binary probe but cannot decode.
        tokio::fs::write(dir.path().join("menu.txt"), b"caf\xe9 au lait")
            .await
            .unwrap();

        let err = svc.read("menu.txt", &ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, FsError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_read_rejects_directories_and_unknown_encodings() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.create_dir("sub", &MkdirOptions::default()).await.unwrap();

        let err = svc.read("sub", &ReadOptions::default()).await.unwrap_err();
        assert!(matches!(err, FsError::NotAFile(_)));

        write_str(&svc, "a.txt", "x").await;
        let err = svc
            .read(
                "a.txt",
                &ReadOptions {
                    encoding: "latin-1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_list_hidden_filter_and_order() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "b.rs", "").await;
        write_str(&svc, "a.rs", "").await;
        write_str(&svc, ".hidden", "").await;
        svc.create_dir("src", &MkdirOptions::default()).await.unwrap();

        let listing = svc.list("/", &ListOptions::default()).await.unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.rs", "b.rs", "src"]);
        assert_eq!(listing.total_count, 3);

        let listing = svc
            .list(
                "/",
                &ListOptions {
                    include_hidden: true,
                    filter_pattern: Some("*.rs".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.rs", "b.rs"]);

        let err = svc.list("a.rs", &ListOptions::default()).await.unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_create_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let first = svc.create_dir("x/y/z", &MkdirOptions::default()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.entry.kind, EntryKind::Directory);

        let second = svc.create_dir("x/y/z", &MkdirOptions::default()).await.unwrap();
        assert!(!second.created);

        write_str(&svc, "taken.txt", "").await;
        let err = svc
            .create_dir("taken.txt", &MkdirOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        let err = svc
            .create_dir(
                "missing/child",
                &MkdirOptions {
                    create_parents: false,
                    mode: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "keep.txt", "data").await;

        let err = svc
            .delete("keep.txt", &DeleteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::ConfirmationRequired(_)));
        assert!(dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_file_leaves_backup() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "gone.txt", "payload").await;

        let result = svc
            .delete(
                "gone.txt",
                &DeleteOptions {
                    recursive: false,
                    confirm: true,
                },
            )
            .await
            .unwrap();
        assert!(result.deleted);
        assert!(!dir.path().join("gone.txt").exists());

        let backup = result.backup.expect("backup enabled by default");
        assert_eq!(backup.original_path, "/gone.txt");
        svc.backups().restore(&backup).await.unwrap();
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("gone.txt")).await.unwrap(),
            "payload"
        );
    }

    #[tokio::test]
    async fn test_delete_directory_semantics() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "tree/leaf.txt", "x").await;

        let err = svc
            .delete(
                "tree",
                &DeleteOptions {
                    recursive: false,
                    confirm: true,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty(_)));
        assert!(dir.path().join("tree/leaf.txt").exists());

        svc.delete(
            "tree",
            &DeleteOptions {
                recursive: true,
                confirm: true,
            },
        )
        .await
        .unwrap();
        assert!(!dir.path().join("tree").exists());

        let err = svc
            .delete("/", &DeleteOptions { recursive: true, confirm: true })
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_concurrent_deletes_have_one_winner() {
        let dir = TempDir::new().unwrap();
        let svc = Arc::new(service(&dir));
        write_str(&svc, "contested.txt", "x").await;

        let opts = DeleteOptions {
            recursive: false,
            confirm: true,
        };
        let a = {
            let svc = svc.clone();
            let opts = opts.clone();
            tokio::spawn(async move { svc.delete("contested.txt", &opts).await })
        };
        let b = {
            let svc = svc.clone();
            tokio::spawn(async move { svc.delete("contested.txt", &opts).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one delete should succeed: {results:?}");
        let loss = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(loss, Err(FsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_copy_file_verifies_and_guards_destination() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "src.txt", "copy me").await;
        write_str(&svc, "dest.txt", "old").await;

        let err = svc
            .copy("src.txt", "dest.txt", &CopyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        let result = svc
            .copy(
                "src.txt",
                "dest.txt",
                &CopyOptions {
                    overwrite: true,
                    preserve_metadata: true,
                },
            )
            .await
            .unwrap();
        assert!(result.verified);
        assert!(result.replaced_backup.is_some());
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("dest.txt")).await.unwrap(),
            "copy me"
        );
        // Source untouched.
        assert!(dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn test_copy_tree_and_self_nesting_guard() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "proj/src/main.rs", "fn main() {}").await;
        write_str(&svc, "proj/README.md", "hi").await;

        let err = svc
            .copy("proj", "proj/nested", &CopyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::PathSyntax(_)));

        let result = svc.copy("proj", "proj2", &CopyOptions::default()).await.unwrap();
        assert!(result.verified);
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("proj2/src/main.rs")).await.unwrap(),
            "fn main() {}"
        );
    }

    #[tokio::test]
    async fn test_move_uses_rename_on_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "old.txt", "moving").await;

        let result = svc
            .move_entry("old.txt", "new.txt", &MoveOptions::default())
            .await
            .unwrap();
        assert_eq!(result.strategy, MoveStrategy::Rename);
        assert!(result.source_backup.is_none());
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("new.txt")).await.unwrap(),
            "moving"
        );
    }

    #[tokio::test]
    async fn test_move_overwrite_snapshots_destination() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "a.txt", "a").await;
        write_str(&svc, "b.txt", "b").await;

        let err = svc
            .move_entry("a.txt", "b.txt", &MoveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        let result = svc
            .move_entry("a.txt", "b.txt", &MoveOptions { overwrite: true })
            .await
            .unwrap();
        assert!(result.replaced_backup.is_some());
        assert_eq!(
            tokio::fs::read_to_string(dir.path().join("b.txt")).await.unwrap(),
            "a"
        );
    }

    #[tokio::test]
    async fn test_search_orders_name_matches_first() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "zz/report.txt", "nothing here").await;
        write_str(&svc, "notes.md", "the report is late").await;
        write_str(&svc, "unrelated.txt", "hello").await;

        let outcome = svc
            .search(
                "/",
                &SearchOptions {
                    pattern: "report".into(),
                    content_search: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.total_matches, 2);
        assert!(!outcome.truncated);
        // Filename match sorts ahead of the content-only match.
        assert_eq!(outcome.matches[0].path, "/zz/report.txt");
        assert!(outcome.matches[0].name_matched);
        assert_eq!(outcome.matches[1].path, "/notes.md");
        assert!(outcome.matches[1].content_matched);
        assert_eq!(outcome.matches[1].line_number, Some(1));
    }

    #[tokio::test]
    async fn test_search_skips_backup_store_and_caps_results() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        for i in 0..5 {
            write_str(&svc, &format!("hit-{i}.txt"), "").await;
        }
        // A deleted file lands in the backup store; it must not resurface
        // in search results.
        write_str(&svc, "hit-old.txt", "").await;
        svc.delete("hit-old.txt", &DeleteOptions { recursive: false, confirm: true })
            .await
            .unwrap();

        let outcome = svc
            .search(
                "/",
                &SearchOptions {
                    pattern: "hit".into(),
                    max_results: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.total_matches, 3);
        assert!(outcome.truncated);

        let outcome = svc
            .search(
                "/",
                &SearchOptions {
                    pattern: "hit-old".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.matches.is_empty());
    }

    #[tokio::test]
    async fn test_search_at_exactly_the_cap_is_complete() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        for i in 0..3 {
            write_str(&svc, &format!("hit-{i}.txt"), "").await;
        }
        write_str(&svc, "miss.txt", "").await;

        let outcome = svc
            .search(
                "/",
                &SearchOptions {
                    pattern: "hit".into(),
                    max_results: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.total_matches, 3);
        // Every match fit under the cap; nothing was cut off.
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_search_rejects_bad_inputs() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "a.txt", "x").await;

        let err = svc
            .search("a.txt", &SearchOptions { pattern: "x".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));

        let err = svc
            .search(
                "/",
                &SearchOptions {
                    pattern: "[bad".into(),
                    content_search: true,
                    regex: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidPattern(_)));
    }

    #[tokio::test]
    async fn test_config_updates_apply_and_root_is_immutable() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let updated = svc.set_config("max_file_size_bytes", "16").unwrap();
        assert_eq!(updated.max_file_size_bytes, 16);
        let err = svc
            .write("big.txt", Bytes::from_static(b"01234567890123456"), &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::SizeLimitExceeded { .. }));

        let err = svc.set_config("workspace_root", "/elsewhere").unwrap_err();
        assert!(matches!(err, FsError::InvalidConfig(_)));
        let err = svc.set_config("no.such.key", "1").unwrap_err();
        assert!(matches!(err, FsError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_info_reports_checksums_on_request() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        write_str(&svc, "sum.txt", "hello world").await;

        let plain = svc.get_info("sum.txt", &InfoOptions::default()).await.unwrap();
        assert!(plain.checksums.is_none());
        assert_eq!(plain.size, Some(11));

        let with_sums = svc
            .get_info(
                "sum.txt",
                &InfoOptions {
                    include_permissions: true,
                    include_checksums: true,
                },
            )
            .await
            .unwrap();
        let sums = with_sums.checksums.unwrap();
        assert_eq!(
            sums.get(&warden_core::ChecksumAlgorithm::Crc32).map(String::as_str),
            Some("0d4a1185")
        );
        assert!(sums.contains_key(&warden_core::ChecksumAlgorithm::Blake3));
    }
}
