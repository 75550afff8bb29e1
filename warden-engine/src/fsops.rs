//! Low-level filesystem helpers
//!
//! Destination files are always staged to a temp file in the target
//! directory and renamed into place, so a cancelled or crashed copy never
//! leaves a truncated file that looks complete. Chunked copies poll the
//! cancel token between chunks.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::DateTime;
use warden_core::{CancelToken, EntryKind, FileEntry, FsError, FsResult, Permissions};

const COPY_CHUNK: usize = 64 * 1024;

/// Build a [`FileEntry`] from already-fetched metadata.
pub fn entry_from_metadata(
    name: &str,
    display_path: &str,
    meta: &fs::Metadata,
    include_permissions: bool,
) -> FileEntry {
    let kind = if meta.file_type().is_symlink() {
        EntryKind::Symlink
    } else if meta.is_dir() {
        EntryKind::Directory
    } else if meta.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };

    let mut entry = FileEntry::new(name, display_path, kind).with_size(meta.len());
    entry.modified = meta.modified().ok().map(DateTime::from);
    entry.created = meta.created().ok().map(DateTime::from);
    entry.accessed = meta.accessed().ok().map(DateTime::from);
    if include_permissions {
        entry.permissions = Some(Permissions::from_metadata(meta));
    }
    entry
}

/// Write contents atomically: stage to a temp file next to the destination,
/// then rename over it.
pub async fn atomic_write(dest: PathBuf, contents: Bytes) -> FsResult<()> {
    tokio::task::spawn_blocking(move || atomic_write_blocking(&dest, &contents))
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(e)))?
}

fn atomic_write_blocking(dest: &Path, contents: &[u8]) -> FsResult<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| FsError::PathSyntax(dest.display().to_string()))?;
    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| FsError::from_io(e, parent))?;
    temp.write_all(contents)
        .map_err(|e| FsError::from_io(e, dest))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| FsError::from_io(e, dest))?;
    temp.persist(dest)
        .map_err(|e| FsError::from_io(e.error, dest))?;
    Ok(())
}

/// Copy one file through a staged temp file. Returns bytes copied.
pub async fn copy_file_atomic(
    src: PathBuf,
    dest: PathBuf,
    preserve_metadata: bool,
    cancel: CancelToken,
) -> FsResult<u64> {
    tokio::task::spawn_blocking(move || {
        copy_file_blocking(&src, &dest, preserve_metadata, &cancel)
    })
    .await
    .map_err(|e| FsError::Io(std::io::Error::other(e)))?
}

fn copy_file_blocking(
    src: &Path,
    dest: &Path,
    preserve_metadata: bool,
    cancel: &CancelToken,
) -> FsResult<u64> {
    let parent = dest
        .parent()
        .ok_or_else(|| FsError::PathSyntax(dest.display().to_string()))?;
    let mut reader = fs::File::open(src).map_err(|e| FsError::from_io(e, src))?;
    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| FsError::from_io(e, parent))?;

    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            // Temp file is dropped and unlinked; the destination was never
            // touched.
            return Err(FsError::Cancelled);
        }
        let n = reader.read(&mut buf).map_err(|e| FsError::from_io(e, src))?;
        if n == 0 {
            break;
        }
        temp.write_all(&buf[..n])
            .map_err(|e| FsError::from_io(e, dest))?;
        total += n as u64;
    }

    if preserve_metadata {
        let meta = fs::metadata(src).map_err(|e| FsError::from_io(e, src))?;
        temp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| FsError::from_io(e, dest))?;
        if let Ok(mtime) = meta.modified() {
            temp.as_file()
                .set_modified(mtime)
                .map_err(|e| FsError::from_io(e, dest))?;
        }
    }

    temp.persist(dest)
        .map_err(|e| FsError::from_io(e.error, dest))?;
    Ok(total)
}

/// Recursively copy a directory tree, preserving relative structure.
/// Symlinks inside the tree are not replicated. Returns bytes copied.
pub async fn copy_tree(
    src: PathBuf,
    dest: PathBuf,
    preserve_metadata: bool,
    cancel: CancelToken,
) -> FsResult<u64> {
    tokio::task::spawn_blocking(move || {
        copy_tree_blocking(&src, &dest, preserve_metadata, &cancel)
    })
    .await
    .map_err(|e| FsError::Io(std::io::Error::other(e)))?
}

fn copy_tree_blocking(
    src: &Path,
    dest: &Path,
    preserve_metadata: bool,
    cancel: &CancelToken,
) -> FsResult<u64> {
    fs::create_dir_all(dest).map_err(|e| FsError::from_io(e, dest))?;
    let mut total = 0u64;
    let mut stack = vec![(src.to_path_buf(), dest.to_path_buf())];

    while let Some((from, to)) = stack.pop() {
        if cancel.is_cancelled() {
            return Err(FsError::Cancelled);
        }
        let read_dir = fs::read_dir(&from).map_err(|e| FsError::from_io(e, &from))?;
        for child in read_dir {
            let child = child.map_err(|e| FsError::from_io(e, &from))?;
            let file_type = child.file_type().map_err(|e| FsError::from_io(e, &from))?;
            let child_src = child.path();
            let child_dest = to.join(child.file_name());

            if file_type.is_dir() {
                fs::create_dir_all(&child_dest).map_err(|e| FsError::from_io(e, &child_dest))?;
                if preserve_metadata {
                    if let Ok(meta) = fs::metadata(&child_src) {
                        let _ = fs::set_permissions(&child_dest, meta.permissions());
                    }
                }
                stack.push((child_src, child_dest));
            } else if file_type.is_file() {
                total += copy_file_blocking(&child_src, &child_dest, preserve_metadata, cancel)?;
            }
        }
    }
    Ok(total)
}

/// Blake3 over a directory manifest: sorted relative paths plus each file's
/// content digest. Two trees with identical structure and bytes hash equal.
pub async fn tree_checksum(root: PathBuf) -> FsResult<String> {
    tokio::task::spawn_blocking(move || tree_checksum_blocking(&root))
        .await
        .map_err(|e| FsError::Io(std::io::Error::other(e)))?
}

fn tree_checksum_blocking(root: &Path) -> FsResult<String> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let read_dir = fs::read_dir(&dir).map_err(|e| FsError::from_io(e, &dir))?;
        for child in read_dir {
            let child = child.map_err(|e| FsError::from_io(e, &dir))?;
            let file_type = child.file_type().map_err(|e| FsError::from_io(e, &dir))?;
            if file_type.is_dir() {
                stack.push(child.path());
            } else if file_type.is_file() {
                files.push(child.path());
            }
        }
    }
    files.sort();

    let mut manifest = blake3::Hasher::new();
    for file in files {
        let rel = file.strip_prefix(root).unwrap_or(&file);
        manifest.update(rel.to_string_lossy().as_bytes());
        manifest.update(b"\0");
        manifest.update(blake3_file_blocking(&file)?.as_bytes());
        manifest.update(b"\n");
    }
    Ok(manifest.finalize().to_hex().to_string())
}

pub(crate) fn blake3_file_blocking(path: &Path) -> FsResult<String> {
    let mut file = fs::File::open(path).map_err(|e| FsError::from_io(e, path))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = file.read(&mut buf).map_err(|e| FsError::from_io(e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
