//! Operation-specific result payloads
//!
//! The `result` halves of the wire envelope. Field names match what the
//! transport serializes; optional fields drop off the wire entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warden_core::{ChecksumAlgorithm, FileEntry};
use warden_search::SearchMatch;

use crate::backup::BackupRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub path: String,
    pub entries: Vec<FileEntry>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub path: String,
    /// True when the content was detected as non-text; `content` is absent
    /// rather than mangled.
    pub binary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_type: Option<String>,
    pub size: u64,
    pub size_formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksums: Option<BTreeMap<ChecksumAlgorithm, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub entry: FileEntry,
    /// Snapshot of the overwritten file, when one existed and backups are
    /// enabled.
    pub backup: Option<BackupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MkdirResult {
    pub entry: FileEntry,
    /// False when the directory already existed (idempotent success).
    pub created: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub path: String,
    pub deleted: bool,
    pub backup: Option<BackupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResult {
    pub source: String,
    pub destination: String,
    pub entry: FileEntry,
    /// Checksums of source and destination compared equal after the copy.
    pub verified: bool,
    /// Snapshot of a destination that was overwritten.
    pub replaced_backup: Option<BackupRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveStrategy {
    /// Plain rename on the same filesystem.
    Rename,
    /// Copy to the destination, verify, then delete the source.
    CopyDelete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResult {
    pub source: String,
    pub destination: String,
    pub entry: FileEntry,
    pub strategy: MoveStrategy,
    /// Snapshot of a destination that was overwritten.
    pub replaced_backup: Option<BackupRecord>,
    /// Snapshot of the source taken before its removal (copy-delete only).
    pub source_backup: Option<BackupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub path: String,
    pub pattern: String,
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
    /// True when the walk stopped at the result cap.
    pub truncated: bool,
}
