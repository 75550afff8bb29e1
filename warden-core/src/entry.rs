//! File system entries

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ChecksumAlgorithm;

/// Entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Permission flags as seen by the current process
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Permissions {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl Permissions {
    #[cfg(unix)]
    pub fn from_mode(mode: u32) -> Self {
        Self {
            readable: mode & 0o444 != 0,
            writable: mode & 0o222 != 0,
            executable: mode & 0o111 != 0,
        }
    }

    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self::from_mode(meta.mode())
        }
        #[cfg(not(unix))]
        {
            Self {
                readable: true,
                writable: !meta.permissions().readonly(),
                executable: false,
            }
        }
    }
}

/// A directory entry or stat result.
///
/// Produced fresh on every call; never cached, since directory state may
/// change between calls. Metadata fields are optional because collecting
/// them costs a stat per entry and listings can opt out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Workspace-relative path, `/`-rooted.
    pub path: String,
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksums: Option<BTreeMap<ChecksumAlgorithm, String>>,
}

impl FileEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            size: None,
            size_formatted: None,
            modified: None,
            created: None,
            accessed: None,
            permissions: None,
            checksums: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self.size_formatted = Some(format_size(size));
        self
    }
}

/// Human-readable size string reported alongside raw byte counts.
pub fn format_size(size: u64) -> String {
    bytesize::ByteSize(size).to_string()
}
