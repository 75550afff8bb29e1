//! Engine configuration
//!
//! All policy knobs live in one explicit struct handed to the service at
//! construction, so multiple workspaces can coexist in-process (tests do
//! exactly that). The workspace root is the one immutable field; everything
//! else can be updated live through `apply_update`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_BACKUP_STORE_CAP: u64 = 512 * 1024 * 1024;

/// Checksum algorithms the engine can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// Fast identity hash, not collision-resistant.
    Crc32,
    Blake3,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Crc32 => "crc32",
            ChecksumAlgorithm::Blake3 => "blake3",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(FsError::InvalidConfig(format!(
                "unknown checksum algorithm: {other}"
            ))),
        }
    }
}

/// What happens to older backups of the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupRetention {
    /// Keep every generation (subject to the prune limits).
    #[default]
    KeepAll,
    /// A new snapshot supersedes any prior backup of the same path.
    LatestOnly,
}

impl FromStr for BackupRetention {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-all" | "keep_all" => Ok(BackupRetention::KeepAll),
            "latest-only" | "latest_only" => Ok(BackupRetention::LatestOnly),
            other => Err(FsError::InvalidConfig(format!(
                "unknown backup retention: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub retention: BackupRetention,
    /// Backups older than this are eligible for pruning.
    pub max_age_secs: Option<u64>,
    /// Total store size cap; oldest backups are pruned first.
    pub max_total_bytes: Option<u64>,
    /// Store directory name under the workspace root.
    pub dir_name: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention: BackupRetention::KeepAll,
            max_age_secs: None,
            max_total_bytes: Some(DEFAULT_BACKUP_STORE_CAP),
            dir_name: ".backups".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_depth: usize,
    /// Files larger than this are skipped for content matching.
    pub max_content_bytes: u64,
    pub default_max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_content_bytes: 10 * 1024 * 1024,
            default_max_results: 1000,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Immutable after construction; `apply_update` rejects changes.
    pub workspace_root: PathBuf,
    pub max_file_size_bytes: u64,
    pub checksum_algorithms: Vec<ChecksumAlgorithm>,
    /// Attach checksums to listing entries when metadata is requested.
    pub checksums_in_listings: bool,
    pub backup: BackupConfig,
    pub search: SearchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE,
            checksum_algorithms: vec![ChecksumAlgorithm::Crc32, ChecksumAlgorithm::Blake3],
            checksums_in_listings: false,
            backup: BackupConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> FsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| FsError::from_io(e, path))?;
        toml::from_str(&text).map_err(|e| FsError::InvalidConfig(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> FsResult<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| FsError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| FsError::from_io(e, path))?;
        Ok(())
    }

    /// Apply a single `set_config`-style update by dotted key.
    pub fn apply_update(&mut self, key: &str, value: &str) -> FsResult<()> {
        fn parse<T: FromStr>(key: &str, value: &str) -> FsResult<T> {
            value.trim().parse().map_err(|_| {
                FsError::InvalidConfig(format!("invalid value for {key}: {value}"))
            })
        }

        match key {
            "workspace_root" => Err(FsError::InvalidConfig(
                "workspace_root is immutable for the process lifetime".into(),
            )),
            "max_file_size_bytes" => {
                self.max_file_size_bytes = parse(key, value)?;
                Ok(())
            }
            "checksums_in_listings" => {
                self.checksums_in_listings = parse(key, value)?;
                Ok(())
            }
            "checksum_algorithms" => {
                let algos = value
                    .split(',')
                    .filter(|s| !s.trim().is_empty())
                    .map(ChecksumAlgorithm::from_str)
                    .collect::<FsResult<Vec<_>>>()?;
                if algos.is_empty() {
                    return Err(FsError::InvalidConfig(
                        "checksum_algorithms must name at least one algorithm".into(),
                    ));
                }
                self.checksum_algorithms = algos;
                Ok(())
            }
            "backup.enabled" => {
                self.backup.enabled = parse(key, value)?;
                Ok(())
            }
            "backup.retention" => {
                self.backup.retention = value.parse()?;
                Ok(())
            }
            "backup.max_age_secs" => {
                self.backup.max_age_secs = Some(parse(key, value)?);
                Ok(())
            }
            "backup.max_total_bytes" => {
                self.backup.max_total_bytes = Some(parse(key, value)?);
                Ok(())
            }
            "search.max_depth" => {
                self.search.max_depth = parse(key, value)?;
                Ok(())
            }
            "search.max_content_bytes" => {
                self.search.max_content_bytes = parse(key, value)?;
                Ok(())
            }
            "search.default_max_results" => {
                self.search.default_max_results = parse(key, value)?;
                Ok(())
            }
            other => Err(FsError::InvalidConfig(format!("unknown config key: {other}"))),
        }
    }
}
