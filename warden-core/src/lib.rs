//! file-warden core
//!
//! Shared types for the sandboxed workspace file-operation engine: the
//! path resolver that confines every operation to one workspace directory,
//! the entry and configuration models, operation options, and the error
//! taxonomy returned across the operation boundary.

pub mod cancel;
pub mod config;
pub mod entry;
pub mod error;
pub mod operations;
pub mod path;
pub mod report;

pub use cancel::CancelToken;
pub use config::{BackupRetention, ChecksumAlgorithm, EngineConfig};
pub use entry::{EntryKind, FileEntry, Permissions};
pub use error::{FsError, FsResult};
pub use path::{ResolvedPath, WorkspaceRoot};
pub use report::{ChangeEvent, ChangeKind, OperationReport};
