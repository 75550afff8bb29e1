// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sandboxed file-operation engine
//!
//! [`FileOperationService`] is the single entry point: it owns the workspace
//! root, the runtime configuration, and the per-path lock registry, and
//! exposes the list/read/write/mkdir/delete/copy/move/search/info/watch
//! operations with workspace confinement enforced on every path argument.
//!
//! The supporting modules are public for embedders that need finer-grained
//! access (for example driving the backup store directly).

pub mod backup;
pub mod checksum;
pub mod fsops;
pub mod locks;
pub mod payload;
pub mod service;
pub mod watch;

pub use backup::{BackupManager, BackupRecord};
pub use payload::{
    CopyResult, DeleteResult, ListResult, MkdirResult, MoveResult, MoveStrategy, ReadResult,
    SearchOutcome, WriteResult,
};
pub use service::FileOperationService;
pub use watch::ChangeStream;
