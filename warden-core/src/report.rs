//! Wire-serializable operation reports and change events

use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// Error body carried in failed reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&FsError> for ErrorBody {
    fn from(err: &FsError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// The envelope every public operation serializes to:
/// `{ success, result, error }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    pub error: Option<ErrorBody>,
}

impl<T> OperationReport<T> {
    pub fn ok(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(err: &FsError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }
}

impl<T> From<Result<T, FsError>> for OperationReport<T> {
    fn from(result: Result<T, FsError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => Self::err(&err),
        }
    }
}

/// What a watcher observed happening to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A discrete file-change fact for an external subscriber channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Always `"file_changed"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Workspace-relative path.
    pub path: String,
    pub change_kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            event_type: "file_changed".to_string(),
            path: path.into(),
            change_kind,
        }
    }
}
