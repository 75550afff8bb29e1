//! Error types for file-warden

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias
pub type FsResult<T> = Result<T, FsError>;

/// Main error type
///
/// Every public operation returns one of these instead of letting raw OS
/// errors cross the boundary. `kind()` is the stable identifier used in the
/// wire shape.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("Path escapes workspace: {0}")]
    PathEscape(String),

    #[error("Malformed path: {0}")]
    PathSyntax(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("Size limit exceeded: {path} is {actual} bytes, limit is {limit}")]
    SizeLimitExceeded {
        path: String,
        actual: u64,
        limit: u64,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Deletion requires confirmation: {0}")]
    ConfirmationRequired(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Backup corrupted: {0}")]
    BackupCorrupted(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Stable wire identifier for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FsError::PathEscape(_) => "PathEscapeError",
            FsError::PathSyntax(_) => "PathSyntaxError",
            FsError::NotFound(_) => "NotFoundError",
            FsError::NotADirectory(_) => "NotADirectoryError",
            FsError::NotAFile(_) => "NotAFileError",
            FsError::AlreadyExists(_) => "AlreadyExistsError",
            FsError::DirectoryNotEmpty(_) => "DirectoryNotEmptyError",
            FsError::SizeLimitExceeded { .. } => "SizeLimitExceeded",
            FsError::Encoding(_) => "EncodingError",
            FsError::PermissionDenied(_) => "PermissionDeniedError",
            FsError::ConfirmationRequired(_) => "ConfirmationRequiredError",
            FsError::Integrity(_) => "IntegrityError",
            FsError::BackupCorrupted(_) => "BackupCorruptedError",
            FsError::InvalidPattern(_) => "InvalidPatternError",
            FsError::InvalidConfig(_) => "InvalidConfigError",
            FsError::Cancelled => "CancelledError",
            FsError::Io(_) => "IoError",
        }
    }

    /// Translate a raw IO error into the taxonomy, attaching the path it
    /// happened on.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        let display = path.display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(display),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(display),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(display),
            _ => FsError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    /// True when the operation never touched the filesystem (pure input
    /// rejection). Callers can retry with corrected input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            FsError::PathEscape(_)
                | FsError::PathSyntax(_)
                | FsError::InvalidPattern(_)
                | FsError::InvalidConfig(_)
                | FsError::ConfirmationRequired(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(FsError::PathEscape("x".into()).kind(), "PathEscapeError");
        assert_eq!(FsError::NotFound("x".into()).kind(), "NotFoundError");
        assert_eq!(
            FsError::SizeLimitExceeded { path: "x".into(), actual: 2, limit: 1 }.kind(),
            "SizeLimitExceeded"
        );
        assert_eq!(FsError::BackupCorrupted("x".into()).kind(), "BackupCorruptedError");
    }

    #[test]
    fn test_from_io_translates_common_kinds() {
        let path = Path::new("/tmp/missing");
        let err = FsError::from_io(io::Error::new(io::ErrorKind::NotFound, "nope"), path);
        assert!(matches!(err, FsError::NotFound(_)));

        let err = FsError::from_io(io::Error::new(io::ErrorKind::PermissionDenied, "no"), path);
        assert!(matches!(err, FsError::PermissionDenied(_)));

        let err = FsError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"), path);
        assert!(matches!(err, FsError::Io(_)));
    }

    #[test]
    fn test_is_input_error() {
        assert!(FsError::PathEscape("../x".into()).is_input_error());
        assert!(FsError::ConfirmationRequired("f".into()).is_input_error());
        assert!(!FsError::NotFound("f".into()).is_input_error());
        assert!(!FsError::Cancelled.is_input_error());
    }

    #[test]
    fn test_error_display() {
        let err = FsError::SizeLimitExceeded { path: "big.bin".into(), actual: 200, limit: 100 };
        let msg = format!("{}", err);
        assert!(msg.contains("200"));
        assert!(msg.contains("big.bin"));
    }
}
