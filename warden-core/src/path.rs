//! Workspace-confined path resolution
//!
//! Every caller-supplied path must pass through [`WorkspaceRoot::resolve`]
//! before any other component touches it. Resolution canonicalizes the input
//! (following symlinks) and proves the result is the workspace root or a
//! descendant of it; `..` and symlink escapes are rejected on the canonical
//! form, never the raw string.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FsError, FsResult};

/// The single directory all operations are confined to.
///
/// Canonicalized once at construction and immutable afterwards.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Open an existing directory as the workspace root.
    pub fn open(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let root = fs::canonicalize(path).map_err(|e| FsError::from_io(e, path))?;
        let meta = fs::metadata(&root).map_err(|e| FsError::from_io(e, &root))?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(path.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn as_path(&self) -> &Path {
        &self.root
    }

    /// Resolve and validate a caller-supplied path.
    ///
    /// Relative inputs are taken relative to the root. The target itself may
    /// not exist yet (write/copy destinations); in that case the deepest
    /// existing ancestor is canonicalized and the missing remainder is
    /// normalized lexically, so a symlink in the existing portion can never
    /// smuggle the result outside the workspace.
    pub fn resolve(&self, raw: &str) -> FsResult<ResolvedPath> {
        if raw.is_empty() {
            return Err(FsError::PathSyntax("empty path".into()));
        }
        if raw.contains('\0') {
            return Err(FsError::PathSyntax(format!("NUL byte in path: {:?}", raw)));
        }

        let supplied = Path::new(raw);
        let joined = if supplied.is_absolute() {
            supplied.to_path_buf()
        } else {
            self.root.join(supplied)
        };

        let canonical = canonicalize_allowing_missing(&joined)?;

        if canonical != self.root && !canonical.starts_with(&self.root) {
            return Err(FsError::PathEscape(raw.to_string()));
        }

        let relative = canonical
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(ResolvedPath {
            raw: raw.to_string(),
            canonical,
            relative,
        })
    }
}

/// Canonicalize a path whose trailing components may not exist yet.
///
/// Peels missing components off the end until canonicalization succeeds,
/// then re-applies them lexically (`.` dropped, `..` pops). The peeled
/// components cannot contain symlinks because they do not exist.
fn canonicalize_allowing_missing(path: &Path) -> FsResult<PathBuf> {
    let mut current = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    let base = loop {
        match fs::canonicalize(&current) {
            Ok(base) => break base,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let last = current
                    .components()
                    .next_back()
                    .map(|c| c.as_os_str().to_os_string());
                match last {
                    Some(comp) if current.pop() => missing.push(comp),
                    _ => return Err(FsError::from_io(e, path)),
                }
            }
            Err(e) => return Err(FsError::from_io(e, path)),
        }
    };

    let mut out = base;
    for comp in missing.iter().rev() {
        if comp.as_os_str() == "." {
            continue;
        } else if comp.as_os_str() == ".." {
            out.pop();
        } else {
            out.push(comp);
        }
    }
    Ok(out)
}

/// A path proven canonical and workspace-confined.
///
/// The only path representation other components act on. Carries the
/// original caller string for error reporting, the canonical absolute form
/// for filesystem calls, and the root-relative form for display and wire
/// payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    raw: String,
    canonical: PathBuf,
    relative: PathBuf,
}

impl ResolvedPath {
    /// The path as the caller supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Canonical absolute path; safe to hand to the OS.
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Path relative to the workspace root (empty for the root itself).
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.canonical.file_name().and_then(|n| n.to_str())
    }

    /// Workspace-relative display form, always `/`-rooted.
    pub fn display_relative(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.relative.display())
        }
    }

    /// Key for the per-path destructive-operation lock registry.
    pub fn lock_key(&self) -> String {
        self.canonical.to_string_lossy().into_owned()
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_relative())
    }
}
