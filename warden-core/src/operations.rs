//! Operation options
//!
//! One small struct per public operation, mirroring the wire parameter
//! names. All fields have serde defaults so callers only send what they
//! override.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub include_hidden: bool,
    /// Glob applied to entry names (plain substrings also accepted).
    pub filter_pattern: Option<String>,
    /// Collect size/timestamps/permissions per entry. Off by default to
    /// avoid a stat call per child.
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    pub encoding: String,
    /// Per-call ceiling; the engine-wide max file size still applies.
    pub max_size_bytes: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_string(),
            max_size_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub overwrite: bool,
    pub create_parents: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MkdirOptions {
    pub create_parents: bool,
    /// Octal Unix mode to apply after creation, e.g. `0o755`.
    pub mode: Option<u32>,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            create_parents: true,
            mode: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteOptions {
    pub recursive: bool,
    /// Contract-level guard: nothing is ever removed unless this is true.
    pub confirm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    pub overwrite: bool,
    pub preserve_metadata: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            preserve_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveOptions {
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoOptions {
    pub include_permissions: bool,
    /// Checksums are O(file size); strictly opt-in.
    pub include_checksums: bool,
}

impl Default for InfoOptions {
    fn default() -> Self {
        Self {
            include_permissions: true,
            include_checksums: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub pattern: String,
    pub content_search: bool,
    pub case_sensitive: bool,
    /// Treat the pattern as a regex for content matching instead of a
    /// literal substring.
    pub regex: bool,
    /// Stop the walk once this many matches were produced.
    pub max_results: Option<usize>,
    pub max_depth: Option<usize>,
    /// Files larger than this are skipped for content matching.
    pub max_content_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let opts: ListOptions = serde_json::from_str("{}").unwrap();
        assert!(!opts.include_hidden);
        assert!(opts.filter_pattern.is_none());

        let opts: ReadOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.encoding, "utf-8");

        let opts: MkdirOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.create_parents);

        let opts: DeleteOptions = serde_json::from_str("{}").unwrap();
        assert!(!opts.confirm);

        let opts: CopyOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.preserve_metadata);
    }

    #[test]
    fn test_partial_override() {
        let opts: SearchOptions =
            serde_json::from_str(r#"{"pattern": "TODO", "content_search": true}"#).unwrap();
        assert_eq!(opts.pattern, "TODO");
        assert!(opts.content_search);
        assert!(!opts.case_sensitive);
        assert!(opts.max_results.is_none());
    }
}
