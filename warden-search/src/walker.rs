// SPDX-License-Identifier: AGPL-3.0-or-later
//! Depth-first workspace walk producing matches lazily
//!
//! The walk runs in a blocking task and hands matches to the caller through
//! a bounded channel, so large trees never get materialized. It stops on
//! its own once the result cap is reached, when the caller cancels, or when
//! the receiving side is dropped.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use warden_core::CancelToken;

use crate::matcher::{ContentMatcher, NamePattern};

/// Bytes sniffed for a NUL probe before content matching.
const BINARY_PROBE_LEN: usize = 8192;

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Workspace-relative path, `/`-rooted.
    pub path: String,
    pub name: String,
    pub name_matched: bool,
    pub content_matched: bool,
    /// 1-based line of the first content match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// A fully-resolved description of one walk. The engine builds this from
/// caller options merged with configured ceilings.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    /// Canonical directory the walk starts at.
    pub start: PathBuf,
    /// Canonical workspace root, for relative display paths.
    pub workspace_root: PathBuf,
    pub name_pattern: NamePattern,
    /// `None` disables content matching entirely.
    pub content: Option<ContentMatcher>,
    pub max_results: usize,
    pub max_depth: usize,
    pub max_content_bytes: u64,
    /// Directory names never descended into (the backup store).
    pub skip_dir_names: Vec<String>,
}

/// Handle to an in-flight walk. Dropping it cancels the walk.
pub struct SearchStream {
    rx: mpsc::Receiver<SearchMatch>,
    cancel: CancelToken,
    capped: Arc<AtomicBool>,
}

impl SearchStream {
    /// Next match, or `None` once the walk finished or was cancelled.
    pub async fn next(&mut self) -> Option<SearchMatch> {
        self.rx.recv().await
    }

    /// Stop the walk mid-traversal. Already-buffered matches still drain.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// True once the walk stopped because a match past the result cap
    /// exists. Stays false when the tree held at most `max_results`
    /// matches. Meaningful after the stream ended.
    pub fn hit_result_cap(&self) -> bool {
        self.capped.load(Ordering::Acquire)
    }

    pub async fn collect(&mut self) -> Vec<SearchMatch> {
        let mut out = Vec::new();
        while let Some(m) = self.next().await {
            out.push(m);
        }
        out
    }
}

impl Drop for SearchStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct SearchEngine;

impl SearchEngine {
    /// Start a walk on the blocking pool and return its match stream.
    pub fn spawn(spec: SearchSpec) -> SearchStream {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancelToken::new();
        let capped = Arc::new(AtomicBool::new(false));
        let walker_cancel = cancel.clone();
        let walker_capped = capped.clone();
        tokio::task::spawn_blocking(move || walk(spec, tx, walker_cancel, walker_capped));
        SearchStream { rx, cancel, capped }
    }
}

/// Order a collected result set the way callers expect: filename matches
/// before content-only matches, lexicographic path order within each group.
pub fn order_matches(matches: &mut [SearchMatch]) {
    matches.sort_by(|a, b| {
        b.name_matched
            .cmp(&a.name_matched)
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn walk(
    spec: SearchSpec,
    tx: mpsc::Sender<SearchMatch>,
    cancel: CancelToken,
    capped: Arc<AtomicBool>,
) {
    let mut stack: Vec<(PathBuf, usize)> = vec![(spec.start.clone(), 0)];
    let mut produced = 0usize;

    'outer: while let Some((dir, depth)) = stack.pop() {
        if cancel.is_cancelled() {
            debug!(dir = %dir.display(), "search cancelled");
            break;
        }

        let mut children = match fs::read_dir(&dir) {
            Ok(rd) => rd.filter_map(Result::ok).collect::<Vec<_>>(),
            Err(e) => {
                trace!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        // Deterministic traversal; reversed so the stack pops in order.
        children.sort_by_key(|c| c.file_name());
        children.reverse();

        for child in children {
            if cancel.is_cancelled() {
                break 'outer;
            }

            let name = match child.file_name().into_string() {
                Ok(n) => n,
                Err(_) => continue,
            };
            let path = child.path();
            let file_type = match child.file_type() {
                Ok(t) => t,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                // Symlinked directories are never followed (cycle prevention);
                // file_type() does not follow, so this branch is real dirs only.
                if spec.skip_dir_names.iter().any(|s| s == &name) {
                    continue;
                }
                if depth + 1 <= spec.max_depth {
                    stack.push((path, depth + 1));
                }
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let name_matched = spec.name_pattern.matches(&name);
            let mut content_matched = false;
            let mut first_line = None;

            if let Some(matcher) = &spec.content {
                first_line = content_first_match(&path, matcher, spec.max_content_bytes);
                content_matched = first_line.is_some();
            }

            if !(name_matched || content_matched) {
                continue;
            }

            // The cap-th match was already produced; this one proves the
            // result set was actually cut off.
            if produced >= spec.max_results {
                capped.store(true, Ordering::Release);
                break 'outer;
            }

            let meta = fs::metadata(&path).ok();
            let m = SearchMatch {
                path: relative_display(&spec.workspace_root, &path),
                name,
                name_matched,
                content_matched,
                line_number: first_line.as_ref().map(|(n, _)| *n),
                line: first_line.map(|(_, l)| l),
                size: meta.as_ref().map(|m| m.len()),
                modified: meta.and_then(|m| m.modified().ok()).map(DateTime::from),
            };

            if tx.blocking_send(m).is_err() {
                // Receiver gone; nobody wants the rest.
                break 'outer;
            }
            produced += 1;
        }
    }
}

/// Scan a file for the first content match. Binary files and files over the
/// size ceiling are skipped (they stay eligible for filename matches).
fn content_first_match(
    path: &Path,
    matcher: &ContentMatcher,
    max_bytes: u64,
) -> Option<(usize, String)> {
    let meta = fs::metadata(path).ok()?;
    if meta.len() > max_bytes {
        return None;
    }

    let mut file = fs::File::open(path).ok()?;
    let mut bytes = Vec::with_capacity(meta.len() as usize);
    file.read_to_end(&mut bytes).ok()?;

    let probe = &bytes[..bytes.len().min(BINARY_PROBE_LEN)];
    if probe.contains(&0) {
        return None;
    }

    let text = String::from_utf8(bytes).ok()?;
    matcher.first_match(&text)
}

fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
        Ok(rel) => format!("/{}", rel.display()),
        Err(_) => path.display().to_string(),
    }
}
