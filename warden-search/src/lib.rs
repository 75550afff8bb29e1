// SPDX-License-Identifier: AGPL-3.0-or-later
//! Search subsystem for file-warden
//!
//! Walks a workspace subtree depth-first with an explicit stack, matching
//! entries by filename (glob/substring) and optionally by content
//! (substring/regex, first matching line per file). Matches are produced
//! lazily over a bounded channel so the walk is cancelable mid-traversal
//! and never materializes large trees.

pub mod matcher;
pub mod walker;

pub use matcher::{ContentMatcher, NamePattern};
pub use walker::{order_matches, SearchEngine, SearchMatch, SearchSpec, SearchStream};
