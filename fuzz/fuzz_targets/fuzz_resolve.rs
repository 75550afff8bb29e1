// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for workspace path resolution
//!
//! Throws arbitrary byte strings at the resolver and asserts the one
//! property that must never break: every accepted resolution stays inside
//! the workspace root.

#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use tempfile::TempDir;
use warden_core::WorkspaceRoot;

static ROOT: Lazy<(TempDir, WorkspaceRoot)> = Lazy::new(|| {
    let dir = TempDir::new().expect("create fuzz workspace");
    std::fs::create_dir_all(dir.path().join("a/b")).expect("seed subdirs");
    std::fs::write(dir.path().join("a/file.txt"), b"x").expect("seed file");
    let root = WorkspaceRoot::open(dir.path()).expect("open fuzz workspace");
    (dir, root)
});

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let root = &ROOT.1;
        if let Ok(resolved) = root.resolve(input) {
            assert!(
                resolved.canonical().starts_with(root.as_path()),
                "resolved path {:?} escaped root {:?} for input {:?}",
                resolved.canonical(),
                root.as_path(),
                input
            );
            let display = resolved.display_relative();
            assert!(display.starts_with('/'), "display path not rooted: {display:?}");
            let _ = resolved.lock_key();
            let _ = resolved.file_name();
            let _ = resolved.is_root();
        }
    }
});
