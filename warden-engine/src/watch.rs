//! Subtree change watching
//!
//! Emits discrete `ChangeEvent` facts for an external subscriber channel.
//! Delivery and subscription management are the caller's concern; the
//! engine only reports what happened. Dropping the stream stops the
//! underlying watcher.

use notify::{recommended_watcher, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;
use warden_core::{ChangeEvent, ChangeKind, FsError, FsResult, ResolvedPath, WorkspaceRoot};

pub struct ChangeStream {
    rx: mpsc::Receiver<ChangeEvent>,
    // Held so the OS watch stays registered for the stream's lifetime.
    _watcher: RecommendedWatcher,
}

impl ChangeStream {
    /// Next observed change; `None` after the watcher shut down.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

/// Watch a resolved subtree recursively.
pub fn watch(root: &WorkspaceRoot, path: &ResolvedPath) -> FsResult<ChangeStream> {
    let (tx, rx) = mpsc::channel(256);
    let workspace = root.as_path().to_path_buf();

    let mut watcher = recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "watcher error");
                return;
            }
        };
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => return,
        };
        for path in event.paths {
            let display = match path.strip_prefix(&workspace) {
                Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
                Ok(rel) => format!("/{}", rel.display()),
                Err(_) => path.display().to_string(),
            };
            // blocking_send: notify runs callbacks on its own thread.
            if tx.blocking_send(ChangeEvent::new(display, kind)).is_err() {
                return;
            }
        }
    })
    .map_err(|e| FsError::Io(std::io::Error::other(e)))?;

    watcher
        .watch(path.canonical(), RecursiveMode::Recursive)
        .map_err(|e| FsError::Io(std::io::Error::other(e)))?;

    Ok(ChangeStream {
        rx,
        _watcher: watcher,
    })
}
