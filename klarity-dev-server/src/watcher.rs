use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::debounce::RebuildScheduler;

const WATCHED_EXTENSIONS: [&str; 2] = ["md", "toml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    Rebuild,
    /// A document root appeared and must be watched from now on.
    WatchRoot(PathBuf),
}

/// What a single filesystem event asks of the dev server.
///
/// A doc root that is created or moved into place is reported as
/// [`WatchAction::WatchRoot`]. Only events from watched directories arrive
/// here, so a nested root such as `docs/api` whose parent `docs` is also
/// missing goes unnoticed until the server restarts.
pub fn classify(event: &Event, doc_roots: &[PathBuf]) -> Vec<WatchAction> {
    let relevant = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !relevant {
        return Vec::new();
    }

    let mut actions = Vec::new();
    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(_))) {
        for path in &event.paths {
            let is_dir = event.kind == EventKind::Create(CreateKind::Folder) || path.is_dir();
            if is_dir && doc_roots.iter().any(|root| root == path) {
                actions.push(WatchAction::WatchRoot(path.clone()));
            }
        }
    }

    if event.paths.iter().any(|path| is_watched_file(path)) {
        actions.push(WatchAction::Rebuild);
    }
    actions
}

fn is_watched_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WATCHED_EXTENSIONS.contains(&ext))
}

/// Watch the project for source changes and feed them to `scheduler` until
/// `shutdown` flips or its sender is dropped.
///
/// The project root is watched non-recursively and each existing doc root
/// recursively.
pub fn spawn_watch_loop(
    project_root: PathBuf,
    doc_roots: Vec<PathBuf>,
    scheduler: Arc<RebuildScheduler>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>> {
    let (tx, mut rx) = mpsc::channel(100);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.blocking_send(res);
    })
    .context("could not create file watcher")?;

    watcher
        .watch(&project_root, RecursiveMode::NonRecursive)
        .with_context(|| format!("could not watch {}", project_root.display()))?;
    for root in doc_roots.iter().filter(|root| root.is_dir()) {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("could not watch {}", root.display()))?;
        tracing::debug!(root = %root.display(), "Watching document root");
    }

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                event = rx.recv() => match event {
                    Some(Ok(event)) => handle_event(&mut watcher, &event, &doc_roots, &scheduler),
                    Some(Err(e)) => tracing::warn!("File watcher error: {e}"),
                    None => break,
                },
            }
        }
        scheduler.cancel();
        tracing::debug!("File watcher stopped");
    }))
}

fn handle_event(watcher: &mut RecommendedWatcher, event: &Event, doc_roots: &[PathBuf], scheduler: &RebuildScheduler) {
    for action in classify(event, doc_roots) {
        match action {
            WatchAction::WatchRoot(root) => match watcher.watch(&root, RecursiveMode::Recursive) {
                Ok(()) => tracing::info!(root = %root.display(), "Document root created, watching it"),
                Err(e) => tracing::warn!(root = %root.display(), "Could not watch new document root: {e}"),
            },
            WatchAction::Rebuild => {
                tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Source changed");
                scheduler.schedule();
            }
        }
    }
}
