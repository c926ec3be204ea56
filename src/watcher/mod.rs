pub mod event;

use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::is_excluded;
use crate::error::WatchError;
use crate::extension::ExtensionMatcher;
use event::WatchEvent;

/// Handle to a running watcher. Dropping it unregisters the OS watches;
/// `stop` exists so shutdown order is explicit in the session.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

impl WatcherHandle {
    pub fn stop(self) {
        // Dropping the notify watcher stops the OS-level watch.
    }
}

/// Start a recursive watcher on `root`.
///
/// Raw notify events are classified on notify's own thread and forwarded to
/// the returned channel: extension-filtered changes and removals per path,
/// plus `Rescan` for events that carry no usable path. The debounce layer
/// lives in the session, not here.
pub fn start_watcher(
    root: &Path,
    matcher: ExtensionMatcher,
    exclude: Vec<String>,
) -> Result<(WatcherHandle, mpsc::Receiver<WatchEvent>), WatchError> {
    let (tx, rx) = mpsc::channel::<WatchEvent>(256);

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        match result {
            Ok(event) => {
                if event.paths.is_empty() {
                    let _ = tx.blocking_send(WatchEvent::Rescan);
                    return;
                }
                for path in &event.paths {
                    if let Some(classified) = classify(path, &event.kind, &matcher, &exclude)
                        && tx.blocking_send(classified).is_err()
                    {
                        return; // session gone, stop forwarding
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, "watcher error");
            }
        }
    })
    .map_err(|source| WatchError::WatcherStart {
        path: root.to_path_buf(),
        source,
    })?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| WatchError::WatcherStart {
            path: root.to_path_buf(),
            source,
        })?;

    Ok((WatcherHandle { _watcher: watcher }, rx))
}

/// Classify one event path, or `None` when it should be ignored.
fn classify(
    path: &Path,
    kind: &EventKind,
    matcher: &ExtensionMatcher,
    exclude: &[String],
) -> Option<WatchEvent> {
    let file_name = path.file_name().and_then(|n| n.to_str())?;
    if !matcher.matches(file_name) {
        return None;
    }
    if is_excluded(path, exclude) {
        return None;
    }

    let path: PathBuf = path.to_path_buf();
    match kind {
        EventKind::Remove(_) => Some(WatchEvent::Removed(path)),
        // Create/Modify/rename variants all reduce to an existence check:
        // editors love delete-and-replace save strategies.
        _ => {
            if path.exists() {
                Some(WatchEvent::Changed(path))
            } else {
                Some(WatchEvent::Removed(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_classify_filters_by_extension() {
        let matcher = ExtensionMatcher::new(["gml"]);
        let ev = classify(
            Path::new("notes.txt"),
            &EventKind::Modify(notify::event::ModifyKind::Any),
            &matcher,
            &[],
        );
        assert_eq!(ev, None);
    }

    #[test]
    fn test_classify_existing_file_is_changed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.gml");
        fs::write(&file, "x = 1;").unwrap();

        let matcher = ExtensionMatcher::new(["gml"]);
        let ev = classify(
            &file,
            &EventKind::Create(notify::event::CreateKind::File),
            &matcher,
            &[],
        );
        assert_eq!(ev, Some(WatchEvent::Changed(file)));
    }

    #[test]
    fn test_classify_missing_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gone.gml");
        let matcher = ExtensionMatcher::new(["gml"]);
        let ev = classify(
            &file,
            &EventKind::Modify(notify::event::ModifyKind::Any),
            &matcher,
            &[],
        );
        assert_eq!(ev, Some(WatchEvent::Removed(file)));
    }

    #[test]
    fn test_classify_respects_exclude_globs() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("generated.gml");
        fs::write(&file, "x = 1;").unwrap();

        let matcher = ExtensionMatcher::new(["gml"]);
        let ev = classify(
            &file,
            &EventKind::Modify(notify::event::ModifyKind::Any),
            &matcher,
            &["*generated*".to_string()],
        );
        assert_eq!(ev, None);
    }

    #[tokio::test]
    async fn test_watcher_reports_file_changes() {
        let dir = TempDir::new().unwrap();
        let matcher = ExtensionMatcher::new(["gml"]);
        let (handle, mut rx) = start_watcher(dir.path(), matcher, Vec::new()).expect("watcher");

        let file = dir.path().join("a.gml");
        fs::write(&file, "function foo() {}").unwrap();

        let saw_change = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Some(WatchEvent::Changed(path)) if path.ends_with("a.gml") => break true,
                    Some(_) => continue,
                    None => break false,
                }
            }
        })
        .await
        .expect("timely event");
        assert!(saw_change, "expected a Changed event for a.gml");
        handle.stop();
    }
}
