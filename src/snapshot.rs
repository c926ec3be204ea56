use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Last-known modification time per watched file, in milliseconds since epoch.
///
/// Used to suppress duplicate or stale change events: most platforms deliver
/// several notifications per logical save, all carrying the same mtime.
/// Entries live only for the duration of one watch session.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    entries: HashMap<PathBuf, u64>,
}

/// Read a file's mtime as milliseconds since the Unix epoch.
pub fn stat_mtime_ms(path: &Path) -> std::io::Result<u64> {
    let meta = std::fs::metadata(path)?;
    let modified = meta.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stat `path` and record its mtime. A `NotFound` stat removes any
    /// existing entry instead; absence of a snapshot is a valid state
    /// meaning "unknown, treat the next change as new".
    pub fn update(&mut self, path: &Path) {
        match stat_mtime_ms(path) {
            Ok(mtime_ms) => {
                self.entries.insert(path.to_path_buf(), mtime_ms);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.entries.remove(path);
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "snapshot stat failed");
            }
        }
    }

    /// Record an mtime observed by the caller without re-statting.
    pub fn record(&mut self, path: &Path, mtime_ms: u64) {
        self.entries.insert(path.to_path_buf(), mtime_ms);
    }

    /// True when a recorded mtime exists and is at least `incoming_mtime_ms`,
    /// i.e. the incoming event is a duplicate or out of date.
    pub fn is_stale(&self, path: &Path, incoming_mtime_ms: u64) -> bool {
        self.entries
            .get(path)
            .map(|&recorded| recorded >= incoming_mtime_ms)
            .unwrap_or(false)
    }

    /// Drop the entry for a confirmed deletion.
    pub fn remove(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_update_records_and_is_stale_compares() {
        let dir = TempDir::new().expect("tempdir");
        let file = dir.path().join("a.gml");
        fs::write(&file, "function foo() {}").unwrap();

        let mut store = SnapshotStore::new();
        assert!(!store.is_stale(&file, 1), "no snapshot means not stale");

        store.update(&file);
        let recorded = stat_mtime_ms(&file).unwrap();
        assert!(store.is_stale(&file, recorded), "same mtime is stale");
        assert!(store.is_stale(&file, recorded - 1), "older mtime is stale");
        assert!(!store.is_stale(&file, recorded + 1), "newer mtime is fresh");
    }

    #[test]
    fn test_update_on_missing_file_removes_entry() {
        let dir = TempDir::new().expect("tempdir");
        let file = dir.path().join("gone.gml");
        fs::write(&file, "x = 1;").unwrap();

        let mut store = SnapshotStore::new();
        store.update(&file);
        assert_eq!(store.len(), 1);

        fs::remove_file(&file).unwrap();
        store.update(&file);
        assert!(store.is_empty(), "NotFound stat must clear the entry");
    }

    #[test]
    fn test_record_and_remove() {
        let mut store = SnapshotStore::new();
        let path = Path::new("scripts/scr_player.gml");
        store.record(path, 42);
        assert!(store.is_stale(path, 42));
        store.remove(path);
        assert!(!store.is_stale(path, 42));
    }
}
