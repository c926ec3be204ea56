use std::path::PathBuf;

/// Classified watch events after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A watched source file was created or modified.
    Changed(PathBuf),
    /// A watched source file was deleted.
    Removed(PathBuf),
    /// A notification without a usable filename (some platforms emit bare
    /// directory-level events); the session runs a coalesced rescan.
    Rescan,
}
