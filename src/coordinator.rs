//! The transpilation coordinator: one state machine per file-change event.
//!
//! resolve stats → staleness check → read → register identity → transpile →
//! dependency update → cascade decision → patch emission. Cascades propagate
//! exactly one level per triggering event; deeper chains settle on their own
//! subsequent events.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::deps::DependencyTracker;
use crate::gml::symbols::{SymbolSet, extract_symbols};
use crate::patch::{Patch, now_ms};
use crate::runtime::{ScriptRegistry, SessionStatus};
use crate::server::ws::ClientRegistry;
use crate::snapshot::{SnapshotStore, stat_mtime_ms};
use crate::transpile::{ScriptSource, Transpiler};

/// What processing one change event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// File missing: unregistered and purged from the graph.
    Deleted,
    /// Stale/duplicate event or unreadable file; nothing changed.
    Skipped,
    /// Transpile failed: error recorded, graph left as it was, no patch.
    Failed,
    /// Patch emitted; `cascaded` dependents were retranspiled with it.
    Patched { cascaded: usize },
}

pub struct Coordinator {
    tracker: DependencyTracker,
    snapshots: SnapshotStore,
    scripts: ScriptRegistry,
    transpiler: Box<dyn Transpiler>,
    status: Arc<SessionStatus>,
    clients: Arc<ClientRegistry>,
}

impl Coordinator {
    pub fn new(
        transpiler: Box<dyn Transpiler>,
        status: Arc<SessionStatus>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            tracker: DependencyTracker::new(),
            snapshots: SnapshotStore::new(),
            scripts: ScriptRegistry::new(),
            transpiler,
            status,
            clients,
        }
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    pub fn status(&self) -> Arc<SessionStatus> {
        Arc::clone(&self.status)
    }

    /// Process one debounced change event for `path`.
    ///
    /// `event_mtime_ms` carries the mtime from the event when the platform
    /// provides one; otherwise the file is statted here.
    pub async fn process_change(
        &mut self,
        path: &Path,
        event_mtime_ms: Option<u64>,
    ) -> ProcessOutcome {
        let mtime_ms = match event_mtime_ms {
            Some(mtime) => mtime,
            None => match stat_mtime_ms(path) {
                Ok(mtime) => mtime,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    self.handle_deleted(path).await;
                    return ProcessOutcome::Deleted;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "stat failed, dropping event");
                    return ProcessOutcome::Skipped;
                }
            },
        };

        if self.snapshots.is_stale(path, mtime_ms) {
            tracing::debug!(path = %path.display(), mtime_ms, "duplicate event, skipping");
            return ProcessOutcome::Skipped;
        }

        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.handle_deleted(path).await;
                return ProcessOutcome::Deleted;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "read failed, dropping event");
                return ProcessOutcome::Skipped;
            }
        };
        self.snapshots.record(path, mtime_ms);

        let symbol_id = self.scripts.register(path);

        let Some((patch, symbols, duration_ms)) = self.transpile_one(path, &symbol_id, &source).await
        else {
            return ProcessOutcome::Failed;
        };

        // Capture the pre-update view; the cascade policy needs both sides.
        let previous_defs: BTreeSet<String> =
            self.tracker.file_definitions(path).into_iter().collect();
        let previous_dependents = self.tracker.dependent_files(path);

        self.tracker.replace_file_defines(path, &symbols.definitions);
        self.tracker.replace_file_references(path, &symbols.references);
        self.publish_tracker_stats().await;
        self.emit(patch, path, duration_ms).await;

        if previous_defs == symbols.definitions {
            // Body-only change: the file's own patch suffices.
            return ProcessOutcome::Patched { cascaded: 0 };
        }

        // Union of old and freshly recomputed dependents covers both a
        // dependent that vanished with a removed symbol and one that only
        // now exists because a symbol was added or renamed.
        let mut targets = previous_dependents;
        targets.extend(self.tracker.dependent_files(path));
        targets.remove(path);

        let removed_symbols: BTreeSet<String> = previous_defs
            .difference(&symbols.definitions)
            .cloned()
            .collect();

        let mut cascaded = 0;
        for dependent in targets {
            if self.retranspile_dependent(&dependent, &removed_symbols).await {
                cascaded += 1;
            }
        }
        ProcessOutcome::Patched { cascaded }
    }

    /// Apply one file discovered by the bulk scan: the scan already read the
    /// content, and scan-time updates never cascade (the whole tree is being
    /// visited anyway).
    pub async fn process_scanned(&mut self, path: &Path, source: &str) -> bool {
        let symbol_id = self.scripts.register(path);
        let Some((patch, symbols, duration_ms)) = self.transpile_one(path, &symbol_id, source).await
        else {
            return false;
        };
        self.tracker.replace_file_defines(path, &symbols.definitions);
        self.tracker.replace_file_references(path, &symbols.references);
        self.snapshots.update(path);
        self.publish_tracker_stats().await;
        self.emit(patch, path, duration_ms).await;
        true
    }

    /// One level of cascade: read, transpile and re-track a dependent, no
    /// further propagation. When a reference that used to resolve now has no
    /// definer left, that is recorded as an unresolved-reference error.
    async fn retranspile_dependent(
        &mut self,
        path: &Path,
        removed_symbols: &BTreeSet<String>,
    ) -> bool {
        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.handle_deleted(path).await;
                return false;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cascade read failed");
                return false;
            }
        };
        let symbol_id = self.scripts.register(path);
        let Some((patch, symbols, duration_ms)) = self.transpile_one(path, &symbol_id, &source).await
        else {
            return false;
        };

        self.tracker.replace_file_defines(path, &symbols.definitions);
        self.tracker.replace_file_references(path, &symbols.references);
        self.snapshots.update(path);
        self.publish_tracker_stats().await;
        self.emit(patch, path, duration_ms).await;

        for reference in symbols.references.intersection(removed_symbols) {
            if self.tracker.files_defining(reference).is_empty() {
                let message = format!("unresolved reference to `{reference}`");
                tracing::warn!(path = %path.display(), %message);
                self.status
                    .log
                    .write()
                    .await
                    .record_error(&path.to_string_lossy(), &message);
            }
        }
        true
    }

    /// Confirmed deletion: drop the script identity, its graph contribution
    /// and its snapshot. Terminal for the triggering event.
    pub async fn handle_deleted(&mut self, path: &Path) {
        if let Some(symbol) = self.scripts.unregister(path) {
            self.status.log.write().await.forget_symbol(&symbol);
        }
        self.tracker.remove_file(path);
        self.snapshots.remove(path);
        self.publish_tracker_stats().await;
        tracing::info!(path = %path.display(), "removed from watch graph");
    }

    /// Parse + transpile one file. On transpile failure records an error and
    /// returns `None`; the caller leaves the graph untouched so the previous
    /// definitions stay authoritative.
    async fn transpile_one(
        &mut self,
        path: &Path,
        symbol_id: &str,
        source: &str,
    ) -> Option<(Patch, SymbolSet, u64)> {
        let started = Instant::now();

        let symbols = match extract_symbols(source) {
            Ok(set) => set,
            Err(err) => {
                // Degrade, do not crash: the file temporarily contributes
                // nothing to the graph.
                tracing::warn!(path = %path.display(), %err, "parse failure, symbols degrade to empty");
                SymbolSet::default()
            }
        };

        let js_body = match self.transpiler.transpile_script(ScriptSource {
            symbol_id,
            source_text: source,
        }) {
            Ok(js) => js,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "transpile failed");
                self.status
                    .log
                    .write()
                    .await
                    .record_error(&path.to_string_lossy(), &err.to_string());
                return None;
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let version = self.status.log.write().await.next_version(symbol_id);
        let patch = Patch {
            id: format!("{symbol_id}#{version}"),
            symbol_id: symbol_id.to_string(),
            js_body,
            source_text: source.to_string(),
            version,
            timestamp_ms: now_ms(),
        };
        Some((patch, symbols, duration_ms))
    }

    async fn emit(&self, patch: Patch, path: &Path, duration_ms: u64) {
        self.status
            .log
            .write()
            .await
            .record_patch(patch.clone(), &path.to_string_lossy(), duration_ms);
        let report = self.clients.broadcast(&patch);
        tracing::debug!(
            symbol_id = %patch.symbol_id,
            version = patch.version,
            delivered = report.success_count,
            failed = report.failure_count,
            "patch emitted"
        );
    }

    async fn publish_tracker_stats(&self) {
        let stats = self.tracker.statistics();
        self.status.log.write().await.tracker_stats = stats;
    }
}
