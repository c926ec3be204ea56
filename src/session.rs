//! The watch session: wiring and the single event-processing loop.
//!
//! All mutable pipeline state (tracker, snapshots, debouncer, scan queue)
//! lives on this one task; the servers only ever read the shared status.
//! Shutdown order is deliberate: flush pending debounced edits and process
//! them, stop the filesystem watcher, then stop the network servers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::WatchConfig;
use crate::coordinator::Coordinator;
use crate::debounce::Debouncer;
use crate::extension::ExtensionMatcher;
use crate::patch::PatchLog;
use crate::runtime::SessionStatus;
use crate::scan::{self, ScanQueue};
use crate::server::status::{StatusState, router as status_router};
use crate::server::ws::{ClientRegistry, WsState, router as ws_router};
use crate::server::{self};
use crate::transpile::StubTranspiler;
use crate::watcher::event::WatchEvent;
use crate::watcher::start_watcher;

/// Run one watch session until `shutdown_rx` fires (Ctrl-C in `main`, a
/// test-owned channel otherwise).
pub async fn run_watch(
    config: WatchConfig,
    json_summary: bool,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let status = Arc::new(SessionStatus::new(PatchLog::new(
        config.max_patch_history,
        config.max_metric_log,
        config.max_error_log,
    )));
    let clients = Arc::new(ClientRegistry::new());

    // Server startup is the only fatal region: a bind failure stops
    // whatever already started, then aborts the command.
    let ws_handle = server::start(
        config.ws_addr()?,
        ws_router(WsState {
            clients: Arc::clone(&clients),
            status: Arc::clone(&status),
        }),
    )
    .await?;

    let status_handle = match server::start(
        config.status_addr()?,
        status_router(StatusState {
            status: Arc::clone(&status),
            clients: Arc::clone(&clients),
        }),
    )
    .await
    {
        Ok(handle) => handle,
        Err(err) => {
            ws_handle.stop().await;
            return Err(err.into());
        }
    };

    tracing::info!(
        root = %config.root.display(),
        ws = %ws_handle.addr(),
        status = %status_handle.addr(),
        "watch session starting"
    );

    let mut coordinator = Coordinator::new(
        Box::new(StubTranspiler),
        Arc::clone(&status),
        Arc::clone(&clients),
    );

    let mut scan_queue = ScanQueue::new();
    if scan_queue.request() {
        loop {
            let summary = scan::run_scan(&config, &mut coordinator).await;
            summary.print(coordinator.tracker().symbol_count(), json_summary);
            if !scan_queue.finish() {
                break;
            }
        }
    }
    status.mark_scan_complete();

    let matcher = ExtensionMatcher::new(&config.extensions);
    let (watcher_handle, mut events) = match start_watcher(&config.root, matcher, config.exclude.clone()) {
        Ok(started) => started,
        Err(err) => {
            status_handle.stop().await;
            ws_handle.stop().await;
            return Err(err.into());
        }
    };

    let mut debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
    run_event_loop(
        &config,
        &mut coordinator,
        &mut debouncer,
        &mut scan_queue,
        &mut events,
        &mut shutdown_rx,
    )
    .await;

    // Final edits first, then tear down outside-in.
    for path in debouncer.flush() {
        coordinator.process_change(&path, None).await;
    }
    watcher_handle.stop();
    status_handle.stop().await;
    ws_handle.stop().await;
    tracing::info!("watch session stopped");
    Ok(())
}

async fn run_event_loop(
    config: &WatchConfig,
    coordinator: &mut Coordinator,
    debouncer: &mut Debouncer,
    scan_queue: &mut ScanQueue,
    events: &mut tokio::sync::mpsc::Receiver<WatchEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        // With nothing pending, park far in the future instead of spinning.
        let deadline = debouncer
            .next_deadline()
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            event = events.recv() => match event {
                Some(WatchEvent::Changed(path)) => {
                    tracing::debug!(path = %path.display(), "change observed");
                    debouncer.record(path, Instant::now());
                }
                Some(WatchEvent::Removed(path)) => {
                    // Deletions bypass the quiet period; a pending change
                    // trigger for the same path is moot now.
                    debouncer.cancel(&path);
                    coordinator.process_change(&path, None).await;
                }
                Some(WatchEvent::Rescan) => {
                    if scan_queue.request() {
                        loop {
                            let summary = scan::run_scan(config, coordinator).await;
                            tracing::info!(
                                files = summary.files_found,
                                failed = summary.files_failed,
                                "rescan pass complete"
                            );
                            if !scan_queue.finish() {
                                break;
                            }
                        }
                    }
                }
                None => {
                    tracing::warn!("watcher channel closed");
                    return;
                }
            },
            _ = tokio::time::sleep_until(deadline) => {
                for path in debouncer.take_due(Instant::now()) {
                    coordinator.process_change(&path, None).await;
                }
            }
            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown requested");
                return;
            }
        }
    }
}
