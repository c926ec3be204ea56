//! End-to-end pipeline tests, driven through the coordinator and the real
//! HTTP status server (ephemeral ports, tempdir fixtures).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use gml_watch::config::WatchConfig;
use gml_watch::coordinator::{Coordinator, ProcessOutcome};
use gml_watch::patch::PatchLog;
use gml_watch::runtime::SessionStatus;
use gml_watch::server;
use gml_watch::server::status::{StatusState, router as status_router};
use gml_watch::server::ws::ClientRegistry;
use gml_watch::session::run_watch;
use gml_watch::status_client::fetch_status;
use gml_watch::transpile::StubTranspiler;

fn new_coordinator() -> Coordinator {
    Coordinator::new(
        Box::new(StubTranspiler),
        Arc::new(SessionStatus::new(PatchLog::new(64, 64, 64))),
        Arc::new(ClientRegistry::new()),
    )
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// The rename scenario: `a.gml` defines `foo`, `b.gml` calls it. Renaming
/// `foo` to `foo2` must emit patches for both files and record an
/// unresolved-reference error for `b.gml`; a manual fix of `b.gml`
/// afterwards emits exactly one more patch and re-points its references.
#[tokio::test]
async fn test_rename_cascade_scenario() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.gml", "function foo() {}");
    let b = write(&dir, "b.gml", "foo();");

    let mut coordinator = new_coordinator();
    assert!(coordinator.process_scanned(&a, "function foo() {}").await);
    assert!(coordinator.process_scanned(&b, "foo();").await);

    let status = coordinator.status();
    assert_eq!(status.log.read().await.total_patches(), 2, "scan primes both files");

    // Rename the exported symbol.
    write(&dir, "a.gml", "function foo2() {}");
    let outcome = coordinator.process_change(&a, Some(10_000_000_000_000)).await;
    assert_eq!(
        outcome,
        ProcessOutcome::Patched { cascaded: 1 },
        "definition change must retranspile the dependent"
    );

    {
        let log = status.log.read().await;
        assert_eq!(log.total_patches(), 4, "one patch for a.gml, one cascaded for b.gml");
        let errors = log.last_errors(10);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].file_path.ends_with("b.gml"));
        assert!(errors[0].error.contains("foo"), "the dangling reference is named");
    }

    // Manual fix of the dependent.
    write(&dir, "b.gml", "foo2();");
    let outcome = coordinator.process_change(&b, Some(10_000_000_000_001)).await;
    assert_eq!(
        outcome,
        ProcessOutcome::Patched { cascaded: 0 },
        "b.gml defines nothing, so its own edit never cascades"
    );
    assert_eq!(status.log.read().await.total_patches(), 5, "exactly one new patch");

    // b's reference set now points at foo2, so it is again a dependent of a.
    let dependents = coordinator.tracker().dependent_files(&a);
    assert_eq!(dependents, std::collections::BTreeSet::from([b.clone()]));
}

/// Cascade covers dependents that vanished with a removed symbol: when A
/// drops `bar`, the old dependent D is retranspiled once more (union of
/// previous and recomputed dependents).
#[tokio::test]
async fn test_removed_symbol_retranspiles_former_dependent() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.gml", "function foo() {}\nfunction bar() {}");
    let d = write(&dir, "d.gml", "bar();");

    let mut coordinator = new_coordinator();
    coordinator
        .process_scanned(&a, "function foo() {}\nfunction bar() {}")
        .await;
    coordinator.process_scanned(&d, "bar();").await;

    write(&dir, "a.gml", "function foo() {}");
    let outcome = coordinator.process_change(&a, Some(10_000_000_000_000)).await;
    assert_eq!(outcome, ProcessOutcome::Patched { cascaded: 1 });

    let status = coordinator.status();
    let log = status.log.read().await;
    let errors = log.last_errors(10);
    assert!(
        errors.iter().any(|e| e.file_path.ends_with("d.gml") && e.error.contains("bar")),
        "d.gml must record the now-unresolved `bar` reference"
    );
}

/// Duplicate (path, mtime) events trigger exactly one transpile and one
/// patch emission.
#[tokio::test]
async fn test_duplicate_events_emit_one_patch() {
    let dir = TempDir::new().unwrap();
    let a = write(&dir, "a.gml", "function foo() {}");

    let mut coordinator = new_coordinator();
    assert_eq!(
        coordinator.process_change(&a, Some(5_000)).await,
        ProcessOutcome::Patched { cascaded: 0 }
    );
    assert_eq!(coordinator.process_change(&a, Some(5_000)).await, ProcessOutcome::Skipped);

    let status = coordinator.status();
    assert_eq!(status.log.read().await.total_patches(), 1);
}

/// The status server and the status subcommand's client agree on the wire
/// format end to end.
#[tokio::test]
async fn test_status_endpoint_roundtrip_over_http() {
    let status = Arc::new(SessionStatus::new(PatchLog::new(16, 16, 16)));
    let clients = Arc::new(ClientRegistry::new());
    status.mark_scan_complete();
    status.log.write().await.record_error("bad.gml", "unbalanced '{'");

    let handle = server::start(
        "127.0.0.1:0".parse().unwrap(),
        status_router(StatusState {
            status: Arc::clone(&status),
            clients: Arc::clone(&clients),
        }),
    )
    .await
    .expect("status server");

    let base_url = format!("http://{}", handle.addr());
    let snapshot = tokio::task::spawn_blocking(move || fetch_status(&base_url))
        .await
        .expect("join")
        .expect("fetch");

    assert!(snapshot.scan_complete);
    assert_eq!(snapshot.total_errors, 1);
    assert_eq!(snapshot.connected_clients, 0);
    assert_eq!(snapshot.recent_errors[0].file_path, "bad.gml");

    handle.stop().await;
}

/// Full session smoke test: scan a real tree, run briefly, shut down
/// cleanly. Ephemeral ports keep parallel test runs from colliding.
#[tokio::test]
async fn test_session_starts_scans_and_shuts_down() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.gml", "function foo() {}");
    write(&dir, "b.gml", "foo();");

    let mut config = WatchConfig::load(dir.path().to_path_buf());
    config.ws_port = 0;
    config.status_port = 0;
    config.validate().expect("valid config");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let session = tokio::spawn(run_watch(config, false, shutdown_rx));

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    shutdown_tx.send(true).expect("session alive");

    let result = tokio::time::timeout(std::time::Duration::from_secs(10), session)
        .await
        .expect("session must stop promptly")
        .expect("join");
    assert!(result.is_ok(), "session should exit cleanly: {result:?}");
}
