//! The `status` subcommand: poll a running session over plain HTTP and
//! render the snapshot.

use std::time::Duration;

use anyhow::Context;

use crate::server::status::StatusSnapshot;

/// Fetch `{base_url}/status` and parse the snapshot.
pub fn fetch_status(base_url: &str) -> anyhow::Result<StatusSnapshot> {
    let url = format!("{}/status", base_url.trim_end_matches('/'));
    let response = ureq::get(&url)
        .timeout(Duration::from_secs(5))
        .call()
        .with_context(|| format!("no watch session reachable at {url}"))?;
    let snapshot: StatusSnapshot = response
        .into_json()
        .context("status endpoint returned malformed JSON")?;
    Ok(snapshot)
}

/// Human-readable rendering, cargo-summary style.
pub fn print_pretty(snapshot: &StatusSnapshot) {
    println!(
        "Session up {}s: {} patches, {} errors, {} client(s), scan {}",
        snapshot.uptime_secs,
        snapshot.total_patches,
        snapshot.total_errors,
        snapshot.connected_clients,
        if snapshot.scan_complete { "complete" } else { "running" },
    );
    println!(
        "  tracking {} files / {} symbols ({} with defs, {} with refs)",
        snapshot.tracker.total_files,
        snapshot.tracker.total_symbols,
        snapshot.tracker.files_with_definitions,
        snapshot.tracker.files_with_references,
    );

    if !snapshot.recent_patches.is_empty() {
        println!("  recent patches:");
        for metric in &snapshot.recent_patches {
            println!(
                "    {} ({}) in {}ms",
                metric.patch_id, metric.file_path, metric.duration_ms
            );
        }
    }
    if !snapshot.recent_errors.is_empty() {
        println!("  recent errors:");
        for error in &snapshot.recent_errors {
            println!("    {}: {}", error.file_path, error.error);
        }
    }
}
