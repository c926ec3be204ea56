//! Watch-session configuration.
//!
//! One explicit struct with typed fields and documented defaults, resolved
//! once at startup: defaults, then `gml-watch.toml` at the watch root, then
//! CLI flags. Nothing downstream reads option bags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default debounce quiet period in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 120;
/// Default WebSocket patch-stream port.
pub const DEFAULT_WS_PORT: u16 = 9605;
/// Default HTTP status port.
pub const DEFAULT_STATUS_PORT: u16 = 9606;
/// Default bounded patch history length.
pub const DEFAULT_MAX_PATCH_HISTORY: usize = 128;
/// Default bounded error-log length.
pub const DEFAULT_MAX_ERROR_LOG: usize = 64;
/// Default bounded metric-log length.
pub const DEFAULT_MAX_METRIC_LOG: usize = 256;
/// Default cap on concurrent reads during the initial scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 16;

/// Fully resolved configuration for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Directory tree being watched.
    pub root: PathBuf,
    /// Watched file extensions (normalized by `ExtensionMatcher`).
    pub extensions: Vec<String>,
    /// Glob patterns excluded from scanning and watching.
    pub exclude: Vec<String>,
    /// Quiet period before a changed path is processed.
    pub debounce_ms: u64,
    pub ws_host: String,
    pub ws_port: u16,
    pub status_host: String,
    pub status_port: u16,
    pub max_patch_history: usize,
    pub max_error_log: usize,
    pub max_metric_log: usize,
    /// Concurrent file reads during the initial bulk scan; steady-state
    /// change processing is always sequential.
    pub scan_concurrency: usize,
}

/// Optional `gml-watch.toml` overlay; every field defaults to the built-in.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    extensions: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    debounce_ms: Option<u64>,
    ws_host: Option<String>,
    ws_port: Option<u16>,
    status_host: Option<String>,
    status_port: Option<u16>,
    max_patch_history: Option<usize>,
    max_error_log: Option<usize>,
    max_metric_log: Option<usize>,
    scan_concurrency: Option<usize>,
}

impl FileConfig {
    /// Read `gml-watch.toml` from the watch root. Missing file is the
    /// default config; an unreadable or unparsable file warns and falls
    /// back rather than refusing to start.
    fn load(root: &Path) -> Self {
        let config_path = root.join("gml-watch.toml");
        if !config_path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse gml-watch.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read gml-watch.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}

impl WatchConfig {
    /// Defaults + `gml-watch.toml` overlay for `root`. CLI flag overrides
    /// are applied by the caller afterwards.
    pub fn load(root: PathBuf) -> Self {
        let file = FileConfig::load(&root);
        Self {
            root,
            extensions: file.extensions.unwrap_or_else(|| vec!["gml".to_string()]),
            exclude: file.exclude.unwrap_or_default(),
            debounce_ms: file.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            ws_host: file.ws_host.unwrap_or_else(|| "127.0.0.1".to_string()),
            ws_port: file.ws_port.unwrap_or(DEFAULT_WS_PORT),
            status_host: file.status_host.unwrap_or_else(|| "127.0.0.1".to_string()),
            status_port: file.status_port.unwrap_or(DEFAULT_STATUS_PORT),
            max_patch_history: file.max_patch_history.unwrap_or(DEFAULT_MAX_PATCH_HISTORY),
            max_error_log: file.max_error_log.unwrap_or(DEFAULT_MAX_ERROR_LOG),
            max_metric_log: file.max_metric_log.unwrap_or(DEFAULT_MAX_METRIC_LOG),
            scan_concurrency: file.scan_concurrency.unwrap_or(DEFAULT_SCAN_CONCURRENCY),
        }
    }

    /// Validate once at startup; everything after this trusts the struct.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.root.is_dir() {
            anyhow::bail!("watch root {} is not a directory", self.root.display());
        }
        if self.extensions.is_empty() {
            anyhow::bail!("at least one watched extension is required");
        }
        if self.debounce_ms == 0 {
            anyhow::bail!("debounce_ms must be at least 1");
        }
        if self.scan_concurrency == 0 {
            anyhow::bail!("scan_concurrency must be at least 1");
        }
        self.ws_addr()?;
        self.status_addr()?;
        Ok(())
    }

    pub fn ws_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.ws_host, self.ws_port)
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid websocket address: {err}"))
    }

    pub fn status_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.status_host, self.status_port)
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid status address: {err}"))
    }
}

/// Returns true if `path` matches any exclusion glob, either as a whole
/// path or by any single component.
pub fn is_excluded(path: &Path, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let path_str = path.to_string_lossy();
    for pattern in patterns {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            continue;
        };
        if matcher.matches(&path_str) {
            return true;
        }
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && matcher.matches(s)
            {
                return true;
            }
        }
    }
    false
}
