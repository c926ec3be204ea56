//! Error taxonomy for the watch pipeline.
//!
//! Transient per-file failures (read, parse, transpile) never terminate the
//! session; they are logged and recorded in the bounded error window. Only
//! resource acquisition at startup (binding a server port, an inaccessible
//! watch root) is fatal.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// Fatal at startup; any already-started server is stopped first.
    #[error("failed to start server on {addr}")]
    ServerStart {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch {path}")]
    WatcherStart {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}
