//! gml-watch: hot-reload tooling for GameMaker Language projects.
//!
//! The pipeline, leaf to root: filesystem events are debounced per path,
//! changed files are parsed for symbol definitions/references, a bipartite
//! file↔symbol graph decides which dependents must be retranspiled, and
//! every successful transpile becomes a patch streamed to WebSocket
//! clients, with a read-only HTTP status server alongside.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod deps;
pub mod error;
pub mod extension;
pub mod gml;
pub mod patch;
pub mod runtime;
pub mod scan;
pub mod server;
pub mod session;
pub mod snapshot;
pub mod status_client;
pub mod transpile;
pub mod watcher;
