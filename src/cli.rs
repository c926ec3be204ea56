use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Hot-reload watcher for GameMaker Language projects.
///
/// gml-watch observes a project tree, incrementally retranspiles changed
/// scripts (and the scripts that depend on their exports), and streams the
/// resulting patches to connected clients over WebSocket.
#[derive(Parser, Debug)]
#[command(
    name = "gml-watch",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for the status subcommand.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable summary (default).
    #[default]
    Pretty,
    /// Raw JSON, suitable for programmatic consumption.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a project directory and serve hot-reload patches.
    Watch {
        /// Project root to watch.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Watched file extensions (comma-separated; overrides config).
        #[arg(long, value_delimiter = ',')]
        ext: Vec<String>,

        /// Debounce quiet period in milliseconds (overrides config).
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// WebSocket patch-stream port (overrides config).
        #[arg(long)]
        ws_port: Option<u16>,

        /// HTTP status port (overrides config).
        #[arg(long)]
        status_port: Option<u16>,

        /// Emit the scan summary as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Log every pipeline step.
        #[arg(short, long)]
        verbose: bool,

        /// Suppress non-error output. Errors are always printed.
        #[arg(short, long, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// Query the status endpoint of a running watch session.
    Status {
        /// Base URL of the status server.
        #[arg(long, default_value = "http://127.0.0.1:9606")]
        url: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
}
