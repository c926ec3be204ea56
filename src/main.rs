use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gml_watch::cli::{Cli, Commands, OutputFormat};
use gml_watch::config::WatchConfig;
use gml_watch::session::run_watch;
use gml_watch::status_client;

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "gml_watch=error"
    } else if verbose {
        "gml_watch=debug"
    } else {
        "gml_watch=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            path,
            ext,
            debounce_ms,
            ws_port,
            status_port,
            json,
            verbose,
            quiet,
        } => {
            init_tracing(verbose, quiet);

            let mut config = WatchConfig::load(path);
            if !ext.is_empty() {
                config.extensions = ext;
            }
            if let Some(ms) = debounce_ms {
                config.debounce_ms = ms;
            }
            if let Some(port) = ws_port {
                config.ws_port = port;
            }
            if let Some(port) = status_port {
                config.status_port = port;
            }
            config.validate()?;

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });

            run_watch(config, json, shutdown_rx).await
        }

        Commands::Status { url, format } => {
            init_tracing(false, false);
            let snapshot = status_client::fetch_status(&url)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                OutputFormat::Pretty => status_client::print_pretty(&snapshot),
            }
            Ok(())
        }
    }
}
