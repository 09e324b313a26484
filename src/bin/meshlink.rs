//! meshlink CLI
//!
//! Boots the graph stores per a data-config file, loads the path-mode and
//! spider-mode export configs, and serves the HTTP job-submission facade.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use meshlink_core::config::{get_content, MeshlinkConfig};
use meshlink_core::export::{ExportConfig, XlsxSink};
use meshlink_core::graph;
use meshlink_core::http;
use meshlink_core::ingest::IngestOptions;
use meshlink_core::jobs::JobRunner;

#[derive(Parser)]
#[command(name = "meshlink")]
#[command(author, version, about = "Connectivity queries over an entity/document graph", long_about = None)]
struct Cli {
    /// Path to the graph-data configuration file (§6).
    #[arg(long)]
    config: PathBuf,

    /// Export-config file driving path-mode rows (type→icon, type→label).
    #[arg(long = "export-config-path")]
    export_config_path: PathBuf,

    /// Export-config file driving spider-mode rows.
    #[arg(long = "export-config-spider")]
    export_config_spider: PathBuf,

    /// Folder result `.xlsx` files are written into.
    #[arg(long = "output-folder")]
    output_folder: PathBuf,

    /// Static message file served at `/`; the template layer wraps it.
    #[arg(long = "index-message")]
    index_message: Option<PathBuf>,

    /// Address the HTTP facade binds to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Ingest worker-pool size per file category.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = MeshlinkConfig::load(&cli.config)?;
    let export_config_path = ExportConfig::load(&cli.export_config_path)?;
    let export_config_spider = ExportConfig::load(&cli.export_config_spider)?;
    let index_message = match &cli.index_message {
        Some(path) => get_content(path)?,
        None => String::new(),
    };
    std::fs::create_dir_all(&cli.output_folder)?;

    // Shared with the ingest pipeline so Ctrl-C is observed between files,
    // not just at the top of `main`.
    let cancel = Arc::new(AtomicBool::new(false));
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("received shutdown signal; cancelling in-flight ingest");
        ctrlc_cancel.store(true, Ordering::SeqCst);
    })?;

    let handles = graph::build(
        &config,
        IngestOptions {
            worker_count: cli.workers,
        },
        cancel,
    )
    .await?;

    let runner = JobRunner::new(
        handles.bipartite.clone(),
        handles.unipartite.clone(),
        export_config_path,
        export_config_spider,
        Arc::new(XlsxSink),
        cli.output_folder.clone(),
    );

    let app = http::router(runner, index_message);
    let listener = tokio::net::TcpListener::bind(cli.addr).await?;
    tracing::info!("listening on {}", cli.addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handles.destroy()?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining connections");
}
