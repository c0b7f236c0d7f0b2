//! tsingest-node — standalone ingestion registry daemon.
//!
//! Runs a `TreeRegistry` backed by in-memory collaborators, a background
//! thread that drains rescue points into the metadata store, and a
//! stdin-driven demo session for feeding it samples. Wire protocols
//! (gRPC, a binary framing format, etc.) are out of scope here; this
//! binary exists to exercise the registry end to end, not to be a
//! production ingestion front end.

mod config;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use tsingest_core::{Sample, Status};
use tsingest_metadata::InMemoryMetadataStore;
use tsingest_registry::TreeRegistry;
use tsingest_store::InMemoryBlockStore;

#[derive(Parser, Debug)]
#[command(name = "tsingest-node", about = "Ingestion registry daemon", version)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the configured flush threshold.
    #[arg(long, value_name = "N")]
    flush_threshold: Option<usize>,

    /// Overrides the configured sync-wait timeout, in seconds.
    #[arg(long, value_name = "SECS")]
    sync_wait_timeout: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut node_config = NodeConfig::load(cli.config.as_deref())?;

    if let Some(threshold) = cli.flush_threshold {
        node_config.ingest.flush_threshold = threshold;
    }
    if let Some(secs) = cli.sync_wait_timeout {
        node_config.ingest.sync_wait_timeout = Duration::from_secs(secs);
    }

    init_tracing(&node_config.logging)?;

    let registry = TreeRegistry::new(
        Arc::new(InMemoryBlockStore::new()),
        Arc::new(InMemoryMetadataStore::new()),
        node_config.ingest.clone(),
    );

    let sync_timeout = node_config.ingest.sync_wait_timeout;
    let sync_registry = Arc::clone(&registry);
    let sync_thread = std::thread::spawn(move || sync_loop(sync_registry, sync_timeout));

    info!(
        flush_threshold = node_config.ingest.flush_threshold,
        sync_wait_timeout_secs = sync_timeout.as_secs(),
        "tsingest-node ready; feed samples as 'name timestamp value' lines on stdin, Ctrl+D to stop"
    );

    run_stdin_session(&registry)?;

    registry.shutdown();
    if sync_thread.join().is_err() {
        warn!("sync thread panicked");
    }
    info!("shutdown complete");
    Ok(())
}

fn init_tracing(logging: &config::LoggingSection) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tsingest={}", logging.level, logging.level)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().try_init().map_err(|err| anyhow!(err))
    } else {
        builder.try_init().map_err(|err| anyhow!(err))
    }
}

/// Runs until the registry observes `Closed`, draining rescue points as
/// they're published.
fn sync_loop(registry: Arc<TreeRegistry>, timeout: Duration) {
    loop {
        if registry.is_closed() {
            return;
        }
        match registry.wait_for_sync_request(timeout) {
            Status::Ok => {
                if let Err(err) = registry.sync_with_metadata_storage() {
                    warn!(%err, "metadata sync failed, will retry");
                }
            }
            Status::Timeout | Status::Retry => continue,
            other => {
                warn!(?other, "unexpected status from wait_for_sync_request");
            }
        }
    }
}

/// Reads `name timestamp value` lines from stdin and writes them through
/// a single demo session, printing the resulting status for each line.
fn run_stdin_session(registry: &Arc<TreeRegistry>) -> Result<()> {
    let session = registry.create_session();
    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        match parse_sample_line(line) {
            Ok((name, ts, value)) => match session.init_series_id(&name) {
                Ok(id) => {
                    let status = session.write(Sample::new(id, ts, value));
                    println!("{status:?}");
                }
                Err(status) => println!("{status:?}"),
            },
            Err(err) => {
                println!("parse error: {err}");
            }
        }
    }
    Ok(())
}

fn parse_sample_line(line: &str) -> Result<(String, i64, f64)> {
    let mut parts = line.rsplitn(3, ' ');
    let value: f64 = parts
        .next()
        .ok_or_else(|| anyhow!("missing value"))?
        .parse()
        .map_err(|_| anyhow!("invalid value"))?;
    let ts: i64 = parts
        .next()
        .ok_or_else(|| anyhow!("missing timestamp"))?
        .parse()
        .map_err(|_| anyhow!("invalid timestamp"))?;
    let name = parts.next().ok_or_else(|| anyhow!("missing series name"))?;
    Ok((name.to_string(), ts, value))
}
