// Prometheus Collector - Cluster Metric Harvesting Tool
//
// A Rust-based pipeline that pulls a fixed set of PromQL queries from a
// Prometheus endpoint and folds the results into a durable TSV dataset.
//
// # Pipeline (strictly sequential)
// 1. Resolve the Prometheus endpoint from the cluster ingress (fatal on failure)
// 2. Collect all catalog queries into a snapshot file (per-query failures skipped)
// 3. Merge the snapshot into the accumulated dataset and delete the snapshot
//
// # Usage
// prometheus-collector [--data-dir <path>] [--prometheus <url>]
//
// Example:
// prometheus-collector --data-dir ./Datasource
// prometheus-collector --prometheus "http://prom.example.com/api/v1/query"

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Module declarations
mod collector;
mod dataset;
mod endpoint;
mod merger;
mod queries;

use collector::PrometheusClient;

/// Application entry point
///
/// This function:
/// 1. Initializes logging and parses command-line arguments
/// 2. Resolves the Prometheus query endpoint (or halts)
/// 3. Collects the query catalog into a snapshot file
/// 4. Merges the snapshot into the accumulated dataset
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("=== Prometheus Collector Starting ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = parse_arguments()?;

    // Resolve the endpoint once at startup; it is immutable for the run.
    // Resolution failure is fatal: nothing is collected or written.
    let query_url = match args.prometheus_url {
        Some(url) => {
            info!("Using Prometheus endpoint from --prometheus: {}", url);
            url
        }
        None => endpoint::resolve_prometheus_url()
            .await
            .context("Failed to resolve Prometheus ingress")?,
    };

    let client =
        PrometheusClient::new(query_url).context("Failed to build Prometheus HTTP client")?;

    // One shared timestamp per run so all rows of this invocation dedup
    // against each other as co-occurring
    let timestamp = collector::run_timestamp();
    info!("Collection timestamp: {}", timestamp);

    let rows = client.collect_snapshot(queries::QUERIES, &timestamp).await;
    info!(
        "Collected {} row(s) from {} quer(ies)",
        rows.len(),
        queries::QUERIES.len()
    );

    let snapshot_path = args.data_dir.join(dataset::SNAPSHOT_FILE);
    let dataset_path = args.data_dir.join(dataset::DATASET_FILE);

    dataset::write_tsv(&snapshot_path, &rows)
        .with_context(|| format!("Failed to write snapshot '{}'", snapshot_path.display()))?;
    info!("Saved snapshot: {}", snapshot_path.display());

    let total = merger::merge_snapshot(&snapshot_path, &dataset_path)
        .context("Failed to merge snapshot into dataset")?;

    info!("=== Run Complete: dataset holds {} row(s) ===", total);
    Ok(())
}

/// Application configuration parsed from command-line arguments
struct AppConfig {
    /// Directory holding the snapshot and accumulated dataset files
    data_dir: PathBuf,

    /// Optional endpoint override; skips ingress discovery when set
    prometheus_url: Option<String>,
}

/// Parses command-line arguments
///
/// # Arguments (all optional)
/// 1. --data-dir <path> - Data directory (defaults to "./Datasource")
/// 2. --prometheus <url> - Instant-query URL, bypassing kubectl discovery
///
/// # Examples
/// ```bash
/// prometheus-collector
/// prometheus-collector --data-dir /var/lib/metrics
/// prometheus-collector --prometheus "http://localhost:9090/api/v1/query"
/// ```
fn parse_arguments() -> Result<AppConfig> {
    let args: Vec<String> = env::args().collect();

    // Helper function to find argument value
    let find_arg = |flag: &str| -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .map(|s| s.to_string())
    };

    let data_dir = find_arg("--data-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./Datasource"));

    let prometheus_url = find_arg("--prometheus");

    Ok(AppConfig {
        data_dir,
        prometheus_url,
    })
}

/// Initializes the logging subsystem
///
/// Sets up structured logging with:
/// - Timestamp for each log entry
/// - Log level (INFO, WARN, ERROR, etc.)
/// - Target module name
/// - Colored output when running in terminal
/// - JSON output when running as systemd service (e.g. a timer-driven run)
///
/// # Log Levels
/// Default: INFO
/// Can be overridden with RUST_LOG environment variable
fn init_logging() {
    // Determine if we're running under systemd
    // Systemd sets INVOCATION_ID environment variable
    let is_systemd = env::var("INVOCATION_ID").is_ok();

    // Default to INFO level, but allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if is_systemd {
        // When running under systemd, use JSON format for structured logging
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // When running in terminal, use human-readable format with colors
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}
