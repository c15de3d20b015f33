//! CLI entry point: a `clap::Parser` struct composed with
//! `cli_common::LogArgs`, following `flowctl`'s composition pattern.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use cli_common::{init_logging, LogArgs};

/// Collects MongoDB Atlas logs, events, alerts, and metrics on a recurring,
/// short-lived invocation, forwarding them to a Sumo Logic HTTP endpoint.
#[derive(Debug, Parser)]
#[clap(author, name = "mongodb-atlas-collector", version)]
struct Cli {
    /// Path to the collector's YAML configuration file.
    #[clap(default_value = "config.yaml")]
    config_path: PathBuf,

    /// Directory holding the on-host cursor/lock/discovery-cache store.
    #[clap(long = "state-dir", default_value = "./state")]
    state_dir: PathBuf,

    /// Print payloads to stdout instead of delivering them to Sumo Logic.
    #[clap(long)]
    dry_run: bool,

    #[clap(flatten)]
    log_args: LogArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_args);

    let config = match config::Config::load(&cli.config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, path = %cli.config_path.display(), "failed to load configuration");
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config, cli.state_dir, cli.dry_run))
}

async fn run(
    config: config::Config,
    state_dir: PathBuf,
    dry_run: bool,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&state_dir).await?;
    let kv_store: Arc<dyn kv::Store> =
        Arc::new(kv::file::FileStore::open(state_dir.join("collector_state.json")).await?);

    let sink: Arc<dyn sink::Sink> = if dry_run {
        Arc::new(sink::stdout::StdoutSink::new())
    } else {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            sink::EndpointKey::Logs,
            config.sumo_logic.logs_endpoint.clone(),
        );
        endpoints.insert(
            sink::EndpointKey::Metrics,
            config.sumo_logic.metrics_endpoint.clone(),
        );
        let client = http::Client::new(
            http::Auth::None,
            config.collection.timeout,
            config.collection.max_retry,
            config.collection.backoff_factor,
        );
        Arc::new(sink::http_sink::HttpSink::new(
            client,
            endpoints,
            config.collection.max_payload_bytesize,
            config.collection.compressed,
        ))
    };

    let engine = Arc::new(collector::Engine::new(config, kv_store, sink));

    match collector::run(engine).await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(error = %err, "collector invocation failed");
            std::process::exit(1);
        }
    }
}
