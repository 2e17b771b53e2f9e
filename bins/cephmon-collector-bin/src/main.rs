use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use cephmon_collector::{exporter, Collector, CollectorConfig, Facet, Runner};

/// Ceph cluster status collector
#[derive(Parser, Debug)]
#[command(name = "cephmon-collector", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cephmon-collector.toml")]
    config: PathBuf,

    /// Dump default configuration and exit
    #[arg(long)]
    dump_default_config: bool,

    /// Poll every facet once, print the metric trees as JSON and exit
    #[arg(long)]
    once: bool,

    /// Override the configured facets (comma separated: mon,osd,pg,pool)
    #[arg(long, value_delimiter = ',')]
    facets: Option<Vec<Facet>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.dump_default_config {
        print!("{}", toml::to_string_pretty(&CollectorConfig::default())?);
        return Ok(());
    }

    let mut config = CollectorConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(facets) = args.facets {
        config.facets = facets;
        config.validate()?;
    }

    let _guard = cephmon_logging::init_logging(&config.log)?;

    let collector = Arc::new(Collector::from_config(&config)?);

    if args.once {
        return poll_once(&collector, &config.facets).await;
    }

    tracing::info!(
        cluster = %config.cluster,
        facets = ?config.facets,
        interval = ?config.interval(),
        "Starting Ceph status collector"
    );

    let runner = Runner::new(collector, exporter::from_config(&config), &config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = runner.spawn(shutdown_rx);

    wait_for_shutdown_signal().await;
    tracing::info!("Ceph status collector shutting down");
    let _ = shutdown_tx.send(true);
    handle.await?;

    Ok(())
}

async fn poll_once(collector: &Collector, facets: &[Facet]) -> anyhow::Result<()> {
    let mut failed = Vec::new();
    for (facet, tree) in collector.poll_all(facets).await {
        match tree {
            Some(tree) => println!("{}", serde_json::to_string_pretty(&tree)?),
            None => failed.push(facet),
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("polling failed for {failed:?}")
    }
}

/// Wait for CTRL+C or SIGTERM.
async fn wait_for_shutdown_signal() {
    let mut sigterm =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => { tracing::info!("Received CTRL+C"); }
        _ = sigterm.recv() => { tracing::info!("Received SIGTERM"); }
    }
}
