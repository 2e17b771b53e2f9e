//! Periodic polling loop.
//!
//! One task per facet: poll, dispatch, wait for the next tick. A facet's
//! next poll never starts before its previous one has finished, and a slow
//! or failing facet does not hold up the others.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::collector::Collector;
use crate::config::CollectorConfig;
use crate::exporter::Exporter;
use crate::facet::Facet;

/// Counters shared by all facet tasks of a runner.
#[derive(Debug, Default)]
pub struct RunnerStats {
    polls_succeeded: AtomicU64,
    polls_failed: AtomicU64,
    samples_exported: AtomicU64,
}

impl RunnerStats {
    pub fn polls_succeeded(&self) -> u64 {
        self.polls_succeeded.load(Ordering::Relaxed)
    }

    pub fn polls_failed(&self) -> u64 {
        self.polls_failed.load(Ordering::Relaxed)
    }

    pub fn samples_exported(&self) -> u64 {
        self.samples_exported.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct Runner {
    collector: Arc<Collector>,
    exporter: Arc<dyn Exporter>,
    facets: Vec<Facet>,
    interval: Duration,
    blacklist: Arc<BTreeSet<String>>,
    stats: Arc<RunnerStats>,
}

impl Runner {
    /// Create a runner polling the configured facets.
    pub fn new(
        collector: Arc<Collector>,
        exporter: Arc<dyn Exporter>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            collector,
            exporter,
            facets: config.facets.clone(),
            interval: config.interval(),
            blacklist: Arc::new(config.blacklisted_metric_names.clone()),
            stats: Arc::new(RunnerStats::default()),
        }
    }

    /// Return the shared counters.
    pub fn stats(&self) -> Arc<RunnerStats> {
        self.stats.clone()
    }

    /// Poll one facet and dispatch the result. Returns whether the poll
    /// succeeded.
    pub async fn poll_once(&self, facet: Facet) -> bool {
        let Some(tree) = self.collector.poll(facet).await else {
            self.stats.polls_failed.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        self.stats.polls_succeeded.fetch_add(1, Ordering::Relaxed);

        let mut samples = tree.to_samples();
        if !self.blacklist.is_empty() {
            samples.retain(|s| !self.blacklist.contains(&s.name));
        }

        let count = samples.len() as u64;
        match self.exporter.export(&samples).await {
            Ok(()) => {
                self.stats.samples_exported.fetch_add(count, Ordering::Relaxed);
            }
            Err(e) => tracing::error!(facet = %facet, error = %e, "Failed to export samples"),
        }
        true
    }

    /// Start one polling task per facet. The returned handle completes once
    /// `shutdown` flips to `true` (or its sender is dropped) and every facet
    /// task has finished its current poll.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut handles = Vec::with_capacity(self.facets.len());
            for &facet in &self.facets {
                let runner = self.clone();
                let shutdown = shutdown.clone();
                handles.push(tokio::spawn(async move {
                    runner.run_facet(facet, shutdown).await;
                }));
            }

            for handle in handles {
                let _ = handle.await;
            }

            tracing::info!(
                polls_succeeded = self.stats.polls_succeeded(),
                polls_failed = self.stats.polls_failed(),
                "All facet pollers stopped"
            );
        })
    }

    async fn run_facet(&self, facet: Facet, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(facet = %facet, interval = ?self.interval, "Facet poller started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            self.poll_once(facet).await;
        }

        tracing::info!(facet = %facet, "Facet poller shutting down");
    }
}
