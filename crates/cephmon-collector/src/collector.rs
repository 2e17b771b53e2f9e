//! The acquisition, normalization and aggregation pipeline for one cluster.
//!
//! A poll either yields a complete [`MetricTree`] for its facet or nothing
//! at all; failures are logged and never leak into other facets.

use std::sync::Arc;
use std::time::Instant;

use cephmon_monitor::MetricTree;
use futures::future::join_all;

use crate::aggregator;
use crate::config::CollectorConfig;
use crate::error::CollectResult;
use crate::facet::{ClusterIdentity, Facet};
use crate::source::{self, StatusSource};
use crate::status::{self, RawStatus};

/// Polls one cluster. Holds no state between polls, so facets can be polled
/// concurrently through a shared reference.
pub struct Collector {
    identity: ClusterIdentity,
    source: Arc<dyn StatusSource>,
}

impl Collector {
    /// Create a collector polling `source` under `identity`.
    pub fn new(identity: ClusterIdentity, source: Arc<dyn StatusSource>) -> Self {
        Self { identity, source }
    }

    /// Build the collector and its status source from config.
    pub fn from_config(config: &CollectorConfig) -> CollectResult<Self> {
        Ok(Self::new(config.identity(), source::from_config(config)?))
    }

    pub fn identity(&self) -> &ClusterIdentity {
        &self.identity
    }

    /// Run every query the facet needs; the first failure aborts the rest.
    pub async fn fetch(&self, facet: Facet) -> CollectResult<RawStatus> {
        let mut raw = RawStatus::new(facet);
        for &query in facet.queries() {
            raw.push(query, self.source.fetch(query).await?);
        }
        Ok(raw)
    }

    /// Fetch, normalize and aggregate one facet.
    pub async fn collect(&self, facet: Facet) -> CollectResult<MetricTree> {
        let raw = self.fetch(facet).await?;
        let status = status::normalize(&raw)?;
        Ok(aggregator::aggregate(&self.identity, &status))
    }

    /// Like [`collect`](Self::collect), but failures are logged and dropped.
    pub async fn poll(&self, facet: Facet) -> Option<MetricTree> {
        let start = Instant::now();
        match self.collect(facet).await {
            Ok(tree) => {
                tracing::debug!(
                    facet = %facet,
                    cluster = %self.identity.cluster(),
                    metrics = tree.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "poll succeeded"
                );
                Some(tree)
            }
            Err(e) => {
                tracing::error!(
                    facet = %facet,
                    cluster = %self.identity.cluster(),
                    kind = e.kind(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "poll failed"
                );
                None
            }
        }
    }

    /// Poll several facets concurrently. Results come back in input order.
    pub async fn poll_all(&self, facets: &[Facet]) -> Vec<(Facet, Option<MetricTree>)> {
        join_all(facets.iter().map(|&facet| async move { (facet, self.poll(facet).await) })).await
    }
}
