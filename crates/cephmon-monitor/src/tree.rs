//! Hierarchical metric output of a single poll.
//!
//! The tree is rooted at a cluster name and holds named categories (`mon`,
//! `osd`, `pg`, `pool`, `cluster`, `pool-<name>`, `osd-<id>`), each of which
//! maps metric names to values. Everything is stored in ordered maps, so two
//! trees built from the same input iterate and serialize identically.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::sample::Sample;

/// Metric name to value within one category.
pub type MetricSet = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricTree {
    cluster: String,
    categories: BTreeMap<String, MetricSet>,
}

impl MetricTree {
    /// Create an empty tree for `cluster`.
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            categories: BTreeMap::new(),
        }
    }

    /// The root key of the tree (`<prefix>-<cluster>`).
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Return the named category, creating it empty if necessary.
    pub fn category_mut(&mut self, category: &str) -> &mut MetricSet {
        self.categories.entry(category.to_string()).or_default()
    }

    /// Return the metrics of one category.
    pub fn category(&self, category: &str) -> Option<&MetricSet> {
        self.categories.get(category)
    }

    /// Iterate categories in name order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &MetricSet)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set `category.metric` to `value`, replacing any previous value.
    pub fn set(&mut self, category: &str, metric: &str, value: f64) {
        self.category_mut(category).insert(metric.to_string(), value);
    }

    /// Add `delta` to `category.metric`, starting from zero.
    pub fn add(&mut self, category: &str, metric: &str, delta: f64) {
        *self
            .category_mut(category)
            .entry(metric.to_string())
            .or_insert(0.0) += delta;
    }

    /// Look up a single metric value.
    pub fn get(&self, category: &str, metric: &str) -> Option<f64> {
        self.categories.get(category)?.get(metric).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Number of leaf values across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    /// Flatten into samples named `<category>.<metric>`, tagged with the
    /// cluster name and sharing one timestamp.
    pub fn to_samples(&self) -> Vec<Sample> {
        self.to_samples_at(Utc::now())
    }

    /// Flatten the tree into samples sharing one timestamp.
    pub fn to_samples_at(&self, timestamp: DateTime<Utc>) -> Vec<Sample> {
        let mut samples = Vec::with_capacity(self.len());
        for (category, metrics) in &self.categories {
            for (metric, value) in metrics {
                samples.push(
                    Sample::at(format!("{category}.{metric}"), *value, timestamp)
                        .with_tag("cluster", self.cluster.as_str()),
                );
            }
        }
        samples
    }
}

impl Serialize for MetricTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.cluster, &self.categories)?;
        map.end()
    }
}
