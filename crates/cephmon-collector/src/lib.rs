//! Ceph cluster status collector.
//!
//! Each poll acquires raw status for one facet (monitors, OSDs, placement
//! groups, pools), either from the `ceph` admin tool or from the REST status
//! API, normalizes it across Ceph releases, and aggregates it into a
//! [`MetricTree`](cephmon_monitor::MetricTree):
//!
//! ```text
//! Collector -> StatusSource -> status::normalize -> aggregator -> MetricTree
//! ```
//!
//! A facet's poll either succeeds completely or produces nothing; facets are
//! independent of each other. The [`Runner`] drives polls on an interval and
//! hands results to an [`Exporter`].

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;
pub mod facet;
pub mod runner;
pub mod source;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::Collector;
pub use config::{CollectorConfig, ConfigError, SourceConfig};
pub use error::{CollectError, CollectResult};
pub use exporter::{Exporter, FileExporter, InMemoryExporter, LogExporter};
pub use facet::{ClusterIdentity, Facet, Query};
pub use runner::{Runner, RunnerStats};
pub use source::{CephTool, RestApi, StatusSource};
pub use status::{NormalizedStatus, RawStatus};
