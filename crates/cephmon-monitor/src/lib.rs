//! Metric data types shared between the Ceph status collector and whatever
//! dispatches its output.
//!
//! A poll produces one [`MetricTree`] per facet; dispatchers flatten it into
//! timestamped [`Sample`]s.

pub mod sample;
pub mod tree;

pub use sample::Sample;
pub use tree::{MetricSet, MetricTree};
