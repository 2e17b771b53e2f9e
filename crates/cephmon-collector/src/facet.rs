//! Monitored facets of cluster state and the cluster round-trips each needs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One monitored aspect of cluster state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Mon,
    Osd,
    Pg,
    Pool,
}

impl Facet {
    pub const ALL: [Facet; 4] = [Facet::Mon, Facet::Osd, Facet::Pg, Facet::Pool];

    /// Queries needed to collect this facet. All of them must succeed.
    pub fn queries(self) -> &'static [Query] {
        match self {
            Facet::Mon => &[Query::MonDump],
            Facet::Osd => &[Query::OsdDump],
            Facet::Pg => &[Query::PgDump],
            Facet::Pool => &[Query::PoolStats, Query::Df],
        }
    }

    /// Return the facet's name as used in config and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Mon => "mon",
            Facet::Osd => "osd",
            Facet::Pg => "pg",
            Facet::Pool => "pool",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mon" => Ok(Facet::Mon),
            "osd" => Ok(Facet::Osd),
            "pg" => Ok(Facet::Pg),
            "pool" => Ok(Facet::Pool),
            other => Err(format!("unknown facet {other:?}")),
        }
    }
}

/// A single status round-trip against the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    MonDump,
    OsdDump,
    PgDump,
    PoolStats,
    Df,
}

impl Query {
    /// Subcommand words passed to the admin tool.
    pub fn tool_args(self) -> &'static [&'static str] {
        match self {
            Query::MonDump => &["mon", "dump"],
            Query::OsdDump => &["osd", "dump"],
            Query::PgDump => &["pg", "dump"],
            Query::PoolStats => &["osd", "pool", "stats"],
            Query::Df => &["df"],
        }
    }

    /// Path under `/api/v0.1/` on the REST endpoint.
    pub fn rest_path(self) -> &'static str {
        match self {
            Query::MonDump => "mon/dump",
            Query::OsdDump => "osd/dump",
            Query::PgDump => "pg/dump",
            Query::PoolStats => "osd/pool/stats",
            Query::Df => "df",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tool_args().join(" "))
    }
}

/// Namespace for every metric of a collector instance: `<prefix>-<cluster>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    prefix: String,
    cluster: String,
}

impl ClusterIdentity {
    /// Create an identity from a metric prefix and cluster name.
    pub fn new(prefix: impl Into<String>, cluster: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            cluster: cluster.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Return `prefix-cluster`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.prefix, self.cluster)
    }
}
