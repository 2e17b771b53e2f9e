//! Configuration for the collector.
//!
//! Loaded from a TOML file. Every field has a default, so an empty file is a
//! valid configuration that polls the local `ceph` cluster via the admin
//! tool.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cephmon_logging::LogConfig;
use serde::{Deserialize, Serialize};

use crate::facet::{ClusterIdentity, Facet};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How raw status is acquired. One mode per collector instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Run the admin tool locally.
    Tool {
        #[serde(default = "default_binary")]
        binary: PathBuf,
        /// Extra arguments placed before the subcommand (`--id`, `--keyring`).
        #[serde(default)]
        extra_args: Vec<String>,
    },
    /// Query the REST status API.
    Rest {
        host: String,
        #[serde(default = "default_rest_port")]
        port: u16,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Tool {
            binary: default_binary(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Cluster name passed to the admin tool and used in metric names.
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Metric prefix; the tree root is `<prefix>-<cluster>`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Upper bound for a single tool run or HTTP request.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_facets")]
    pub facets: Vec<Facet>,

    /// Dispatch backend: "log" or "file".
    #[serde(default = "default_reporter_type")]
    pub reporter_type: String,

    /// Output path for the "file" reporter.
    #[serde(default = "default_export_path")]
    pub export_path: PathBuf,

    /// Metrics (`<category>.<metric>`) dropped before dispatch.
    #[serde(default)]
    pub blacklisted_metric_names: BTreeSet<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_binary() -> PathBuf {
    PathBuf::from("ceph")
}

fn default_rest_port() -> u16 {
    5000
}

fn default_cluster() -> String {
    "ceph".to_string()
}

fn default_prefix() -> String {
    "ceph".to_string()
}

fn default_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    30
}

fn default_facets() -> Vec<Facet> {
    Facet::ALL.to_vec()
}

fn default_reporter_type() -> String {
    "log".to_string()
}

fn default_export_path() -> PathBuf {
    PathBuf::from("./cephmon-metrics.jsonl")
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cluster: default_cluster(),
            prefix: default_prefix(),
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            facets: default_facets(),
            reporter_type: default_reporter_type(),
            export_path: default_export_path(),
            blacklisted_metric_names: BTreeSet::new(),
            source: SourceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::info!(path = %path.display(), cluster = %config.cluster, "Loaded collector config");
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the collector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.cluster.is_empty() {
            return invalid("cluster must not be empty");
        }
        if self.prefix.is_empty() {
            return invalid("prefix must not be empty");
        }
        if self.interval_secs == 0 {
            return invalid("interval_secs must be positive");
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be positive");
        }
        if self.facets.is_empty() {
            return invalid("at least one facet must be enabled");
        }
        if !matches!(self.reporter_type.as_str(), "log" | "file") {
            return Err(ConfigError::Invalid(format!(
                "unknown reporter_type {:?}, expected \"log\" or \"file\"",
                self.reporter_type
            )));
        }
        if let SourceConfig::Rest { host, .. } = &self.source {
            if host.is_empty() {
                return invalid("rest source needs a host");
            }
        }
        Ok(())
    }

    /// Return the cluster identity samples are tagged with.
    pub fn identity(&self) -> ClusterIdentity {
        ClusterIdentity::new(&self.prefix, &self.cluster)
    }

    /// Return the poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Return the per-query timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
