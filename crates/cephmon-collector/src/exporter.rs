//! Dispatch backends for collected samples.
//!
//! - `LogExporter`: logs every sample via `tracing`.
//! - `FileExporter`: appends JSON-lines to a file.
//! - `InMemoryExporter`: keeps batches in memory for tests and inspection.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cephmon_monitor::Sample;
use parking_lot::Mutex;

use crate::config::CollectorConfig;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize sample: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, samples: &[Sample]) -> Result<(), ExportError>;
}

/// Build the exporter named by `reporter_type`.
pub fn from_config(config: &CollectorConfig) -> Arc<dyn Exporter> {
    match config.reporter_type.as_str() {
        "file" => Arc::new(FileExporter::new(&config.export_path)),
        _ => Arc::new(LogExporter),
    }
}

/// Writes each batch to the log: one summary line, then one line per metric.
pub struct LogExporter;

#[async_trait]
impl Exporter for LogExporter {
    async fn export(&self, samples: &[Sample]) -> Result<(), ExportError> {
        let Some(first) = samples.first() else {
            return Ok(());
        };
        let cluster = first.tag("cluster").unwrap_or_default();
        tracing::info!(cluster, samples = samples.len(), timestamp = %first.timestamp, "Exporting batch");
        for sample in samples {
            tracing::info!(
                cluster = sample.tag("cluster").unwrap_or_default(),
                metric = %sample.name,
                value = sample.value,
                "metric"
            );
        }
        Ok(())
    }
}

pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    /// Create an exporter appending to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ExportError {
        ExportError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl Exporter for FileExporter {
    async fn export(&self, samples: &[Sample]) -> Result<(), ExportError> {
        let mut buf = Vec::new();
        for sample in samples {
            serde_json::to_writer(&mut buf, sample)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        // One write per batch so concurrent facets never interleave lines.
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(&buf).map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

/// Keeps every exported batch, in arrival order.
#[derive(Default)]
pub struct InMemoryExporter {
    batches: Mutex<Vec<Vec<Sample>>>,
}

impl InMemoryExporter {
    /// Create an empty exporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every stored batch into one flat list.
    pub fn take_samples(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.batches.lock()).into_iter().flatten().collect()
    }

    /// Samples held across all batches.
    pub fn count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }

    /// Most recent value exported under `name`.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.batches
            .lock()
            .iter()
            .rev()
            .flat_map(|batch| batch.iter().rev())
            .find(|s| s.name == name)
            .map(|s| s.value)
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, samples: &[Sample]) -> Result<(), ExportError> {
        if !samples.is_empty() {
            self.batches.lock().push(samples.to_vec());
        }
        Ok(())
    }
}
